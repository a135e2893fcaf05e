//! Low-confidence company records synthesized from search metadata.
//!
//! Used when no page in a batch produced a company: the search result's
//! title, URL and snippet are still worth keeping as a weak lead.

use tracing::debug;
use url::Url;

use leadsense_shared::{CompanyData, Provenance, SearchResult};

pub const UNKNOWN_COMPANY: &str = "Unknown Company";
const DEFAULT_DESCRIPTION: &str = "Company found through web search";

/// Build a record from one search result. Never fails.
pub fn from_search_metadata(result: &SearchResult) -> CompanyData {
    let title = result.title.trim();
    let name = if !title.is_empty() {
        title.to_string()
    } else {
        match Url::parse(&result.url) {
            Ok(url) => name_from_host(&url).unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
            Err(e) => {
                debug!(url = %result.url, error = %e, "unparseable result URL, using degenerate record");
                return degenerate(&result.url);
            }
        }
    };

    let description = match result.description.trim() {
        "" => DEFAULT_DESCRIPTION.to_string(),
        snippet => snippet.to_string(),
    };

    let mut company = CompanyData::new(name, &result.url, Provenance::SearchMetadata);
    company.website_url = Some(result.url.clone());
    company.description = Some(description);
    company.automation_proposal = Some(format!(
        "Potential automation opportunities for {} based on search results",
        company.company_name
    ));
    company
}

/// Name-only record for a result whose URL cannot be interpreted.
fn degenerate(url: &str) -> CompanyData {
    let mut company = CompanyData::new(UNKNOWN_COMPANY, url, Provenance::Degenerate);
    company.website_url = Some(url.to_string());
    company
}

/// `www.swiss-dental_care.ch` becomes `Swiss Dental Care`.
fn name_from_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let label = host.split('.').next()?;
    let name = title_case(&label.replace(['-', '_'], " "));
    (!name.is_empty()).then_some(name)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, url: &str, description: &str) -> SearchResult {
        SearchResult {
            title: title.into(),
            url: url.into(),
            description: description.into(),
            order: 1,
        }
    }

    #[test]
    fn uses_title_and_snippet() {
        let company = from_search_metadata(&result(
            "Alpine Dental Care | Zurich",
            "https://alpinedental.example/",
            "Family dentistry in Zurich since 1998.",
        ));
        assert_eq!(company.company_name, "Alpine Dental Care | Zurich");
        assert_eq!(company.website_url.as_deref(), Some("https://alpinedental.example/"));
        assert_eq!(company.source_url, "https://alpinedental.example/");
        assert_eq!(
            company.description.as_deref(),
            Some("Family dentistry in Zurich since 1998.")
        );
        assert_eq!(
            company.automation_proposal.as_deref(),
            Some("Potential automation opportunities for Alpine Dental Care | Zurich based on search results")
        );
        assert_eq!(company.confidence_score, 0.3);
    }

    #[test]
    fn derives_name_from_host_when_title_is_blank() {
        let company = from_search_metadata(&result("  ", "https://www.swiss-dental_care.ch/team", ""));
        assert_eq!(company.company_name, "Swiss Dental Care");
        assert_eq!(company.description.as_deref(), Some(DEFAULT_DESCRIPTION));
        assert_eq!(company.confidence_score, 0.3);
    }

    #[test]
    fn unparseable_url_without_title_is_degenerate() {
        let company = from_search_metadata(&result("", "not a url", ""));
        assert_eq!(company.company_name, UNKNOWN_COMPANY);
        assert_eq!(company.website_url.as_deref(), Some("not a url"));
        assert!(company.description.is_none());
        assert!(company.automation_proposal.is_none());
        assert_eq!(company.confidence_score, 0.1);
    }

    #[test]
    fn hostless_url_falls_back_to_unknown() {
        let company = from_search_metadata(&result("", "mailto:info@acme.example", ""));
        assert_eq!(company.company_name, UNKNOWN_COMPANY);
        assert_eq!(company.confidence_score, 0.3);
    }

    #[test]
    fn title_case_lowercases_tails() {
        assert_eq!(title_case("ACME  robotics"), "Acme Robotics");
        assert_eq!(title_case(""), "");
    }
}
