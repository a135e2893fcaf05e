//! First-seen deduplication of company records.

use std::collections::HashSet;

use leadsense_shared::CompanyData;

/// Keep the first record for each `(lower-cased name, website URL)` key,
/// preserving input order. A missing URL is its own key value.
pub fn dedup_companies(companies: Vec<CompanyData>) -> Vec<CompanyData> {
    let mut seen = HashSet::new();
    companies
        .into_iter()
        .filter(|company| seen.insert(company.dedup_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadsense_shared::Provenance;

    fn company(name: &str, url: Option<&str>, source: &str) -> CompanyData {
        let mut c = CompanyData::new(name, source, Provenance::Aggregator);
        c.website_url = url.map(String::from);
        c
    }

    #[test]
    fn keeps_first_of_case_insensitive_duplicates() {
        let out = dedup_companies(vec![
            company("Acme GmbH", Some("https://acme.example"), "https://a.example"),
            company("ACME GMBH", Some("https://acme.example"), "https://b.example"),
            company("Globex", None, "https://a.example"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source_url, "https://a.example");
        assert_eq!(out[1].company_name, "Globex");
    }

    #[test]
    fn different_urls_are_distinct() {
        let out = dedup_companies(vec![
            company("Acme", Some("https://acme.ch"), "s"),
            company("Acme", Some("https://acme.de"), "s"),
            company("Acme", None, "s"),
            company("acme", None, "s"),
        ]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn is_idempotent() {
        let input = vec![
            company("Acme", None, "s"),
            company("acme", None, "s"),
            company("Globex", Some("https://globex.example"), "s"),
        ];
        let once = dedup_companies(input.clone());
        let twice = dedup_companies(once.clone());
        assert_eq!(once, twice);
        assert!(once.len() <= input.len());
    }

    #[test]
    fn empty_input() {
        assert!(dedup_companies(Vec::new()).is_empty());
    }
}
