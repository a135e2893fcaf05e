//! Structured company extraction via the completion capability.
//!
//! Two strategies, chosen by [`PageKind`](crate::PageKind):
//! - [`SingleCompanyExtractor`] reads the head of a company's own page and
//!   returns at most one record.
//! - [`AggregatorExtractor`] reads preprocessed directory listings and
//!   returns up to a configured number of records.
//!
//! Both make exactly one completion call. A reply that cannot be parsed
//! yields no records; a failed call is an error.

use std::sync::Arc;

use tracing::{debug, warn};

use leadsense_llm::{CompletionClient, CompletionRequest};
use leadsense_shared::{CompanyData, Provenance, Result, truncate_chars};

use crate::json::parse_company_objects;
use crate::preprocess::prepare_listing;

/// Markup shorter than this (after trimming) is not worth a model call.
pub const MIN_MARKUP_CHARS: usize = 100;

const SINGLE_COMPANY_INSTRUCTIONS: &str = r#"You are a company information extractor. Extract structured information about ONE company from the provided HTML.

Fields:
- company_name: the company's name (required)
- website_url: the company's main website URL
- address: full postal address
- contact_email: email address
- phone_number: phone number
- description: what the company does, from its about/intro text
- automation_proposal: 1-2 sentences on how process automation or AI could help this company

Respond with ONLY a JSON array holding exactly one object:
[{"company_name": "...", "website_url": "...", "address": "...", "contact_email": "...", "phone_number": "...", "description": "...", "automation_proposal": "..."}]

Use null for anything not clearly visible in the HTML. Do not guess or invent data."#;

const AGGREGATOR_INSTRUCTIONS: &str = r#"You are a business directory parser. The input is a list of HTML fragments taken from a directory, search-results, or listing page. Each fragment may describe one business.

For each business found, extract:
- company_name: the business name (required)
- website_url: its own website (not the directory's link), if present
- address: postal address, if present
- contact_email: email, if present
- phone_number: phone, if present
- description: short description, if present
- automation_proposal: one sentence on how process automation could help a business of this kind

Respond with ONLY a JSON array of objects with exactly those keys, at most {max} objects. Skip entries without a name. If there are no businesses, respond with []."#;

// ---------------------------------------------------------------------------
// Single company
// ---------------------------------------------------------------------------

/// Extracts one company from its own website.
#[derive(Clone)]
pub struct SingleCompanyExtractor {
    client: Arc<dyn CompletionClient>,
    max_chars: usize,
}

impl SingleCompanyExtractor {
    /// `max_chars` bounds how much of the page head is sent to the model.
    pub fn new(client: Arc<dyn CompletionClient>, max_chars: usize) -> Self {
        Self { client, max_chars }
    }

    pub async fn extract(&self, markup: &str, url: &str) -> Result<Vec<CompanyData>> {
        if too_short(markup) {
            debug!(%url, chars = markup.trim().chars().count(), "markup too short, skipping extraction");
            return Ok(Vec::new());
        }

        let head = truncate_chars(markup, self.max_chars);
        let request = CompletionRequest::new(
            SINGLE_COMPANY_INSTRUCTIONS,
            format!("Extract company information from this HTML:\n\n{head}"),
        );
        let reply = self.client.complete(request).await?;

        let objects = match parse_company_objects(&reply.text) {
            Ok(objects) => objects,
            Err(e) => {
                warn!(%url, error = %e, "could not parse single-company reply");
                return Ok(Vec::new());
            }
        };

        Ok(objects
            .into_iter()
            .find_map(|raw| raw.into_company(url, Provenance::SingleCompany))
            .into_iter()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Extracts several companies from a directory or listing page.
#[derive(Clone)]
pub struct AggregatorExtractor {
    client: Arc<dyn CompletionClient>,
    listing_budget: usize,
    max_companies: usize,
}

impl AggregatorExtractor {
    pub fn new(client: Arc<dyn CompletionClient>, listing_budget: usize, max_companies: usize) -> Self {
        Self {
            client,
            listing_budget,
            max_companies,
        }
    }

    pub async fn extract(&self, markup: &str, url: &str) -> Result<Vec<CompanyData>> {
        if too_short(markup) {
            debug!(%url, chars = markup.trim().chars().count(), "markup too short, skipping extraction");
            return Ok(Vec::new());
        }

        let listing = prepare_listing(markup, self.listing_budget);
        if listing.is_empty() {
            debug!(%url, "no listing fragments found");
            return Ok(Vec::new());
        }

        let instructions =
            AGGREGATOR_INSTRUCTIONS.replace("{max}", &self.max_companies.to_string());
        let request = CompletionRequest::new(
            instructions,
            format!("Extract the businesses listed on this directory page:\n\n{listing}"),
        );
        let reply = self.client.complete(request).await?;

        let objects = match parse_company_objects(&reply.text) {
            Ok(objects) => objects,
            Err(e) => {
                warn!(%url, error = %e, "could not parse aggregator reply");
                return Ok(Vec::new());
            }
        };

        Ok(objects
            .into_iter()
            .filter_map(|raw| raw.into_company(url, Provenance::Aggregator))
            .take(self.max_companies)
            .collect())
    }
}

fn too_short(markup: &str) -> bool {
    markup.trim().chars().count() < MIN_MARKUP_CHARS
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::testing::ScriptedCompletion;
    use super::*;
    use leadsense_shared::LeadsenseError;

    const URL: &str = "https://acme.example/about";

    fn company_page() -> String {
        format!(
            "<html><body><h1>Acme Robotics</h1><p>{}</p></body></html>",
            "We build warehouse robots. ".repeat(10)
        )
    }

    #[tokio::test]
    async fn single_company_takes_first_named_object() {
        let client = Arc::new(ScriptedCompletion::default().reply(
            "Acme Robotics",
            r#"```json
[{"company_name": ""}, {"company_name": "Acme Robotics", "contact_email": "hi@acme.example"}, {"company_name": "Other"}]
```"#,
        ));
        let extractor = SingleCompanyExtractor::new(client.clone(), 5000);

        let companies = extractor.extract(&company_page(), URL).await.unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].company_name, "Acme Robotics");
        assert_eq!(companies[0].confidence_score, 0.8);
        assert_eq!(companies[0].source_url, URL);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn single_company_sends_only_the_page_head() {
        let client = Arc::new(ScriptedCompletion::default());
        let extractor = SingleCompanyExtractor::new(client.clone(), 120);

        let markup = company_page() + &"x".repeat(10_000);
        extractor.extract(&markup, URL).await.unwrap();

        let requests = client.requests.lock().unwrap();
        assert!(requests[0].user.chars().count() < 250);
    }

    #[tokio::test]
    async fn short_markup_skips_model_call() {
        let client = Arc::new(ScriptedCompletion::default());
        let extractor = SingleCompanyExtractor::new(client.clone(), 5000);

        let companies = extractor.extract("<html>tiny</html>", URL).await.unwrap();
        assert!(companies.is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn unparseable_reply_yields_nothing() {
        let client = Arc::new(
            ScriptedCompletion::default().reply("Acme", "Sorry, I can't help with that."),
        );
        let extractor = SingleCompanyExtractor::new(client, 5000);

        let companies = extractor.extract(&company_page(), URL).await.unwrap();
        assert!(companies.is_empty());
    }

    #[tokio::test]
    async fn completion_failure_is_an_error() {
        let client = Arc::new(ScriptedCompletion::default().fail("Acme"));
        let extractor = SingleCompanyExtractor::new(client, 5000);

        let err = extractor.extract(&company_page(), URL).await.unwrap_err();
        assert!(matches!(err, LeadsenseError::Extraction(_)));
    }

    fn directory_page(entries: usize) -> String {
        let items: String = (1..=entries)
            .map(|i| format!("<li class=\"entry\">Firm {i} GmbH, Bahnhofstrasse {i}, Zurich</li>"))
            .collect();
        format!("<html><body><nav><li>Home</li></nav><ul class=\"results\">{items}</ul></body></html>")
    }

    #[tokio::test]
    async fn aggregator_drops_nameless_and_caps() {
        let objects: Vec<String> = (1..=12)
            .map(|i| format!(r#"{{"company_name": "Firm {i} GmbH"}}"#))
            .chain(std::iter::once(r#"{"website_url": "https://nameless.example"}"#.to_string()))
            .collect();
        let reply = format!("[{}]", objects.join(","));
        let client = Arc::new(ScriptedCompletion::default().reply("Firm 1 GmbH", &reply));
        let extractor = AggregatorExtractor::new(client, 12_000, 10);

        let companies = extractor
            .extract(&directory_page(12), "https://dir.example/zurich")
            .await
            .unwrap();
        assert_eq!(companies.len(), 10);
        assert!(companies.iter().all(|c| c.confidence_score == 0.6));
        assert!(companies.iter().all(|c| c.source_url == "https://dir.example/zurich"));
        assert_eq!(companies[0].company_name, "Firm 1 GmbH");
    }

    #[tokio::test]
    async fn aggregator_sends_preprocessed_listing() {
        let client = Arc::new(ScriptedCompletion::default());
        let extractor = AggregatorExtractor::new(client.clone(), 12_000, 10);

        extractor
            .extract(&directory_page(3), "https://dir.example/zurich")
            .await
            .unwrap();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user.contains("Firm 3 GmbH"));
        assert!(!requests[0].user.contains("Home"));
        assert!(requests[0].system.contains("at most 10 objects"));
    }

    #[tokio::test]
    async fn aggregator_empty_list_is_ok() {
        let client = Arc::new(ScriptedCompletion::default().reply("Firm", "[]"));
        let extractor = AggregatorExtractor::new(client, 12_000, 10);

        let companies = extractor
            .extract(&directory_page(3), "https://dir.example/zurich")
            .await
            .unwrap();
        assert!(companies.is_empty());
    }
}
