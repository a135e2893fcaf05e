//! End-to-end discovery pipeline: profile → sectors → queries → search → scrape.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use leadsense_discovery::SerperClient;
use leadsense_llm::CompletionClient;
use leadsense_scraper::Scraper;
use leadsense_shared::{
    CompanyProfile, LeadsenseError, QueryPlan, RecommendedSector, Result, ScrapingResult,
    SearchBatch,
};

use crate::agents;

/// Everything a discovery run produced, stage by stage.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    /// Sectors the run targeted (requested or identified).
    pub sectors: Vec<RecommendedSector>,
    pub plan: QueryPlan,
    pub search: SearchBatch,
    pub scraping: ScrapingResult,
    pub elapsed: Duration,
}

impl DiscoveryOutcome {
    /// Names of the sectors that received queries, for lead attribution.
    pub fn searched_sectors(&self) -> Vec<String> {
        self.plan.searches.iter().map(|s| s.sector.clone()).collect()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &DiscoveryOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _outcome: &DiscoveryOutcome) {}
}

/// The services a discovery run needs.
pub struct LeadDiscovery {
    client: Arc<dyn CompletionClient>,
    search: SerperClient,
    scraper: Scraper,
}

impl LeadDiscovery {
    pub fn new(client: Arc<dyn CompletionClient>, search: SerperClient, scraper: Scraper) -> Self {
        Self {
            client,
            search,
            scraper,
        }
    }

    /// Run the full discovery pipeline.
    ///
    /// 1. Sectors: use `requested_sectors` if any, otherwise ask the model
    /// 2. Generate search queries for the top sectors
    /// 3. Run the web searches
    /// 4. Scrape the result pages (bounded by the scraper's batch deadline)
    ///
    /// Planning failures are errors. Once searching starts, the run always
    /// completes with whatever the search and scrape stages produced.
    #[instrument(skip_all, fields(company = %profile.company_name))]
    pub async fn discover_leads(
        &self,
        profile: &CompanyProfile,
        requested_sectors: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<DiscoveryOutcome> {
        let start = Instant::now();

        // --- Phase 1: Sectors ---
        let sectors = if requested_sectors.is_empty() {
            progress.phase("Identifying target sectors");
            agents::identify_sectors(self.client.as_ref(), profile).await?
        } else {
            requested_sectors
                .iter()
                .filter(|name| !name.trim().is_empty())
                .enumerate()
                .map(|(i, name)| RecommendedSector {
                    name: name.trim().to_string(),
                    justification: "Selected by user".to_string(),
                    order: i as u32 + 1,
                })
                .collect()
        };
        if sectors.is_empty() {
            return Err(LeadsenseError::Extraction(
                "no target sectors to search".into(),
            ));
        }

        // --- Phase 2: Queries ---
        progress.phase("Generating search queries");
        let plan = agents::generate_queries(self.client.as_ref(), &sectors, profile).await?;
        if plan.searches.is_empty() {
            return Err(LeadsenseError::Extraction(
                "model generated no search queries".into(),
            ));
        }

        // --- Phase 3: Search ---
        progress.phase("Searching the web");
        let search = self.search.search_plan(&plan).await?;
        if search.is_empty() {
            warn!("web search returned no results");
        }

        // --- Phase 4: Scrape ---
        progress.phase("Scraping companies");
        let scraping = self.scraper.scrape(&search).await;

        let outcome = DiscoveryOutcome {
            sectors,
            plan,
            search,
            scraping,
            elapsed: start.elapsed(),
        };

        info!(
            results = outcome.search.results.len(),
            companies = outcome.scraping.companies.len(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "discovery complete"
        );
        progress.done(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{QueuedCompletion, sample_profile};
    use leadsense_discovery::SearchOptions;
    use leadsense_shared::{Provenance, ScrapeConfig};
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECTORS_REPLY: &str = r#"[{"name": "Dental practices", "justification": "Booking load", "order": 1}]"#;
    const PLAN_REPLY: &str = r#"{"searches": [{"sector": "Dental practices", "queries": [{"language": "English", "query": "dentist zurich", "order": 1}]}]}"#;
    const COMPANY_REPLY: &str = r#"[{"company_name": "Alpine Dental Care", "website_url": "https://alpine-dental.example", "phone_number": "+41 44 000 00 00"}]"#;

    fn company_page() -> String {
        format!(
            "<html><head><title>Alpine Dental Care</title></head><body><h1>Alpine Dental Care</h1><p>{}</p></body></html>",
            "Family dentistry in the heart of Zurich. ".repeat(8)
        )
    }

    fn scripted() -> QueuedCompletion {
        QueuedCompletion::default()
            .on("recommend 10 sectors", SECTORS_REPLY)
            .on("lead generation assistant", PLAN_REPLY)
            .on("company information extractor", COMPANY_REPLY)
    }

    async fn serper_returning(links: &[String]) -> MockServer {
        let server = MockServer::start().await;
        let organic: Vec<_> = links
            .iter()
            .enumerate()
            .map(|(i, link)| json!({"title": format!("Result {}", i + 1), "link": link, "snippet": "A practice"}))
            .collect();
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"organic": organic})))
            .mount(&server)
            .await;
        server
    }

    fn discovery(client: Arc<QueuedCompletion>, serper: &MockServer) -> LeadDiscovery {
        let search = SerperClient::new("serper-key", SearchOptions::default())
            .unwrap()
            .with_endpoint(format!("{}/search", serper.uri()));
        let scraper = Scraper::with_http(client.clone(), ScrapeConfig::default()).unwrap();
        LeadDiscovery::new(client, search, scraper)
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        done: Mutex<bool>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn done(&self, _outcome: &DiscoveryOutcome) {
            *self.done.lock().unwrap() = true;
        }
    }

    #[tokio::test]
    async fn discovers_companies_end_to_end() {
        let pages = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alpine"))
            .respond_with(ResponseTemplate::new(200).set_body_string(company_page()))
            .mount(&pages)
            .await;
        let serper = serper_returning(&[format!("{}/alpine", pages.uri())]).await;

        let client = Arc::new(scripted());
        let progress = RecordingProgress::default();
        let outcome = discovery(client.clone(), &serper)
            .discover_leads(&sample_profile(), &[], &progress)
            .await
            .unwrap();

        assert_eq!(outcome.sectors[0].name, "Dental practices");
        assert_eq!(outcome.plan.all_queries(), vec!["dentist zurich"]);
        assert_eq!(outcome.search.results.len(), 1);
        assert_eq!(outcome.scraping.successful_scrapes, 1);
        assert_eq!(outcome.scraping.companies.len(), 1);

        let company = &outcome.scraping.companies[0];
        assert_eq!(company.company_name, "Alpine Dental Care");
        assert_eq!(company.confidence_score, Provenance::SingleCompany.score());
        assert_eq!(outcome.searched_sectors(), vec!["Dental practices"]);

        assert_eq!(
            *progress.phases.lock().unwrap(),
            vec![
                "Identifying target sectors",
                "Generating search queries",
                "Searching the web",
                "Scraping companies"
            ]
        );
        assert!(*progress.done.lock().unwrap());
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn requested_sectors_skip_identification() {
        let serper = serper_returning(&[]).await;
        let client = Arc::new(scripted());

        let outcome = discovery(client.clone(), &serper)
            .discover_leads(&sample_profile(), &["Dental practices".to_string()], &SilentProgress)
            .await
            .unwrap();

        assert_eq!(outcome.sectors[0].justification, "Selected by user");
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system.contains("lead generation assistant"));

        // Nothing to scrape, so the scrape stage reports the empty batch.
        assert!(outcome.search.is_empty());
        assert!(outcome.scraping.companies.is_empty());
        assert_eq!(outcome.scraping.total_urls_processed, 0);
        assert!(!outcome.scraping.errors.is_empty());
    }

    #[tokio::test]
    async fn empty_query_plan_is_an_error() {
        let serper = serper_returning(&[]).await;
        let client = Arc::new(
            QueuedCompletion::default()
                .on("recommend 10 sectors", SECTORS_REPLY)
                .on("lead generation assistant", r#"{"searches": []}"#),
        );

        let err = discovery(client, &serper)
            .discover_leads(&sample_profile(), &[], &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no search queries"));
    }

    #[tokio::test]
    async fn no_sectors_is_an_error() {
        let serper = serper_returning(&[]).await;
        let client = Arc::new(QueuedCompletion::default().on("recommend 10 sectors", "[]"));

        let err = discovery(client, &serper)
            .discover_leads(&sample_profile(), &[], &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, LeadsenseError::Extraction(_)));
    }
}
