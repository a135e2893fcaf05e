//! Concurrent scrape orchestrator.
//!
//! Takes the URLs of a search batch, runs fetch → classify → extract for
//! each one concurrently, and folds the outcomes into a [`ScrapingResult`].
//! A failing URL never fails the batch: its reason lands in `errors`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use leadsense_llm::CompletionClient;
use leadsense_shared::{
    CompanyData, Result, RunId, ScrapeConfig, ScrapingResult, SearchBatch, SearchResult,
};

use crate::classifier::{PageKind, classify};
use crate::dedup::dedup_companies;
use crate::extract::{AggregatorExtractor, SingleCompanyExtractor};
use crate::fallback::from_search_metadata;
use crate::fetcher::{HttpFetcher, PageFetcher};

pub const NO_URLS_ERROR: &str = "No URLs found in search results";

// ---------------------------------------------------------------------------
// UnitOutcome
// ---------------------------------------------------------------------------

/// What happened to one URL.
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub url: String,
    /// Page classification, when the page was fetched.
    pub kind: Option<PageKind>,
    pub companies: Vec<CompanyData>,
    /// Failure reason. `None` means the URL produced companies.
    pub error: Option<String>,
}

impl UnitOutcome {
    fn failed(url: String, kind: Option<PageKind>, error: String) -> Self {
        Self {
            url,
            kind,
            companies: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Lifecycle callbacks for a scrape batch.
pub trait ScrapeObserver: Send + Sync {
    /// Called once the URL list is parsed and capped.
    fn batch_started(&self, urls: usize);
    /// Called as each URL settles, in completion order.
    fn url_finished(&self, outcome: &UnitOutcome, settled: usize, total: usize);
    /// Called when search metadata is used because no page yielded a company.
    fn fallback_used(&self, results: usize);
    /// Called with the final result.
    fn done(&self, result: &ScrapingResult);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl ScrapeObserver for SilentObserver {
    fn batch_started(&self, _urls: usize) {}
    fn url_finished(&self, _outcome: &UnitOutcome, _settled: usize, _total: usize) {}
    fn fallback_used(&self, _results: usize) {}
    fn done(&self, _result: &ScrapingResult) {}
}

// ---------------------------------------------------------------------------
// Scraper
// ---------------------------------------------------------------------------

/// Runs scrape batches. Cheap to share; all state is immutable.
pub struct Scraper {
    fetcher: Arc<dyn PageFetcher>,
    single: SingleCompanyExtractor,
    aggregator: AggregatorExtractor,
    observer: Arc<dyn ScrapeObserver>,
    config: ScrapeConfig,
}

impl Scraper {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        client: Arc<dyn CompletionClient>,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            fetcher,
            single: SingleCompanyExtractor::new(client.clone(), config.single_page_chars),
            aggregator: AggregatorExtractor::new(
                client,
                config.listing_budget,
                config.max_aggregator_companies,
            ),
            observer: Arc::new(SilentObserver),
            config,
        }
    }

    /// Scraper that fetches over HTTP with the configured per-page timeout.
    pub fn with_http(client: Arc<dyn CompletionClient>, config: ScrapeConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.fetch_timeout)?;
        Ok(Self::new(Arc::new(fetcher), client, config))
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScrapeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Scrape the URLs of a search batch.
    pub async fn scrape(&self, batch: &SearchBatch) -> ScrapingResult {
        self.scrape_urls(&batch.concatenated_urls(), &batch.results)
            .await
    }

    /// Scrape a comma-separated URL list. `results` feeds the metadata
    /// fallback and may be empty.
    #[instrument(skip_all, fields(run_id = %RunId::new()))]
    pub async fn scrape_urls(&self, urls: &str, results: &[SearchResult]) -> ScrapingResult {
        let start = Instant::now();

        let all: Vec<&str> = urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .collect();
        if all.is_empty() {
            warn!("no URLs to scrape");
            let result = ScrapingResult::empty_with_error(NO_URLS_ERROR);
            self.observer.done(&result);
            return result;
        }

        let selected: Vec<String> = all
            .iter()
            .take(self.config.max_urls)
            .map(|u| u.to_string())
            .collect();
        let total = selected.len();
        info!(total, available = all.len(), "starting scrape batch");
        self.observer.batch_started(total);

        let mut set = JoinSet::new();
        let mut pending = HashMap::new();
        for url in selected {
            let fetcher = Arc::clone(&self.fetcher);
            let single = self.single.clone();
            let aggregator = self.aggregator.clone();
            let task_url = url.clone();
            let handle = set.spawn(async move {
                process_url(task_url, fetcher.as_ref(), &single, &aggregator).await
            });
            pending.insert(handle.id(), url);
        }

        let mut result = ScrapingResult {
            total_urls_processed: total,
            ..Default::default()
        };
        let mut companies = Vec::new();
        let mut settled = 0;
        let deadline = self
            .config
            .batch_timeout
            .map(|limit| (limit, tokio::time::Instant::now() + limit));

        loop {
            let next = match deadline {
                Some((_, at)) => match tokio::time::timeout_at(at, set.join_next_with_id()).await {
                    Ok(next) => next,
                    Err(_) => break,
                },
                None => set.join_next_with_id().await,
            };
            let Some(joined) = next else { break };

            let outcome = match joined {
                Ok((id, outcome)) => {
                    pending.remove(&id);
                    outcome
                }
                Err(e) => {
                    let url = pending.remove(&e.id()).unwrap_or_default();
                    task_failure(url, &e)
                }
            };
            settled += 1;

            match &outcome.error {
                None => {
                    debug!(url = %outcome.url, companies = outcome.companies.len(), "url succeeded");
                    result.successful_scrapes += 1;
                    companies.extend(outcome.companies.iter().cloned());
                }
                Some(error) => {
                    warn!(url = %outcome.url, %error, "url failed");
                    result.failed_scrapes += 1;
                    result.errors.push(error.clone());
                }
            }
            self.observer.url_finished(&outcome, settled, total);
        }

        if !pending.is_empty() {
            set.abort_all();
            let limit = deadline.map(|(limit, _)| limit.as_secs_f64()).unwrap_or_default();
            warn!(unfinished = pending.len(), "batch deadline reached");
            result.errors.push(format!(
                "Batch timed out after {limit}s; {} URL(s) unfinished",
                pending.len()
            ));
        }

        if companies.is_empty() && !results.is_empty() {
            let used = results.len().min(self.config.fallback_results);
            info!(results = used, "no companies scraped, using search metadata");
            self.observer.fallback_used(used);
            companies.extend(results.iter().take(used).map(from_search_metadata));
        }

        result.companies = dedup_companies(companies);

        info!(
            processed = result.total_urls_processed,
            successful = result.successful_scrapes,
            failed = result.failed_scrapes,
            companies = result.companies.len(),
            errors = result.errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "scrape batch completed"
        );
        self.observer.done(&result);
        result
    }
}

/// Fetch, classify and extract one URL. Every failure becomes an outcome.
async fn process_url(
    url: String,
    fetcher: &dyn PageFetcher,
    single: &SingleCompanyExtractor,
    aggregator: &AggregatorExtractor,
) -> UnitOutcome {
    let markup = match fetcher.fetch(&url).await {
        Ok(markup) if markup.trim().is_empty() => {
            let error = format!("Failed to fetch content from {url}: empty response body");
            return UnitOutcome::failed(url, None, error);
        }
        Ok(markup) => markup,
        Err(e) => {
            let error = format!("Failed to fetch content from {url}: {e}");
            return UnitOutcome::failed(url, None, error);
        }
    };

    let kind = classify(&markup, &url);
    let extracted = match kind {
        PageKind::SingleCompany => single.extract(&markup, &url).await,
        PageKind::Aggregator => aggregator.extract(&markup, &url).await,
    };

    match extracted {
        Ok(companies) if !companies.is_empty() => UnitOutcome {
            url,
            kind: Some(kind),
            companies,
            error: None,
        },
        Ok(_) => {
            let error = format!("No companies extracted from {url} - page type: {kind}");
            UnitOutcome::failed(url, Some(kind), error)
        }
        Err(e) => {
            let error = format!("Extraction failed for {url}: {e}");
            UnitOutcome::failed(url, Some(kind), error)
        }
    }
}

fn task_failure(url: String, err: &JoinError) -> UnitOutcome {
    let error = format!("Task failed for {url}: {err}");
    UnitOutcome::failed(url, None, error)
}
