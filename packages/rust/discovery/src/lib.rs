//! Web search execution against the Serper Google Search API.
//!
//! Turns generated search queries into an ordered [`SearchBatch`] of
//! organic results, which the scraper then visits. Only the first few
//! queries are run and only the top results of each are kept, so one
//! discovery run costs a bounded number of API calls.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use leadsense_shared::{
    LeadsenseError, QueryPlan, Result, SearchBatch, SearchConfig, SearchResult, read_api_key,
    truncate_chars,
};

/// Default Serper search endpoint.
pub const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

/// Timeout for one search request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const MAX_TITLE_CHARS: usize = 200;
const MAX_SNIPPET_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
    gl: &'a str,
    hl: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Limits and locale for a search run.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Queries executed per run; the rest are ignored.
    pub max_queries: usize,
    /// Organic results kept per query.
    pub results_per_query: usize,
    /// Results requested from the API per query.
    pub num: u32,
    /// Country code (`gl`).
    pub country: String,
    /// Interface language (`hl`).
    pub language: String,
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_queries: config.max_queries,
            results_per_query: config.results_per_query,
            num: config.num,
            country: config.country.clone(),
            language: config.language.clone(),
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SerperClient
// ---------------------------------------------------------------------------

/// Client for the Serper search API.
#[derive(Clone)]
pub struct SerperClient {
    http: Client,
    api_key: String,
    endpoint: String,
    options: SearchOptions,
}

impl SerperClient {
    pub fn new(api_key: impl Into<String>, options: SearchOptions) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LeadsenseError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
            options,
        })
    }

    /// Build a client from `[search]` config, reading the key from its env var.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = read_api_key(&config.api_key_env)?;
        Self::new(api_key, SearchOptions::from(config))
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Run every query of a plan, subject to `max_queries`.
    pub async fn search_plan(&self, plan: &QueryPlan) -> Result<SearchBatch> {
        self.search(&plan.all_queries()).await
    }

    /// Run the first `max_queries` queries sequentially.
    ///
    /// A failing query is logged and skipped; it never fails the run.
    /// Results are numbered from 1 across the whole batch.
    #[instrument(skip_all, fields(queries = queries.len()))]
    pub async fn search(&self, queries: &[String]) -> Result<SearchBatch> {
        if queries.is_empty() {
            info!("no search queries");
            return Ok(SearchBatch::default());
        }

        let mut results = Vec::new();
        for query in queries.iter().take(self.options.max_queries) {
            let organic = match self.run_query(query).await {
                Ok(organic) => organic,
                Err(e) => {
                    warn!(%query, error = %e, "search query failed, skipping");
                    continue;
                }
            };

            let mut kept = 0;
            for item in organic {
                if kept == self.options.results_per_query {
                    break;
                }
                if !is_web_url(&item.link) {
                    debug!(%query, link = %item.link, "skipping result without a web URL");
                    continue;
                }
                kept += 1;
                results.push(SearchResult {
                    title: truncate_chars(&item.title, MAX_TITLE_CHARS).to_string(),
                    url: item.link,
                    description: truncate_chars(&item.snippet, MAX_SNIPPET_CHARS).to_string(),
                    order: results.len() + 1,
                });
            }
            debug!(%query, kept, "search query finished");
        }

        info!(results = results.len(), "search completed");
        Ok(SearchBatch { results })
    }

    async fn run_query(&self, query: &str) -> Result<Vec<OrganicResult>> {
        let body = SearchRequest {
            q: query,
            num: self.options.num,
            gl: &self.options.country,
            hl: &self.options.language,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LeadsenseError::Timeout(format!("search '{query}': {e}"))
                } else {
                    LeadsenseError::Network(format!("search '{query}': {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LeadsenseError::Search(format!(
                "search '{query}': HTTP {status}: {text}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| LeadsenseError::Search(format!("search '{query}': invalid reply: {e}")))?;

        Ok(parsed.organic)
    }
}

/// Absolute http(s) URL check.
fn is_web_url(link: &str) -> bool {
    Url::parse(link)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn organic(n: usize, prefix: &str) -> serde_json::Value {
        json!({
            "organic": (1..=n).map(|i| json!({
                "title": format!("{prefix} {i}"),
                "link": format!("https://{prefix}{i}.example/"),
                "snippet": format!("About {prefix} {i}"),
            })).collect::<Vec<_>>()
        })
    }

    fn client_for(server: &MockServer) -> SerperClient {
        SerperClient::new("serper-key", SearchOptions::default())
            .unwrap()
            .with_endpoint(format!("{}/search", server.uri()))
    }

    fn queries(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn runs_first_three_queries_and_keeps_top_two() {
        let server = MockServer::start().await;
        for (q, prefix) in [("dentist zurich", "dent"), ("law firm zurich", "law"), ("architect zurich", "arch")] {
            Mock::given(method("POST"))
                .and(path("/search"))
                .and(header("x-api-key", "serper-key"))
                .and(body_partial_json(json!({"q": q, "num": 3, "gl": "ch", "hl": "en"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(organic(3, prefix)))
                .expect(1)
                .mount(&server)
                .await;
        }

        let batch = client_for(&server)
            .search(&queries(&[
                "dentist zurich",
                "law firm zurich",
                "architect zurich",
                "bakery zurich",
            ]))
            .await
            .unwrap();

        assert_eq!(batch.results.len(), 6);
        let orders: Vec<usize> = batch.results.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(batch.results[0].url, "https://dent1.example/");
        assert_eq!(batch.results[2].title, "law 1");
        assert_eq!(batch.results[5].description, "About arch 2");
    }

    #[tokio::test]
    async fn failing_query_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"q": "broken"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"q": "works"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(2, "ok")))
            .mount(&server)
            .await;

        let batch = client_for(&server)
            .search(&queries(&["broken", "works"]))
            .await
            .unwrap();

        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[0].order, 1);
        assert_eq!(batch.concatenated_urls(), "https://ok1.example/, https://ok2.example/");
    }

    #[tokio::test]
    async fn truncates_long_fields_and_skips_bad_links() {
        let server = MockServer::start().await;
        let long_title = "T".repeat(300);
        let long_snippet = "ä".repeat(800);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    {"title": "No link"},
                    {"title": long_title, "link": "https://long.example/", "snippet": long_snippet},
                    {"title": "Relative", "link": "/relative"},
                    {"title": "Second", "link": "http://second.example/"}
                ]
            })))
            .mount(&server)
            .await;

        let batch = client_for(&server).search(&queries(&["q"])).await.unwrap();

        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[0].title.chars().count(), 200);
        assert_eq!(batch.results[0].description.chars().count(), 500);
        assert_eq!(batch.results[1].url, "http://second.example/");
    }

    #[tokio::test]
    async fn empty_query_list_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(1, "x")))
            .expect(0)
            .mount(&server)
            .await;

        let batch = client_for(&server).search(&[]).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn search_plan_flattens_queries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(1, "p")))
            .expect(2)
            .mount(&server)
            .await;

        let plan: QueryPlan = serde_json::from_value(json!({
            "searches": [
                {"sector": "Dental", "queries": [{"query": "dentist zurich"}]},
                {"sector": "Legal", "queries": [{"query": "law firm zurich"}]}
            ]
        }))
        .unwrap();

        let batch = client_for(&server).search_plan(&plan).await.unwrap();
        assert_eq!(batch.results.len(), 2);
    }

    #[test]
    fn web_url_check() {
        assert!(is_web_url("https://acme.example/about"));
        assert!(!is_web_url("ftp://acme.example/"));
        assert!(!is_web_url("/relative"));
        assert!(!is_web_url(""));
    }
}
