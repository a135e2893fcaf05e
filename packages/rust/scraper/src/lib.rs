//! Enhanced company scraping pipeline.
//!
//! This crate provides:
//! - [`fetcher`] — browser-like HTTP page fetching behind [`PageFetcher`]
//! - [`classifier`] — single-company vs. aggregator page detection
//! - [`preprocess`] — listing extraction for directory pages
//! - [`extract`] — completion-backed structured extractors
//! - [`fallback`] — records synthesized from search metadata
//! - [`engine`] — the concurrent [`Scraper`] orchestrator

pub mod classifier;
pub mod dedup;
pub mod engine;
pub mod extract;
pub mod fallback;
pub mod fetcher;
pub mod json;
pub mod preprocess;

pub use classifier::{PageKind, PageSignals, classify};
pub use dedup::dedup_companies;
pub use engine::{NO_URLS_ERROR, ScrapeObserver, Scraper, SilentObserver, UnitOutcome};
pub use extract::{AggregatorExtractor, SingleCompanyExtractor};
pub use fallback::from_search_metadata;
pub use fetcher::{HttpFetcher, PageFetcher};
pub use json::{RawCompany, extract_json_payload, parse_company_objects, parse_json_reply};
pub use preprocess::prepare_listing;
