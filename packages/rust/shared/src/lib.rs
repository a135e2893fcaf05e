//! Shared types, error model, and configuration for Leadsense.
//!
//! This crate is the foundation depended on by all other Leadsense crates.
//! It provides:
//! - [`LeadsenseError`] — the unified error type
//! - Domain types ([`CompanyData`], [`ScrapingResult`], [`SearchBatch`], [`Lead`], ...)
//! - Configuration ([`AppConfig`], [`ScrapeConfig`], config loading)

pub mod config;
pub mod error;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, LlmConfig, ScrapeConfig, ScraperConfig, SearchConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, read_api_key, resolve_db_path,
    validate_api_key,
};
pub use error::{LeadsenseError, Result};
pub use text::truncate_chars;
pub use types::{
    CompanyData, CompanyProfile, Lead, LeadPriority, LeadStats, LeadStatus, LeadUpdate,
    PlainCompany, Provenance, QueryPlan, RecommendedSector, RunId, ScrapingResult, SearchBatch,
    SearchQuery, SearchResult, Sector, SectorQueries, StoredProfile,
};
