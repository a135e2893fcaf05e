//! Core orchestration and domain logic for Leadsense.
//!
//! This crate ties together the planning agents, web search, scraping,
//! and lead storage into end-to-end workflows (e.g., `discover_leads`).

pub mod agents;
pub mod leads;
pub mod pipeline;

pub use agents::{describe_profile, generate_queries, identify_sectors};
pub use leads::SaveSummary;
pub use pipeline::{DiscoveryOutcome, LeadDiscovery, ProgressReporter, SilentProgress};
