//! Core domain types for Leadsense: scraped companies, search results,
//! company profiles, sectors, and saved leads.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LeadsenseError;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 identifier for one discovery or scrape run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// CompanyData
// ---------------------------------------------------------------------------

/// Where a company record came from. Determines its confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Extracted from a page describing one company.
    SingleCompany,
    /// Extracted from a directory / listing page.
    Aggregator,
    /// Synthesized from a search result's title, URL, and snippet.
    SearchMetadata,
    /// Name-only placeholder produced when metadata could not be read.
    Degenerate,
}

impl Provenance {
    /// Confidence score attached to records of this provenance.
    pub fn score(self) -> f64 {
        match self {
            Self::SingleCompany => 0.8,
            Self::Aggregator => 0.6,
            Self::SearchMetadata => 0.3,
            Self::Degenerate => 0.1,
        }
    }
}

/// A company record produced by an extractor or the metadata fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyData {
    pub company_name: String,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub automation_proposal: Option<String>,
    /// The URL this record was derived from.
    pub source_url: String,
    /// Provenance-derived confidence in `[0.0, 1.0]`.
    pub confidence_score: f64,
}

impl CompanyData {
    /// Create a record with only the required fields set.
    pub fn new(
        company_name: impl Into<String>,
        source_url: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            website_url: None,
            address: None,
            contact_email: None,
            phone_number: None,
            description: None,
            automation_proposal: None,
            source_url: source_url.into(),
            confidence_score: provenance.score(),
        }
    }

    /// Identity used for deduplication: lower-cased name plus website URL.
    pub fn dedup_key(&self) -> (String, Option<String>) {
        (self.company_name.to_lowercase(), self.website_url.clone())
    }

    /// Drop provenance metadata.
    pub fn to_plain(&self) -> PlainCompany {
        PlainCompany {
            company_name: self.company_name.clone(),
            website_url: self.website_url.clone(),
            address: self.address.clone(),
            contact_email: self.contact_email.clone(),
            phone_number: self.phone_number.clone(),
            description: self.description.clone(),
            automation_proposal: self.automation_proposal.clone(),
        }
    }
}

/// The seven plain company fields, without confidence or source.
///
/// This is also the payload accepted when saving a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlainCompany {
    pub company_name: String,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub automation_proposal: Option<String>,
}

// ---------------------------------------------------------------------------
// ScrapingResult
// ---------------------------------------------------------------------------

/// Outcome of one scrape batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapingResult {
    /// Deduplicated companies, in first-seen order.
    pub companies: Vec<CompanyData>,
    /// URLs attempted (after capping).
    pub total_urls_processed: usize,
    pub successful_scrapes: usize,
    pub failed_scrapes: usize,
    /// Human-readable diagnostics, in the order they were produced.
    pub errors: Vec<String>,
}

impl ScrapingResult {
    /// A zero-count result carrying a single diagnostic.
    pub fn empty_with_error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Default::default()
        }
    }

    /// Flatten to plain field mappings for callers that ignore provenance.
    pub fn to_plain_records(&self) -> Vec<PlainCompany> {
        self.companies.iter().map(CompanyData::to_plain).collect()
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// One organic web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    /// 1-based position across the whole batch.
    pub order: usize,
}

/// Ordered search results for one discovery run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchBatch {
    pub results: Vec<SearchResult>,
}

impl SearchBatch {
    /// All result URLs joined with `", "`.
    pub fn concatenated_urls(&self) -> String {
        self.results
            .iter()
            .map(|r| r.url.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Company profile, sectors, queries
// ---------------------------------------------------------------------------

/// The profile of the company looking for leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_name: String,
    pub location: String,
    pub description: String,
    pub team_size: u32,
    pub core_services: Vec<String>,
    pub languages: Vec<String>,
    #[serde(default)]
    pub special_offer: String,
}

/// A company profile as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProfile {
    pub id: i64,
    #[serde(flatten)]
    pub profile: CompanyProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sector suggested for targeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedSector {
    /// Sector name, used for web search.
    pub name: String,
    /// Why this sector fits the profile.
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub order: u32,
}

/// A sector as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sector {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub relevance_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single generated web search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query language, e.g. "English" or "German".
    #[serde(default)]
    pub language: String,
    pub query: String,
    #[serde(default)]
    pub order: u32,
}

/// Queries generated for one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorQueries {
    pub sector: String,
    pub queries: Vec<SearchQuery>,
}

/// All queries generated for a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub searches: Vec<SectorQueries>,
}

impl QueryPlan {
    /// Flatten to query strings, sector by sector, in generated order.
    pub fn all_queries(&self) -> Vec<String> {
        self.searches
            .iter()
            .flat_map(|s| s.queries.iter().map(|q| q.query.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Leads
// ---------------------------------------------------------------------------

/// Sales pipeline status of a saved lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    ProposalSent,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::ProposalSent => "proposal_sent",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = LeadsenseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "proposal_sent" => Ok(Self::ProposalSent),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            other => Err(LeadsenseError::validation(format!(
                "unknown lead status '{other}'"
            ))),
        }
    }
}

/// Follow-up priority of a saved lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadPriority {
    Low,
    Medium,
    High,
}

impl LeadPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for LeadPriority {
    type Err = LeadsenseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(LeadsenseError::validation(format!(
                "unknown lead priority '{other}'"
            ))),
        }
    }
}

/// A saved lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    #[serde(flatten)]
    pub company: PlainCompany,
    pub discovered_at: DateTime<Utc>,
    pub discovered_by_profile_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discovered_sectors: Vec<String>,
    pub status: LeadStatus,
    pub priority: LeadPriority,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a lead's tracking fields. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadUpdate {
    pub status: Option<LeadStatus>,
    pub priority: Option<LeadPriority>,
    pub notes: Option<String>,
}

impl LeadUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: LeadPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// `true` if no field would change.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.notes.is_none()
    }
}

/// Aggregate counts over active leads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadStats {
    pub total_leads: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub priority_counts: BTreeMap<String, u64>,
    /// Leads discovered in the last 30 days.
    pub recent_leads: u64,
}
