//! Completion-backed planning agents: which sectors to target and what to
//! search for in them.

use serde::Deserialize;
use tracing::{debug, info, instrument};

use leadsense_llm::{CompletionClient, CompletionRequest};
use leadsense_scraper::parse_json_reply;
use leadsense_shared::{CompanyProfile, QueryPlan, RecommendedSector, Result};

/// Sectors requested from the model per profile.
pub const SECTOR_COUNT: usize = 10;

/// Sectors that get search queries.
pub const QUERY_SECTORS: usize = 2;

/// Queries generated per sector and language.
pub const QUERIES_PER_LANGUAGE: usize = 3;

const SECTOR_INSTRUCTIONS: &str = r#"You are a business development expert helping a small automation and AI company find the most promising business sectors to target.

Given the company profile, recommend {count} sectors or niches the company should target. For each, give a short justification based on the company's size, location, and services. Be creative and think beyond the obvious.

Respond with ONLY a JSON array:
[{"name": "sector name usable in a web search", "justification": "...", "order": 1}]

Order 1 is the strongest fit."#;

const QUERY_INSTRUCTIONS: &str = r#"You are a lead generation assistant. You write web search queries that find small businesses in a given sector.

Pick the {sectors} sectors most relevant to the company profile. For each, write {per_language} search queries in each of these languages: {languages}. Queries should surface local small companies, service providers, and startups without a dedicated IT department, near the company's location. Order queries by relevance.

Respond with ONLY a JSON object:
{"searches": [{"sector": "...", "queries": [{"language": "English", "query": "...", "order": 1}]}]}"#;

/// Render a profile as the plain-text block the agents read.
pub fn describe_profile(profile: &CompanyProfile) -> String {
    let mut text = format!(
        "Company: {}\nLocation: {}\nDescription: {}\nTeam size: {}\nCore services: {}\nLanguages: {}",
        profile.company_name,
        profile.location,
        profile.description,
        profile.team_size,
        profile.core_services.join(", "),
        profile.languages.join(", "),
    );
    if !profile.special_offer.trim().is_empty() {
        text.push_str(&format!("\nSpecial offer: {}", profile.special_offer));
    }
    text
}

// ---------------------------------------------------------------------------
// Sector identification
// ---------------------------------------------------------------------------

/// Models answer with a bare list or wrap it in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SectorReply {
    List(Vec<RecommendedSector>),
    Wrapped {
        #[serde(alias = "sectors", alias = "recomended_sectors")]
        recommended_sectors: Vec<RecommendedSector>,
    },
}

/// Ask the model which sectors the profile should target.
///
/// Sectors come back sorted by `order`; nameless entries are dropped.
#[instrument(skip_all, fields(company = %profile.company_name))]
pub async fn identify_sectors(
    client: &dyn CompletionClient,
    profile: &CompanyProfile,
) -> Result<Vec<RecommendedSector>> {
    let request = CompletionRequest::new(
        SECTOR_INSTRUCTIONS.replace("{count}", &SECTOR_COUNT.to_string()),
        format!("Company profile:\n{}", describe_profile(profile)),
    );
    let reply = client.complete(request).await?;

    let mut sectors = match parse_json_reply::<SectorReply>(&reply.text)? {
        SectorReply::List(list) => list,
        SectorReply::Wrapped { recommended_sectors } => recommended_sectors,
    };
    sectors.retain(|s| !s.name.trim().is_empty());
    sectors.sort_by_key(|s| s.order);

    info!(count = sectors.len(), "sectors identified");
    Ok(sectors)
}

// ---------------------------------------------------------------------------
// Query generation
// ---------------------------------------------------------------------------

/// Ask the model for search queries covering the top sectors.
///
/// The plan is capped at [`QUERY_SECTORS`] sectors; blank queries are
/// dropped, as are sectors left without any.
#[instrument(skip_all, fields(sectors = sectors.len()))]
pub async fn generate_queries(
    client: &dyn CompletionClient,
    sectors: &[RecommendedSector],
    profile: &CompanyProfile,
) -> Result<QueryPlan> {
    let languages = if profile.languages.is_empty() {
        "English".to_string()
    } else {
        profile.languages.join(", ")
    };
    let instructions = QUERY_INSTRUCTIONS
        .replace("{sectors}", &QUERY_SECTORS.to_string())
        .replace("{per_language}", &QUERIES_PER_LANGUAGE.to_string())
        .replace("{languages}", &languages);

    let sector_names: Vec<&str> = sectors.iter().map(|s| s.name.as_str()).collect();
    let request = CompletionRequest::new(
        instructions,
        format!(
            "Sectors to generate queries for:\n{}\n\nCompany profile:\n{}\n\nTarget leads near {}.",
            sector_names.join(", "),
            describe_profile(profile),
            profile.location,
        ),
    );
    let reply = client.complete(request).await?;

    let mut plan: QueryPlan = parse_json_reply(&reply.text)?;
    for search in &mut plan.searches {
        search.queries.retain(|q| !q.query.trim().is_empty());
    }
    plan.searches.retain(|s| !s.queries.is_empty());
    plan.searches.truncate(QUERY_SECTORS);

    debug!(queries = plan.all_queries().len(), "query plan ready");
    Ok(plan)
}
