//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use tracing::info;

use leadsense_core::leads::{self, SaveSummary};
use leadsense_core::{LeadDiscovery, identify_sectors};
use leadsense_discovery::SerperClient;
use leadsense_llm::{CompletionClient, OpenRouterClient};
use leadsense_scraper::Scraper;
use leadsense_shared::{
    AppConfig, CompanyData, CompanyProfile, Lead, LeadPriority, LeadStatus, LeadUpdate,
    PlainCompany, ScrapeConfig, ScrapingResult, init_config, load_config, read_api_key,
    resolve_db_path, validate_api_key,
};
use leadsense_storage::Storage;

use crate::progress::CliProgress;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Leadsense — find and track B2B leads.
#[derive(Parser)]
#[command(
    name = "leadsense",
    version,
    about = "Discover target sectors, search and scrape business websites, and track leads.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline: sectors, queries, search, scrape.
    Discover {
        /// Company profile TOML file.
        #[arg(short, long)]
        profile: PathBuf,

        /// Target sector (repeatable). Skips sector identification.
        #[arg(short, long = "sector")]
        sectors: Vec<String>,

        /// Save discovered companies as leads.
        #[arg(long)]
        save: bool,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Scrape a comma-separated list of URLs for company data.
    Scrape {
        /// URLs, e.g. "https://a.example, https://b.example".
        urls: String,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Target sector management.
    Sectors {
        #[command(subcommand)]
        action: SectorsAction,
    },

    /// Company profile management.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Saved lead management.
    Leads {
        #[command(subcommand)]
        action: LeadsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Sector subcommands.
#[derive(Subcommand)]
pub(crate) enum SectorsAction {
    /// Ask the model which sectors a profile should target.
    Identify {
        /// Company profile TOML file.
        #[arg(short, long)]
        profile: PathBuf,

        /// Store the identified sectors.
        #[arg(long)]
        save: bool,
    },
    /// List stored sectors.
    List,
}

/// Profile subcommands.
#[derive(Subcommand)]
pub(crate) enum ProfileAction {
    /// Store a profile from a TOML file.
    Add {
        /// Company profile TOML file.
        file: PathBuf,
    },
    /// List stored profiles.
    List,
    /// Show one stored profile.
    Show {
        id: i64,
    },
    /// Remove a stored profile.
    Delete {
        id: i64,
    },
}

/// Lead subcommands.
#[derive(Subcommand)]
pub(crate) enum LeadsAction {
    /// List saved leads, newest first.
    List {
        /// Only leads with this status.
        #[arg(long)]
        status: Option<LeadStatus>,

        /// Only leads discovered for this profile id.
        #[arg(long)]
        profile: Option<i64>,

        #[arg(long, default_value = "0")]
        offset: u32,

        #[arg(long, default_value = "100")]
        limit: u32,
    },
    /// Show one saved lead.
    Show {
        id: i64,
    },
    /// Save a company as a lead.
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        proposal: Option<String>,
        /// Sector the lead was found in (repeatable).
        #[arg(long = "sector")]
        sectors: Vec<String>,
    },
    /// Change a lead's status, priority, or notes.
    Update {
        id: i64,
        #[arg(long)]
        status: Option<LeadStatus>,
        #[arg(long)]
        priority: Option<LeadPriority>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove a lead.
    Delete {
        id: i64,
    },
    /// Show lead counts.
    Stats,
    /// Search leads by name, description, or proposal.
    Search {
        term: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "leadsense=info",
        1 => "leadsense=debug",
        _ => "leadsense=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Discover {
            profile,
            sectors,
            save,
            json,
        } => cmd_discover(&profile, &sectors, save, json).await,
        Command::Scrape { urls, json } => cmd_scrape(&urls, json).await,
        Command::Sectors { action } => match action {
            SectorsAction::Identify { profile, save } => cmd_sectors_identify(&profile, save).await,
            SectorsAction::List => cmd_sectors_list().await,
        },
        Command::Profile { action } => match action {
            ProfileAction::Add { file } => cmd_profile_add(&file).await,
            ProfileAction::List => cmd_profile_list().await,
            ProfileAction::Show { id } => cmd_profile_show(id).await,
            ProfileAction::Delete { id } => cmd_profile_delete(id).await,
        },
        Command::Leads { action } => run_leads(action).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn run_leads(action: LeadsAction) -> Result<()> {
    match action {
        LeadsAction::List {
            status,
            profile,
            offset,
            limit,
        } => cmd_leads_list(status, profile, offset, limit).await,
        LeadsAction::Show { id } => cmd_leads_show(id).await,
        LeadsAction::Save {
            name,
            website,
            address,
            email,
            phone,
            description,
            proposal,
            sectors,
        } => {
            let company = PlainCompany {
                company_name: name,
                website_url: website,
                address,
                contact_email: email,
                phone_number: phone,
                description,
                automation_proposal: proposal,
            };
            cmd_leads_save(&company, &sectors).await
        }
        LeadsAction::Update {
            id,
            status,
            priority,
            notes,
        } => {
            let update = LeadUpdate {
                status,
                priority,
                notes,
            };
            cmd_leads_update(id, &update).await
        }
        LeadsAction::Delete { id } => cmd_leads_delete(id).await,
        LeadsAction::Stats => cmd_leads_stats().await,
        LeadsAction::Search { term } => cmd_leads_search(&term).await,
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// Read a company profile from a TOML file.
fn read_profile(path: &Path) -> Result<CompanyProfile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read profile '{}': {e}", path.display()))?;
    let profile: CompanyProfile = toml::from_str(&content)
        .map_err(|e| eyre!("invalid profile '{}': {e}", path.display()))?;
    if profile.company_name.trim().is_empty() {
        return Err(eyre!("profile '{}' has no company_name", path.display()));
    }
    Ok(profile)
}

/// Open the configured database. Read-only commands open an existing
/// database without write access.
async fn open_storage(config: &AppConfig, readonly: bool) -> Result<Storage> {
    let path = resolve_db_path(config)?;
    let storage = if readonly && path.exists() {
        Storage::open_readonly(&path).await?
    } else {
        Storage::open(&path).await?
    };
    Ok(storage)
}

fn completion_client(config: &AppConfig) -> Result<Arc<dyn CompletionClient>> {
    let client = OpenRouterClient::from_config(&config.llm)?;
    info!(model = client.model(), "using completion model");
    Ok(Arc::new(client))
}

fn build_scraper(
    config: &AppConfig,
    client: Arc<dyn CompletionClient>,
    progress: Arc<CliProgress>,
) -> Result<Scraper> {
    let scraper = Scraper::with_http(client, ScrapeConfig::from(config))?.with_observer(progress);
    Ok(scraper)
}

// ---------------------------------------------------------------------------
// Pipeline commands
// ---------------------------------------------------------------------------

async fn cmd_discover(profile_path: &Path, sectors: &[String], save: bool, json: bool) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;
    let profile = read_profile(profile_path)?;

    let client = completion_client(&config)?;
    let search = SerperClient::from_config(&config.search)?;
    let progress = Arc::new(CliProgress::new());
    let scraper = build_scraper(&config, client.clone(), progress.clone())?;

    info!(company = %profile.company_name, sectors = sectors.len(), "starting discovery");
    let discovery = LeadDiscovery::new(client, search, scraper);
    let outcome = discovery
        .discover_leads(&profile, sectors, progress.as_ref())
        .await;
    progress.finish();
    let outcome = outcome?;

    if json {
        let value = serde_json::json!({
            "sectors": outcome.sectors,
            "plan": outcome.plan,
            "search_results": outcome.search.results,
            "scraping": outcome.scraping,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!();
        println!("  Sectors:");
        for sector in &outcome.sectors {
            println!("    {}. {}", sector.order, sector.name);
        }
        println!("  Queries:");
        for query in outcome.plan.all_queries() {
            println!("    - {query}");
        }
        println!("  Search results: {}", outcome.search.results.len());
        print_scraping(&outcome.scraping);
        println!("  Time: {:.1}s", outcome.elapsed.as_secs_f64());
        println!();
    }

    if save {
        let storage = open_storage(&config, false).await?;
        let searched = outcome.searched_sectors();
        for sector in &outcome.sectors {
            if searched.contains(&sector.name) {
                storage
                    .get_or_create_sector(&sector.name, None, Some(&sector.justification))
                    .await?;
            }
        }
        let summary = leads::save_discovered(&storage, &outcome.scraping.companies, &searched).await?;
        print_save_summary(&summary);
    }

    Ok(())
}

async fn cmd_scrape(urls: &str, json: bool) -> Result<()> {
    let config = load_config()?;
    read_api_key(&config.llm.api_key_env)?;

    let client = completion_client(&config)?;
    let progress = Arc::new(CliProgress::new());
    let scraper = build_scraper(&config, client, progress.clone())?;

    let result = scraper.scrape_urls(urls, &[]).await;
    progress.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        print_scraping(&result);
        println!();
    }
    Ok(())
}

async fn cmd_sectors_identify(profile_path: &Path, save: bool) -> Result<()> {
    let config = load_config()?;
    read_api_key(&config.llm.api_key_env)?;
    let profile = read_profile(profile_path)?;

    let client = completion_client(&config)?;
    let sectors = identify_sectors(client.as_ref(), &profile).await?;

    println!();
    for sector in &sectors {
        println!("  {}. {}", sector.order, sector.name);
        if !sector.justification.is_empty() {
            println!("     {}", sector.justification);
        }
    }
    println!();

    if save {
        let storage = open_storage(&config, false).await?;
        for sector in &sectors {
            storage
                .get_or_create_sector(&sector.name, None, Some(&sector.justification))
                .await?;
        }
        println!("  Saved {} sector(s).", sectors.len());
    }
    Ok(())
}

async fn cmd_sectors_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, true).await?;
    let sectors = storage.list_sectors().await?;

    if sectors.is_empty() {
        println!("No sectors stored. Run `leadsense sectors identify --save`.");
        return Ok(());
    }
    for sector in sectors {
        println!("  [{}] {}", sector.id, sector.name);
        if let Some(reason) = sector.relevance_reason.filter(|r| !r.is_empty()) {
            println!("       {reason}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Profile commands
// ---------------------------------------------------------------------------

async fn cmd_profile_add(file: &Path) -> Result<()> {
    let config = load_config()?;
    let profile = read_profile(file)?;
    let storage = open_storage(&config, false).await?;
    let id = storage.insert_profile(&profile).await?;
    println!("Profile saved with id {id}.");
    Ok(())
}

async fn cmd_profile_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, true).await?;
    let profiles = storage.list_profiles().await?;

    if profiles.is_empty() {
        println!("No profiles stored. Run `leadsense profile add <file>`.");
        return Ok(());
    }
    for stored in profiles {
        println!(
            "  [{}] {} ({}, team of {})",
            stored.id, stored.profile.company_name, stored.profile.location, stored.profile.team_size
        );
    }
    Ok(())
}

async fn cmd_profile_show(id: i64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, true).await?;
    let stored = storage
        .get_profile(id)
        .await?
        .ok_or_else(|| eyre!("profile {id} not found"))?;
    println!("{}", toml::to_string_pretty(&stored.profile)?);
    Ok(())
}

async fn cmd_profile_delete(id: i64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, false).await?;
    if !storage.delete_profile(id).await? {
        return Err(eyre!("profile {id} not found"));
    }
    println!("Profile {id} deleted.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Lead commands
// ---------------------------------------------------------------------------

async fn cmd_leads_list(
    status: Option<LeadStatus>,
    profile: Option<i64>,
    offset: u32,
    limit: u32,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, true).await?;

    let found = match (status, profile) {
        (Some(status), Some(profile)) => storage
            .list_leads_by_status(status)
            .await?
            .into_iter()
            .filter(|l| l.discovered_by_profile_id == Some(profile))
            .collect(),
        (Some(status), None) => storage.list_leads_by_status(status).await?,
        (None, Some(profile)) => storage.list_leads_by_profile(profile).await?,
        (None, None) => storage.list_leads(offset, limit).await?,
    };

    print_leads(&found);
    Ok(())
}

async fn cmd_leads_show(id: i64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, true).await?;
    let lead = leads::get_lead(&storage, id).await?;
    println!("{}", serde_json::to_string_pretty(&lead)?);
    Ok(())
}

async fn cmd_leads_save(company: &PlainCompany, sectors: &[String]) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, false).await?;
    let lead = leads::save_lead(&storage, company, sectors).await?;
    println!("Lead saved with id {}.", lead.id);
    Ok(())
}

async fn cmd_leads_update(id: i64, update: &LeadUpdate) -> Result<()> {
    if update.is_empty() {
        return Err(eyre!("nothing to update: pass --status, --priority, or --notes"));
    }
    let config = load_config()?;
    let storage = open_storage(&config, false).await?;
    let lead = leads::update_lead(&storage, id, update).await?;
    println!(
        "Lead {} is now {} / {} priority.",
        lead.id,
        lead.status.as_str(),
        lead.priority.as_str()
    );
    Ok(())
}

async fn cmd_leads_delete(id: i64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, false).await?;
    leads::delete_lead(&storage, id).await?;
    println!("Lead {id} deleted.");
    Ok(())
}

async fn cmd_leads_stats() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, true).await?;
    let stats = storage.lead_stats().await?;

    println!();
    println!("  Total leads:  {}", stats.total_leads);
    println!("  Last 30 days: {}", stats.recent_leads);
    println!("  By status:");
    for (status, count) in &stats.status_counts {
        println!("    {status:<14} {count}");
    }
    println!("  By priority:");
    for (priority, count) in &stats.priority_counts {
        println!("    {priority:<14} {count}");
    }
    println!();
    Ok(())
}

async fn cmd_leads_search(term: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, true).await?;
    let found = storage.search_leads(term).await?;
    print_leads(&found);
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_scraping(result: &ScrapingResult) {
    println!(
        "  URLs: {} processed, {} succeeded, {} failed",
        result.total_urls_processed, result.successful_scrapes, result.failed_scrapes
    );
    println!("  Companies: {}", result.companies.len());
    for company in &result.companies {
        print_company(company);
    }
    if !result.errors.is_empty() {
        println!("  Errors:");
        for error in &result.errors {
            println!("    - {error}");
        }
    }
}

fn print_company(company: &CompanyData) {
    println!(
        "    * {} (confidence {:.1})",
        company.company_name, company.confidence_score
    );
    for (label, value) in [
        ("web", &company.website_url),
        ("email", &company.contact_email),
        ("phone", &company.phone_number),
        ("address", &company.address),
    ] {
        if let Some(value) = value {
            println!("        {label}: {value}");
        }
    }
}

fn print_leads(found: &[Lead]) {
    if found.is_empty() {
        println!("No leads found.");
        return;
    }
    for lead in found {
        println!(
            "  [{}] {:<32} {:<14} {:<7} {}",
            lead.id,
            lead.company.company_name,
            lead.status.as_str(),
            lead.priority.as_str(),
            lead.company.website_url.as_deref().unwrap_or("-")
        );
    }
}

fn print_save_summary(summary: &SaveSummary) {
    println!("  Saved {} new lead(s).", summary.saved.len());
    if !summary.duplicates.is_empty() {
        println!("  Already saved: {}", summary.duplicates.join(", "));
    }
}
