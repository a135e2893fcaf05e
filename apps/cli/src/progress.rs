//! Terminal progress reporting for long-running commands.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use leadsense_core::{DiscoveryOutcome, ProgressReporter};
use leadsense_scraper::{ScrapeObserver, UnitOutcome};
use leadsense_shared::ScrapingResult;

/// CLI progress reporter using an indicatif spinner.
///
/// Serves both as the discovery pipeline's phase reporter and as the
/// scraper's per-URL observer, so a `discover` run shows one spinner.
pub(crate) struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _outcome: &DiscoveryOutcome) {
        self.spinner.finish_and_clear();
    }
}

impl ScrapeObserver for CliProgress {
    fn batch_started(&self, urls: usize) {
        self.spinner.set_message(format!("Scraping {urls} URL(s)"));
    }

    fn url_finished(&self, outcome: &UnitOutcome, settled: usize, total: usize) {
        let status = match &outcome.error {
            Some(_) => "failed".to_string(),
            None => format!("{} compan(ies)", outcome.companies.len()),
        };
        self.spinner
            .set_message(format!("[{settled}/{total}] {} ({status})", outcome.url));
    }

    fn fallback_used(&self, results: usize) {
        self.spinner
            .set_message(format!("No page yielded companies, using {results} search result(s)"));
    }

    fn done(&self, result: &ScrapingResult) {
        self.spinner.set_message(format!(
            "Scraped {} URL(s), {} compan(ies)",
            result.total_urls_processed,
            result.companies.len()
        ));
    }
}
