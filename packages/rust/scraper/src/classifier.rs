//! Heuristic page-type classification.
//!
//! Decides whether fetched markup describes a single company or lists many
//! (a directory, search-results page, or "top N" roundup). The decision only
//! chooses an extraction strategy, so it is cheap and never fails.

use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Directory phrases and listing-container markup.
static DIRECTORY_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"business\s+directory",
        r"company\s+list",
        r"search\s+results",
        r"find\s+companies",
        r"business\s+listing",
        r"companies\s+in",
        r"local\s+business",
        r"yellow\s+pages",
        r"business\s+guide",
        r"company\s+directory",
        r"<table[^>]*class[^>]*listing",
        r"<div[^>]*class[^>]*listing",
        r"<ul[^>]*class[^>]*results",
        r"<div[^>]*class[^>]*results",
        r"<div[^>]*class[^>]*company-list",
        r"<div[^>]*class[^>]*business-list",
    ])
    .expect("directory patterns are valid")
});

static ORGANIZATION_NOUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(company|business|firm|enterprise|corporation|inc|llc|gmbh|ag)\b")
        .expect("organization noun pattern is valid")
});

static CONTACT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"contact|address|phone|email").expect("contact token pattern is valid")
});

/// Directory pattern hits needed to call a page an aggregator.
const MIN_DIRECTORY_HITS: usize = 2;
/// Organization nouns above which a page is an aggregator.
const MAX_ORGANIZATION_NOUNS: usize = 10;
/// Contact tokens above which a page is an aggregator.
const MAX_CONTACT_TOKENS: usize = 5;

// ---------------------------------------------------------------------------
// PageKind
// ---------------------------------------------------------------------------

/// What a fetched page appears to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    SingleCompany,
    Aggregator,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleCompany => "single_company",
            Self::Aggregator => "aggregator",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Raw scores the classification is based on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignals {
    /// Number of distinct directory patterns present.
    pub directory_hits: usize,
    /// Whole-word organization noun occurrences.
    pub organization_nouns: usize,
    /// Contact token occurrences (substring matches).
    pub contact_tokens: usize,
}

impl PageSignals {
    /// Score lower-cased `markup`.
    pub fn measure(markup: &str) -> Self {
        let lower = markup.to_lowercase();
        Self {
            directory_hits: DIRECTORY_PATTERNS.matches(&lower).iter().count(),
            organization_nouns: ORGANIZATION_NOUN.find_iter(&lower).count(),
            contact_tokens: CONTACT_TOKEN.find_iter(&lower).count(),
        }
    }

    pub fn kind(&self) -> PageKind {
        if self.directory_hits >= MIN_DIRECTORY_HITS
            || self.organization_nouns > MAX_ORGANIZATION_NOUNS
            || self.contact_tokens > MAX_CONTACT_TOKENS
        {
            PageKind::Aggregator
        } else {
            PageKind::SingleCompany
        }
    }
}

/// Classify fetched markup. `url` is only used for logging.
pub fn classify(markup: &str, url: &str) -> PageKind {
    let signals = PageSignals::measure(markup);
    let kind = signals.kind();
    debug!(
        %url,
        kind = %kind,
        directory_hits = signals.directory_hits,
        organization_nouns = signals.organization_nouns,
        contact_tokens = signals.contact_tokens,
        "classified page"
    );
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/";

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn directory_phrases_and_listing_table_make_aggregator() {
        let markup = r#"<html><body>
            <h1>Business Directory</h1>
            <p>The largest business directory in Zurich.</p>
            <table class="listing"><tr><td>Acme</td></tr></table>
        </body></html>"#;

        let signals = PageSignals::measure(markup);
        assert!(signals.directory_hits >= 2);
        assert_eq!(classify(markup, URL), PageKind::Aggregator);
    }

    #[test]
    fn plain_company_page_is_single_company() {
        let markup = r#"<html><body>
            <h1>Acme Robotics</h1>
            <p>We build warehouse robots for the logistics company of tomorrow.</p>
            <p>Contact us: hello@acme.example</p>
        </body></html>"#;

        let signals = PageSignals::measure(markup);
        assert!(signals.organization_nouns < 10);
        assert!(signals.contact_tokens <= 5);
        assert_eq!(classify(markup, URL), PageKind::SingleCompany);
    }

    #[test]
    fn many_organization_nouns_make_aggregator() {
        let markup = "<p>".to_string() + &"GmbH ".repeat(11) + "</p>";
        assert_eq!(PageSignals::measure(&markup).organization_nouns, 11);
        assert_eq!(classify(&markup, URL), PageKind::Aggregator);
    }

    #[test]
    fn organization_nouns_need_word_boundaries() {
        // "again" and "firmware" must not count
        let signals = PageSignals::measure("again and again the firmware stage");
        assert_eq!(signals.organization_nouns, 0);
    }

    #[test]
    fn contact_tokens_count_substrings() {
        let signals = PageSignals::measure("contacts emails phones addresses contact email");
        assert_eq!(signals.contact_tokens, 6);
        assert_eq!(signals.kind(), PageKind::Aggregator);
    }

    #[test]
    fn single_directory_hit_is_not_enough() {
        let signals = PageSignals::measure("<p>Search results</p>");
        assert_eq!(signals.directory_hits, 1);
        assert_eq!(signals.kind(), PageKind::SingleCompany);
    }

    #[test]
    fn empty_markup_is_single_company() {
        assert_eq!(classify("", URL), PageKind::SingleCompany);
    }

    #[test]
    fn fixtures_classify_as_expected() {
        assert_eq!(classify(&load_fixture("directory.html"), URL), PageKind::Aggregator);
        assert_eq!(classify(&load_fixture("company.html"), URL), PageKind::SingleCompany);
    }

    #[test]
    fn page_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PageKind::SingleCompany).unwrap(),
            "\"single_company\""
        );
        assert_eq!(PageKind::Aggregator.to_string(), "aggregator");
    }
}
