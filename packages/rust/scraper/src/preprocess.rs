//! Listing preprocessor for aggregator pages.
//!
//! Directory pages are mostly chrome. Before the markup goes to the
//! extraction model we drop page furniture and keep only the elements
//! that usually hold one listing each, within a character budget.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use leadsense_shared::truncate_chars;

/// Page furniture that never holds a listing.
static NOISE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "script, style, template, noscript, header, nav, footer, \
         [class*=\"cookie\"], [id*=\"cookie\"], \
         [class*=\"breadcrumb\"], [aria-label=\"breadcrumb\"]",
    )
    .expect("valid selector")
});

/// Elements that typically wrap one listing entry.
static FRAGMENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li, tr, div, section, article").expect("valid selector"));

/// Elements serialized without a closing tag.
const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Reduce `markup` to listing fragments, at most `budget` characters long.
///
/// Fragments keep their HTML (links and `mailto:` hrefs carry contact data)
/// and are joined with newlines in document order. Nested candidates are
/// all kept; the cut at `budget` does not respect fragment boundaries.
pub fn prepare_listing(markup: &str, budget: usize) -> String {
    let doc = Html::parse_document(markup);
    let fragments = collect_fragments(&doc, budget);
    truncate_chars(&fragments.join("\n"), budget).to_string()
}

/// Serialize listing fragments until `budget` characters are written.
fn collect_fragments(doc: &Html, budget: usize) -> Vec<String> {
    let noise: HashSet<_> = doc.select(&NOISE).map(|el| el.id()).collect();
    let is_noise = |el: ElementRef<'_>| noise.contains(&el.id());
    let in_noise = |el: ElementRef<'_>| {
        is_noise(el) || el.ancestors().any(|a| noise.contains(&a.id()))
    };

    let mut fragments = Vec::new();
    let mut written = 0usize;
    for el in doc.select(&FRAGMENTS) {
        if written >= budget {
            break;
        }
        if in_noise(el) {
            continue;
        }

        let has_text = el
            .descendants()
            .filter_map(|node| node.value().as_text().map(|t| (node, t)))
            .any(|(node, text)| {
                !text.trim().is_empty() && !node.ancestors().any(|a| noise.contains(&a.id()))
            });
        if !has_text {
            continue;
        }

        // One separator char precedes every fragment but the first.
        let separator = usize::from(!fragments.is_empty());
        let remaining = budget.saturating_sub(written + separator);
        let mut out = FragmentWriter::new(remaining);
        out.element(el, &is_noise);
        written += separator + out.chars;
        fragments.push(out.html);
    }
    fragments
}

/// Writes an element's HTML without its noise subtrees, stopping once
/// `limit` characters have been produced.
struct FragmentWriter {
    html: String,
    chars: usize,
    limit: usize,
}

enum Step<'a> {
    Open(ElementRef<'a>),
    Text(&'a str),
    Close(&'a str),
}

impl FragmentWriter {
    fn new(limit: usize) -> Self {
        Self {
            html: String::new(),
            chars: 0,
            limit,
        }
    }

    fn full(&self) -> bool {
        self.chars >= self.limit
    }

    fn push(&mut self, s: &str) {
        self.html.push_str(s);
        self.chars += s.chars().count();
    }

    fn push_escaped(&mut self, s: &str, attribute: bool) {
        for c in s.chars() {
            match c {
                '&' => self.push("&amp;"),
                '"' if attribute => self.push("&quot;"),
                '<' if !attribute => self.push("&lt;"),
                '>' if !attribute => self.push("&gt;"),
                c => {
                    self.html.push(c);
                    self.chars += 1;
                }
            }
        }
    }

    fn element(&mut self, root: ElementRef<'_>, is_noise: &impl Fn(ElementRef<'_>) -> bool) {
        let mut stack = vec![Step::Open(root)];
        while let Some(step) = stack.pop() {
            if self.full() {
                return;
            }
            match step {
                Step::Text(text) => self.push_escaped(text, false),
                Step::Close(name) => {
                    self.push("</");
                    self.push(name);
                    self.push(">");
                }
                Step::Open(el) => {
                    let element = el.value();
                    self.push("<");
                    self.push(element.name());
                    for (key, value) in element.attrs() {
                        self.push(" ");
                        self.push(key);
                        self.push("=\"");
                        self.push_escaped(value, true);
                        self.push("\"");
                    }
                    self.push(">");
                    if VOID.contains(&element.name()) {
                        continue;
                    }

                    stack.push(Step::Close(element.name()));
                    let children: Vec<_> = el.children().collect();
                    for child in children.into_iter().rev() {
                        if let Some(text) = child.value().as_text() {
                            stack.push(Step::Text(&**text));
                        } else if let Some(child_el) = ElementRef::wrap(child) {
                            if !is_noise(child_el) {
                                stack.push(Step::Open(child_el));
                            }
                        }
                    }
                }
            }
        }
    }
}
