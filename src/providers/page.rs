use crate::core::config::PageSourceConfig;
use crate::core::quote::RawQuote;
use crate::core::source::{AdapterError, SourceAdapter};
use crate::providers::util::{extract_price, get_text};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

const DEFAULT_MAX_CANDIDATES: usize = 20;

/// Scrapes a price out of an HTML page.
///
/// Candidate snippets come from the configured CSS selectors first, then from
/// the parent element of every text node containing one of the keywords. The
/// first candidate holding a recognisable price wins.
pub struct PageAdapter {
    name: String,
    url: String,
    selectors: Vec<String>,
    keywords: Vec<String>,
    max_candidates: usize,
    note: Option<String>,
    client: Client,
}

impl PageAdapter {
    pub fn new(config: &PageSourceConfig, client: Client) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.clone(),
            selectors: config.selectors.clone(),
            keywords: config.keywords.clone(),
            max_candidates: config.max_candidates.unwrap_or(DEFAULT_MAX_CANDIDATES),
            note: config.note.clone(),
            client,
        }
    }
}

#[async_trait]
impl SourceAdapter for PageAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.url)
    }

    #[instrument(name = "PageFetch", skip(self), fields(source = %self.name))]
    async fn attempt(&self) -> Result<RawQuote, AdapterError> {
        let body = get_text(&self.client, &self.url).await?;
        let (price, snippet) = find_price(&body, &self.selectors, &self.keywords, self.max_candidates)?;
        debug!(price, "Found price on page");

        let mut raw = RawQuote::new(&self.name, price).with_raw_text(snippet);
        if let Some(note) = &self.note {
            raw = raw.with_note(note);
        }
        Ok(raw)
    }
}

// Kept synchronous: `Html` is not `Send` and must never live across an await.
fn find_price(
    body: &str,
    selectors: &[String],
    keywords: &[String],
    max_candidates: usize,
) -> Result<(f64, String), AdapterError> {
    let document = Html::parse_document(body);
    let mut candidates = Vec::new();

    for raw_selector in selectors {
        let selector = Selector::parse(raw_selector)
            .map_err(|e| AdapterError::Parse(format!("invalid selector {raw_selector:?}: {e:?}")))?;
        let matched: Vec<String> = document.select(&selector).map(element_text).collect();
        if !matched.is_empty() {
            candidates.extend(matched);
            break;
        }
    }

    if !keywords.is_empty() {
        for node in document.tree.nodes() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            if !keywords.iter().any(|k| text.contains(k.as_str())) {
                continue;
            }
            let snippet = node
                .parent()
                .and_then(ElementRef::wrap)
                .map(element_text)
                .unwrap_or_else(|| normalize(text));
            candidates.push(snippet);
        }
    }

    candidates
        .into_iter()
        .filter(|c| !c.is_empty())
        .take(max_candidates)
        .find_map(|c| extract_price(&c).map(|price| (price, c)))
        .ok_or(AdapterError::Empty)
}

fn element_text(element: ElementRef) -> String {
    normalize(&element.text().collect::<Vec<_>>().join(" "))
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
