use super::extract::{absolutize, element_text, extract_records};
use super::model::EventRecord;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Next-page link labels used by the portal, tried in order after the
/// `rel` attribute.
const NEXT_LABELS: [&str; 5] = ["næste", "naeste", "next", "›", ">>"];

lazy_static! {
    static ref REL_NEXT: Selector = Selector::parse(r#"a[rel*="next"]"#).unwrap();
    static ref PAGINATION_NEXT: Selector =
        Selector::parse(".pagination .next a, a.next").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
}

#[derive(Debug, Clone)]
pub struct WalkSettings {
    pub max_pages: usize,
    pub page_delay: Duration,
}

/// Follows next-page links from `start_url`, merging each page's rows into
/// one deduplicated list. `fetch` resolves a URL to page HTML; `None` means
/// the page could not be retrieved and ends this walk, keeping whatever
/// earlier pages produced. The visited set and the page bound terminate the
/// walk even when the portal serves a link cycle.
pub async fn walk_listing<F, Fut>(
    start_url: String,
    settings: &WalkSettings,
    fetch: F,
) -> Vec<EventRecord>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Option<String>>,
{
    let mut visited: HashSet<String> = HashSet::new();
    let mut seen_keys: HashSet<(String, String)> = HashSet::new();
    let mut records: Vec<EventRecord> = Vec::new();
    let mut next_url = Some(start_url);

    while let Some(url) = next_url.take() {
        if visited.contains(&url) || visited.len() >= settings.max_pages {
            break;
        }
        visited.insert(url.clone());

        let Some(body) = fetch(url.clone()).await else {
            debug!(%url, "Page unavailable, stopping this walk");
            break;
        };

        let (page_records, next) = parse_page(&body);
        debug!(%url, rows = page_records.len(), "Parsed listing page");
        for record in page_records {
            if seen_keys.insert(record.dedupe_key()) {
                records.push(record);
            }
        }

        next_url = next;
        if next_url.is_some() {
            tokio::time::sleep(settings.page_delay).await;
        }
    }

    info!(
        pages = visited.len(),
        records = records.len(),
        "Walk finished"
    );
    records
}

// Parsing stays synchronous so the document never crosses an await.
fn parse_page(body: &str) -> (Vec<EventRecord>, Option<String>) {
    let document = Html::parse_document(body);
    (extract_records(&document), find_next_page(&document))
}

fn find_next_page(document: &Html) -> Option<String> {
    if let Some(anchor) = document.select(&REL_NEXT).next() {
        if let Some(href) = anchor.value().attr("href") {
            return Some(absolutize(href));
        }
    }

    for label in NEXT_LABELS {
        for anchor in document.select(&ANCHOR) {
            if element_text(anchor).to_lowercase().contains(label) {
                if let Some(href) = anchor.value().attr("href") {
                    return Some(absolutize(href));
                }
            }
        }
    }

    document
        .select(&PAGINATION_NEXT)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .map(absolutize)
}
