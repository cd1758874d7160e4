use super::auth::PortalSession;
use super::cache::PageCache;
use super::model::{Location, LocationFeed};
use super::walk::{walk_listing, WalkSettings};
use super::BASE_URL;
use crate::config::model::CrawlConfig;
use futures::{stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tracing::{info, instrument, warn};

/// Politeness pause between two pages of the same listing.
const PAGE_DELAY: Duration = Duration::from_millis(600);

pub struct UnfPortalAPI {
    session: PortalSession,
    cache: Arc<PageCache>,
    settings: WalkSettings,
    workers: usize,
}

impl UnfPortalAPI {
    pub fn new(session: PortalSession, config: &CrawlConfig) -> Self {
        let location_count = Location::iter().count();
        Self {
            session,
            cache: Arc::new(PageCache::new(config.cache_ttl_secs)),
            settings: WalkSettings {
                max_pages: config.max_pages,
                page_delay: PAGE_DELAY,
            },
            workers: config.workers.clamp(1, location_count),
        }
    }

    /// Walks every location listing concurrently, each worker on its own
    /// session clone over the shared page cache. Feeds come back in
    /// canonical location order no matter which walk finishes first; a
    /// failed location yields an empty feed and never disturbs the others.
    #[instrument(skip(self))]
    pub async fn crawl_all(&self) -> Vec<LocationFeed> {
        let mut feeds: Vec<(usize, LocationFeed)> =
            stream::iter(Location::iter().enumerate())
                .map(|(position, location)| {
                    let session = self.session.clone();
                    let cache = Arc::clone(&self.cache);
                    let settings = self.settings.clone();
                    async move {
                        let start_url = format!("{}{}", BASE_URL, location.listing_path());
                        let fetch = |url: String| {
                            let session = session.clone();
                            let cache = Arc::clone(&cache);
                            async move { fetch_page(&session, &cache, &url).await }
                        };

                        let records = walk_listing(start_url, &settings, fetch).await;
                        info!(
                            location = location.slug(),
                            records = records.len(),
                            "Listing crawled"
                        );
                        (position, LocationFeed { location, records })
                    }
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;

        into_canonical_order(&mut feeds);
        feeds.into_iter().map(|(_, feed)| feed).collect()
    }
}

// Completion order is whatever the network made of it; emission order is not.
fn into_canonical_order(feeds: &mut [(usize, LocationFeed)]) {
    feeds.sort_by_key(|(position, _)| *position);
}

/// The lookup-or-fetch seam the walkers see: cache hit, else a live session
/// fetch whose successful body is stored. Any failure or non-success status
/// becomes `None`, which ends just that walk.
async fn fetch_page(session: &PortalSession, cache: &PageCache, url: &str) -> Option<String> {
    if let Some(body) = cache.lookup(url).await {
        return Some(body);
    }

    match session.get(url).await {
        Ok((status, body)) if status.is_success() => {
            cache.store(url, &body).await;
            Some(body)
        }
        Ok((status, _)) => {
            warn!(url, %status, "Listing page returned a non-success status");
            None
        }
        Err(err) => {
            warn!(url, error = %err, "Listing page fetch failed");
            None
        }
    }
}
