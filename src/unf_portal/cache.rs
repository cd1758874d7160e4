use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::trace;

struct CacheEntry {
    fetched_at: i64,
    body: String,
}

/// Time-bounded page cache shared by all location walkers. Entries expire
/// logically once older than the TTL; nothing is actively evicted during a
/// run. A TTL of 0 disables caching, every lookup misses.
pub struct PageCache {
    ttl_secs: i64,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl PageCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs: ttl_secs as i64,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lookup(&self, url: &str) -> Option<String> {
        if self.ttl_secs == 0 {
            return None;
        }

        let entries = self.entries.lock().await;
        let entry = entries.get(url)?;
        if Utc::now().timestamp() - entry.fetched_at > self.ttl_secs {
            trace!(url, "Cache entry expired");
            return None;
        }

        trace!(url, "Cache hit");
        Some(entry.body.clone())
    }

    pub async fn store(&self, url: &str, body: &str) {
        if self.ttl_secs == 0 {
            return;
        }

        self.store_at(url, body, Utc::now().timestamp()).await;
    }

    async fn store_at(&self, url: &str, body: &str, fetched_at: i64) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            url.to_string(),
            CacheEntry {
                fetched_at,
                body: body.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://frivillig.unf.dk/events/kbh/";

    #[test_log::test(tokio::test)]
    async fn stored_pages_should_hit_within_the_ttl_window() {
        let cache = PageCache::new(60);

        cache.store(URL, "<html>kbh</html>").await;

        assert_eq!(cache.lookup(URL).await.as_deref(), Some("<html>kbh</html>"));
    }

    #[test_log::test(tokio::test)]
    async fn entries_older_than_the_ttl_should_miss() {
        let cache = PageCache::new(60);

        cache
            .store_at(URL, "<html>old</html>", Utc::now().timestamp() - 61)
            .await;

        assert_eq!(cache.lookup(URL).await, None);
    }

    #[test_log::test(tokio::test)]
    async fn a_zero_ttl_should_disable_caching_entirely() {
        let cache = PageCache::new(0);

        cache.store(URL, "<html>kbh</html>").await;

        assert_eq!(cache.lookup(URL).await, None);
    }

    #[test_log::test(tokio::test)]
    async fn unknown_urls_should_miss() {
        let cache = PageCache::new(60);

        assert_eq!(cache.lookup(URL).await, None);
    }

    #[test_log::test(tokio::test)]
    async fn a_restore_should_refresh_the_entry() {
        let cache = PageCache::new(60);

        cache
            .store_at(URL, "<html>old</html>", Utc::now().timestamp() - 61)
            .await;
        cache.store(URL, "<html>fresh</html>").await;

        assert_eq!(
            cache.lookup(URL).await.as_deref(),
            Some("<html>fresh</html>")
        );
    }
}
