//! Time-bounded cache of route titles.

use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::feed::FeedClient;
use crate::store::PartitionedStore;
use crate::types::RoutesLookup;

/// Route titles are refetched at most once an hour.
pub const ROUTE_TITLES_TTL_MS: i64 = 3_600_000;

/// What [`RouteTitleCache::refresh_if_stale`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleRefresh {
    /// Cache was fresh; no fetch issued.
    Cached,
    /// Fetched and persisted. `None` when the stored lookup was already current.
    Refreshed { persisted: Option<String> },
    /// Fetched, but persisting the lookup failed.
    PersistFailed,
    /// Fetch failed; the previous titles are kept.
    FetchFailed,
}

/// Last fetched route titles plus when they were fetched.
///
/// Fresh while younger than the TTL. A stale cache refetches on the next
/// request; a failed refetch keeps serving the last good titles.
pub struct RouteTitleCache {
    feed: Arc<dyn FeedClient>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
    titles: RoutesLookup,
    fetched_at_ms: Option<i64>,
}

impl RouteTitleCache {
    pub fn new(feed: Arc<dyn FeedClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            feed,
            clock,
            ttl_ms: ROUTE_TITLES_TTL_MS,
            titles: RoutesLookup::new(),
            fetched_at_ms: None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.fetched_at_ms
            .is_some_and(|fetched| self.clock.now_ms() - fetched < self.ttl_ms)
    }

    /// Titles currently held, without any refresh.
    pub fn cached(&self) -> &RoutesLookup {
        &self.titles
    }

    /// Returns route titles, refetching and persisting them first if stale.
    pub async fn get_titles(&mut self, store: &PartitionedStore) -> &RoutesLookup {
        self.refresh_if_stale(store).await;
        &self.titles
    }

    /// Refetches the titles when stale and persists them on success.
    #[tracing::instrument(skip(self, store))]
    pub async fn refresh_if_stale(&mut self, store: &PartitionedStore) -> TitleRefresh {
        if self.is_fresh() {
            return TitleRefresh::Cached;
        }

        let titles = match self.feed.fetch_route_titles().await {
            Ok(titles) => titles,
            Err(e) => {
                warn!(error = %e, cached = self.titles.len(), "Route title refresh failed");
                return TitleRefresh::FetchFailed;
            }
        };

        let now_ms = self.clock.now_ms();
        self.titles = titles;
        self.fetched_at_ms = Some(now_ms);
        info!(routes = self.titles.len(), "Route titles refreshed");

        match store.save_routes(now_ms, &self.titles).await {
            Ok(persisted) => TitleRefresh::Refreshed { persisted },
            Err(e) => {
                warn!(error = %e, "Failed to persist route titles");
                TitleRefresh::PersistFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Granularity, MemoryBlobStore};
    use crate::testing::{ManualClock, StubFeed};

    struct Fixture {
        feed: Arc<StubFeed>,
        clock: Arc<ManualClock>,
        backend: Arc<MemoryBlobStore>,
        store: PartitionedStore,
        cache: RouteTitleCache,
    }

    fn fixture() -> Fixture {
        let feed = Arc::new(StubFeed::new());
        feed.set_routes(Some(lookup(&[("7", "7-Bathurst")])));
        let clock = Arc::new(ManualClock::new(1_000_000));
        let backend = Arc::new(MemoryBlobStore::new());
        let store = PartitionedStore::new(backend.clone(), Granularity::Daily);
        let cache = RouteTitleCache::new(feed.clone(), clock.clone());
        Fixture {
            feed,
            clock,
            backend,
            store,
            cache,
        }
    }

    fn lookup(entries: &[(&str, &str)]) -> RoutesLookup {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_starts_stale_and_fetches_once_within_ttl() {
        let mut f = fixture();
        assert!(!f.cache.is_fresh());

        let titles = f.cache.get_titles(&f.store).await.clone();
        assert_eq!(titles, lookup(&[("7", "7-Bathurst")]));

        f.clock.advance(ROUTE_TITLES_TTL_MS - 1);
        f.cache.get_titles(&f.store).await;

        assert_eq!(f.feed.route_fetches(), 1);
    }

    #[tokio::test]
    async fn test_refetches_exactly_once_after_ttl() {
        let mut f = fixture();
        f.cache.get_titles(&f.store).await;

        f.clock.advance(ROUTE_TITLES_TTL_MS);
        f.feed.set_routes(Some(lookup(&[("7", "7-Bathurst"), ("8", "8-Broadview")])));

        let titles = f.cache.get_titles(&f.store).await.clone();
        assert_eq!(titles.len(), 2);
        f.cache.get_titles(&f.store).await;

        assert_eq!(f.feed.route_fetches(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_titles() {
        let mut f = fixture();
        f.cache.get_titles(&f.store).await;

        f.clock.advance(ROUTE_TITLES_TTL_MS + 1);
        f.feed.set_routes(None);

        assert_eq!(
            f.cache.refresh_if_stale(&f.store).await,
            TitleRefresh::FetchFailed
        );
        assert_eq!(f.cache.cached(), &lookup(&[("7", "7-Bathurst")]));
        assert!(!f.cache.is_fresh());

        // still stale, so the next call tries again
        f.cache.get_titles(&f.store).await;
        assert_eq!(f.feed.route_fetches(), 3);
    }

    #[tokio::test]
    async fn test_failed_first_fetch_serves_empty_and_persists_nothing() {
        let mut f = fixture();
        f.feed.set_routes(None);

        assert!(f.cache.get_titles(&f.store).await.is_empty());
        assert!(f.backend.keys().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_persists_lookup() {
        let mut f = fixture();

        let outcome = f.cache.refresh_if_stale(&f.store).await;
        assert_eq!(
            outcome,
            TitleRefresh::Refreshed {
                persisted: Some("memory://routes.json".to_string())
            }
        );
        assert_eq!(f.store.load_routes(0).await, lookup(&[("7", "7-Bathurst")]));

        assert_eq!(f.cache.refresh_if_stale(&f.store).await, TitleRefresh::Cached);
    }

    #[tokio::test]
    async fn test_persist_failure_still_refreshes() {
        let mut f = fixture();
        f.backend.fail_writes(true);

        assert_eq!(
            f.cache.refresh_if_stale(&f.store).await,
            TitleRefresh::PersistFailed
        );
        assert!(f.cache.is_fresh());
        assert_eq!(f.cache.cached().len(), 1);
    }
}
