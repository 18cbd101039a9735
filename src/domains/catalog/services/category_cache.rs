use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::domains::catalog::models::Category;
use crate::shared::database::LedgerStore;
use crate::shared::errors::WalletError;

/// 시간 소스 (테스트에서 교체)
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CachedCategories {
    categories: Arc<Vec<Category>>,
    loaded_at: Instant,
}

/// 카테고리 캐시
/// Category list cached for a fixed TTL; a miss reloads from the store
#[derive(Clone)]
pub struct CategoryCache {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cached: Arc<RwLock<Option<CachedCategories>>>,
}

impl CategoryCache {
    pub fn new(store: Arc<dyn LedgerStore>, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn LedgerStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// 카테고리 목록 (만료 시 재조회)
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, WalletError> {
        let now = self.clock.now();
        let fresh = {
            let cached = self.cached.read();
            cached
                .as_ref()
                .filter(|c| now.duration_since(c.loaded_at) < self.ttl)
                .map(|c| c.categories.clone())
        };
        if let Some(categories) = fresh {
            return Ok(categories);
        }

        // 락을 잡은 채로 await 하지 않음
        let categories = Arc::new(self.store.list_categories().await?);
        *self.cached.write() = Some(CachedCategories {
            categories: categories.clone(),
            loaded_at: now,
        });
        tracing::debug!(count = categories.len(), "category cache refreshed");

        Ok(categories)
    }

    /// 캐시 무효화 (카테고리 변경 후)
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::MemoryLedgerStore;
    use parking_lot::Mutex;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn advance(&self, by: Duration) {
            *self.now.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock()
        }
    }

    fn category(id: u64, name: &str) -> Category {
        Category {
            id,
            parent_id: None,
            name: name.to_string(),
            slug: name.to_lowercase(),
            sort_order: id as i32,
        }
    }

    #[tokio::test]
    async fn serves_cached_list_until_ttl_expires() {
        let store = Arc::new(MemoryLedgerStore::new());
        store.seed_category(category(1, "Design"));
        let clock = Arc::new(ManualClock { now: Mutex::new(Instant::now()) });
        let cache = CategoryCache::with_clock(store.clone(), Duration::from_secs(60), clock.clone());

        assert_eq!(cache.categories().await.unwrap().len(), 1);

        store.seed_category(category(2, "Writing"));
        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.categories().await.unwrap().len(), 1);

        clock.advance(Duration::from_secs(31));
        assert_eq!(cache.categories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let store = Arc::new(MemoryLedgerStore::new());
        store.seed_category(category(1, "Design"));
        let cache = CategoryCache::new(store.clone(), Duration::from_secs(300));

        assert_eq!(cache.categories().await.unwrap().len(), 1);
        store.seed_category(category(2, "Writing"));
        assert_eq!(cache.categories().await.unwrap().len(), 1);

        cache.invalidate();
        let names: Vec<String> = cache
            .categories()
            .await
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["Design", "Writing"]);
    }
}
