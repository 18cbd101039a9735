// Catalog domain state
use std::sync::Arc;
use std::time::Duration;
use crate::domains::catalog::services::CategoryCache;
use crate::shared::database::LedgerStore;

#[derive(Clone)]
pub struct CatalogState {
    pub category_cache: CategoryCache,
}

impl CatalogState {
    pub fn new(store: Arc<dyn LedgerStore>, ttl: Duration) -> Self {
        Self {
            category_cache: CategoryCache::new(store, ttl),
        }
    }
}
