//! Cached catalog access.
//!
//! The catalog is authored content that changes rarely, so hosts usually
//! want to load it once and reuse it across sessions. The cache is an
//! explicit object at the port boundary with an explicit invalidation
//! operation; the engine core never reads a shared mutable singleton.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use sagaforge_domain::Catalog;

use crate::ports::{CatalogPort, PortError};

/// Caching decorator over any `CatalogPort`. Failed loads are never cached.
pub struct CatalogCache {
    source: Arc<dyn CatalogPort>,
    cached: RwLock<Option<Arc<Catalog>>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogPort>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Drop the cached catalog so the next load hits the source again.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
        tracing::debug!("catalog cache invalidated");
    }
}

#[async_trait]
impl CatalogPort for CatalogCache {
    async fn load(&self) -> Result<Arc<Catalog>, PortError> {
        if let Some(catalog) = &*self.cached.read().await {
            return Ok(Arc::clone(catalog));
        }

        let catalog = self.source.load().await?;
        *self.cached.write().await = Some(Arc::clone(&catalog));
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockCatalogPort;
    use crate::test_fixtures::sample_catalog;

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let catalog = Arc::new(sample_catalog());
        let mut source = MockCatalogPort::new();
        source
            .expect_load()
            .times(1)
            .returning(move || Ok(Arc::clone(&catalog)));

        let cache = CatalogCache::new(Arc::new(source));
        let first = cache.load().await.unwrap();
        let second = cache.load().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let catalog = Arc::new(sample_catalog());
        let mut source = MockCatalogPort::new();
        source
            .expect_load()
            .times(2)
            .returning(move || Ok(Arc::clone(&catalog)));

        let cache = CatalogCache::new(Arc::new(source));
        cache.load().await.unwrap();
        cache.invalidate().await;
        cache.load().await.unwrap();
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let catalog = Arc::new(sample_catalog());
        let mut source = MockCatalogPort::new();
        let mut first = true;
        source.expect_load().times(2).returning(move || {
            if first {
                first = false;
                Err(PortError::CatalogUnavailable("offline".to_string()))
            } else {
                Ok(Arc::clone(&catalog))
            }
        });

        let cache = CatalogCache::new(Arc::new(source));
        assert!(cache.load().await.is_err());
        assert!(cache.load().await.is_ok());
    }
}
