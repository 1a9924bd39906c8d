use crate::db::{RegistryStore, TenantStore};
use crate::model::ModelCache;
use crate::registry::RegistryHandle;
use std::sync::Arc;

/// Process-wide state every handle is built from.
///
/// Cloning is cheap; all clones share one [`ModelCache`].
#[derive(Clone)]
pub struct DataContext {
    cache: Arc<ModelCache>,
    registry_store: Arc<dyn RegistryStore>,
    tenant_store: Arc<dyn TenantStore>,
}

impl DataContext {
    pub fn new(registry_store: Arc<dyn RegistryStore>, tenant_store: Arc<dyn TenantStore>) -> Self {
        Self {
            cache: Arc::new(ModelCache::new()),
            registry_store,
            tenant_store,
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn registry_store(&self) -> Arc<dyn RegistryStore> {
        Arc::clone(&self.registry_store)
    }

    pub fn tenant_store(&self) -> Arc<dyn TenantStore> {
        Arc::clone(&self.tenant_store)
    }

    /// Read handle to the tenant registry.
    pub fn registry(&self) -> RegistryHandle {
        RegistryHandle::new(self)
    }
}
