use crate::context::DataContext;
use crate::db::RegistryStore;
use crate::error::Result;
use crate::model::CompiledModel;
use crate::registry::{CatalogItem, TenantRecord};
use crate::tenant::ensure_tenant_schema;
use std::sync::Arc;
use tracing::{debug, info};

/// Data handle bound to the shared schema.
#[derive(Clone)]
pub struct RegistryHandle {
    model: Arc<CompiledModel>,
    store: Arc<dyn RegistryStore>,
}

impl RegistryHandle {
    pub fn new(context: &DataContext) -> Self {
        let model = context
            .cache()
            .model_for::<RegistryHandle, _>(false, None, || CompiledModel::registry(false));

        Self {
            model,
            store: context.registry_store(),
        }
    }

    pub fn model(&self) -> &CompiledModel {
        &self.model
    }

    pub async fn is_reachable(&self) -> bool {
        self.store.ping().await
    }

    /// Every registered store, read fresh, ordered by schema name.
    pub async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        let tenants = self.store.list_tenants(&self.model).await?;
        debug!("Registry lists {} stores", tenants.len());
        Ok(tenants)
    }

    /// Case-insensitive lookup of a store by code.
    pub async fn find_by_schema_code(&self, code: &str) -> Result<Option<TenantRecord>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        self.store.find_tenant(&self.model, code).await
    }

    /// Insert or update a store, matching the code case-insensitively.
    ///
    /// The schema must be a valid identifier, must not be reserved and must
    /// not already belong to another store.
    pub async fn upsert(&self, record: TenantRecord) -> Result<TenantRecord> {
        record.validate()?;
        ensure_tenant_schema(&record.schema_name)?;

        let saved = self.store.upsert_tenant(&self.model, &record).await?;
        info!("Registered store {} in schema {}", saved.code, saved.schema_name);
        Ok(saved)
    }

    pub async fn list_products(&self) -> Result<Vec<CatalogItem>> {
        self.store.list_products(&self.model).await
    }

    pub async fn find_product(&self, code: &str) -> Result<Option<CatalogItem>> {
        self.store.find_product(&self.model, code.trim()).await
    }

    /// Insert or update a catalog product, matching the code case-insensitively.
    pub async fn upsert_product(&self, item: CatalogItem) -> Result<CatalogItem> {
        item.validate()?;

        let saved = self.store.upsert_product(&self.model, &item).await?;
        info!(
            "Saved product {} (discontinued: {})",
            saved.code, saved.discontinued
        );
        Ok(saved)
    }
}
