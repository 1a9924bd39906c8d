use crate::context::DataContext;
use crate::db::identifier::is_valid_identifier;
use crate::db::TenantStore;
use crate::error::{Result, StoreError};
use crate::migration::TenantContext;
use crate::model::{CompiledModel, ModelCacheKey, DEFAULT_SCHEMA, SHARED_SCHEMA};
use crate::registry::CatalogItem;
use crate::tenant::{CatalogueEntry, StockRecord, StockWrite};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Reject schemas a tenant handle must never be bound to.
pub fn ensure_tenant_schema(schema: &str) -> Result<()> {
    if schema == DEFAULT_SCHEMA || schema == SHARED_SCHEMA {
        return Err(StoreError::ReservedSchema {
            schema: schema.to_string(),
        });
    }
    if !is_valid_identifier(schema) || schema.starts_with("pg_") {
        return Err(StoreError::InvalidSchemaName {
            schema: schema.to_string(),
        });
    }
    Ok(())
}

/// Data handle for one tenant schema.
///
/// The schema is fixed at construction. A handle built with
/// [`TenantHandle::with_default_schema`] stands for "no tenant resolved": it
/// can read the shared catalog but refuses stock reads and writes.
#[derive(Clone)]
pub struct TenantHandle {
    schema: String,
    design_time: bool,
    tenant_bound: bool,
    model: Arc<CompiledModel>,
    store: Arc<dyn TenantStore>,
}

impl TenantHandle {
    pub fn with_default_schema(context: &DataContext, design_time: bool) -> Self {
        Self::bind(context, DEFAULT_SCHEMA, design_time, false)
    }

    pub fn for_schema(context: &DataContext, schema: &str) -> Result<Self> {
        ensure_tenant_schema(schema)?;
        Ok(Self::bind(context, schema, false, true))
    }

    /// Design-time handle for inspecting a tenant's model. Refuses data access.
    pub fn for_design_time(context: &DataContext, schema: &str) -> Result<Self> {
        ensure_tenant_schema(schema)?;
        Ok(Self::bind(context, schema, true, false))
    }

    fn bind(context: &DataContext, schema: &str, design_time: bool, tenant_bound: bool) -> Self {
        let model = context
            .cache()
            .model_for::<TenantHandle, _>(design_time, Some(schema), || {
                CompiledModel::tenant(schema, design_time)
            });

        Self {
            schema: schema.to_string(),
            design_time,
            tenant_bound,
            model,
            store: context.tenant_store(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn is_tenant_bound(&self) -> bool {
        self.tenant_bound
    }

    pub fn is_design_time(&self) -> bool {
        self.design_time
    }

    pub fn model(&self) -> &CompiledModel {
        &self.model
    }

    pub fn cache_key(&self) -> ModelCacheKey {
        ModelCacheKey::new::<TenantHandle>(self.design_time, Some(&self.schema))
    }

    fn require_tenant(&self) -> Result<()> {
        if !self.tenant_bound {
            return Err(StoreError::ForbiddenTenantContext {
                schema: self.schema.clone(),
            });
        }
        Ok(())
    }

    /// Stock rows, most recently ordered first.
    pub async fn list_stock(&self) -> Result<Vec<StockRecord>> {
        self.require_tenant()?;
        self.store.list_stock(&self.model).await
    }

    /// Upsert a stock row after checking the product exists and is still sold.
    pub async fn record_stock(&self, write: StockWrite) -> Result<StockRecord> {
        self.require_tenant()?;
        let write = write.validated()?;

        let record = self.store.upsert_stock(&self.model, write).await?;
        info!(
            "Recorded stock {} x{} in {}",
            record.code, record.quantity, self.schema
        );
        Ok(record)
    }

    /// Stock joined with the shared catalog, ordered by product name.
    pub async fn catalogue(&self) -> Result<Vec<CatalogueEntry>> {
        self.require_tenant()?;
        self.store.catalogue(&self.model).await
    }

    pub async fn find_catalog_item(&self, code: &str) -> Result<Option<CatalogItem>> {
        self.store.find_catalog_item(&self.model, code.trim()).await
    }
}

impl TenantContext for TenantHandle {
    fn schema(&self) -> &str {
        &self.schema
    }

    fn model(&self) -> &CompiledModel {
        &self.model
    }
}

impl fmt::Debug for TenantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantHandle")
            .field("schema", &self.schema)
            .field("design_time", &self.design_time)
            .field("tenant_bound", &self.tenant_bound)
            .finish()
    }
}
