//! Storage backends.
//!
//! Handles never build SQL against a hard-coded schema: every call carries
//! the [`CompiledModel`] of the handle issuing it, and backends resolve table
//! names from that model.

pub mod identifier;
#[cfg(test)]
pub(crate) mod memory;
mod pool;
mod postgres;

pub use pool::connect;
pub use postgres::PgDatabase;

use crate::error::Result;
use crate::model::CompiledModel;
use crate::registry::{CatalogItem, TenantRecord};
use crate::tenant::{CatalogueEntry, StockRecord, StockWrite};
use async_trait::async_trait;

/// Shared-schema storage: the tenant registry and the product catalog.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn ping(&self) -> bool;

    /// Uncached read of every tenant, ordered by schema name.
    async fn list_tenants(&self, model: &CompiledModel) -> Result<Vec<TenantRecord>>;

    /// Case-insensitive lookup by store code.
    async fn find_tenant(&self, model: &CompiledModel, code: &str) -> Result<Option<TenantRecord>>;

    async fn upsert_tenant(&self, model: &CompiledModel, record: &TenantRecord)
        -> Result<TenantRecord>;

    async fn list_products(&self, model: &CompiledModel) -> Result<Vec<CatalogItem>>;

    async fn find_product(&self, model: &CompiledModel, code: &str) -> Result<Option<CatalogItem>>;

    async fn upsert_product(&self, model: &CompiledModel, item: &CatalogItem)
        -> Result<CatalogItem>;
}

/// Tenant-schema storage.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Look up a product through the model's catalog reference.
    async fn find_catalog_item(
        &self,
        model: &CompiledModel,
        code: &str,
    ) -> Result<Option<CatalogItem>>;

    async fn list_stock(&self, model: &CompiledModel) -> Result<Vec<StockRecord>>;

    /// Validate the catalog reference and upsert in one transaction.
    async fn upsert_stock(&self, model: &CompiledModel, write: StockWrite) -> Result<StockRecord>;

    async fn catalogue(&self, model: &CompiledModel) -> Result<Vec<CatalogueEntry>>;
}
