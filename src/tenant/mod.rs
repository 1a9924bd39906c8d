//! Tenant-scoped data access.
//!
//! Each store's rows live in its own PostgreSQL schema. A [`TenantHandle`]
//! is bound to exactly one schema for its whole life, and its compiled model
//! comes from the process-wide cache keyed by that schema.

mod handle;
pub(crate) mod records;
mod resolver;

pub use handle::{ensure_tenant_schema, TenantHandle};
pub use records::{price_difference, CatalogueEntry, StockRecord, StockWrite};
pub use resolver::{TenantResolver, STORE_CODE_HEADER};
