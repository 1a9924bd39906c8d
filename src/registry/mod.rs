//! Tenant Registry
//!
//! The shared `hq` schema: one row per store mapping its code to the schema
//! holding its data, plus the product catalog every store references.

mod handle;
mod records;

pub use handle::RegistryHandle;
pub use records::{CatalogItem, TenantRecord};
