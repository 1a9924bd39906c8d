mod cache;
mod compiled;

pub use cache::{ModelCache, ModelCacheKey};
pub use compiled::{ColumnMapping, CompiledModel, Entity, EntityMapping};

/// Schema holding the tenant registry, the shared catalog and their history.
pub const SHARED_SCHEMA: &str = "hq";

/// Reserved fallback schema meaning "no tenant resolved".
pub const DEFAULT_SCHEMA: &str = "public";

/// Migration history table name, created inside every migrated schema.
pub const HISTORY_TABLE: &str = "_migrations";
