//! Schema migrations.
//!
//! Every migrated schema carries its own history table. The shared schema is
//! migrated by fixed migrations; tenant schemas by schema-parametric ones,
//! instantiated once per tenant against that tenant's bound handle.

mod builder;
mod definition;
mod history;
mod orchestrator;
pub(crate) mod per_tenant;
mod resolver;
mod runner;
pub(crate) mod shared;

pub use builder::{ColumnDef, MigrationBuilder, Operation};
pub use definition::{
    FixedConstructor, Migration, MigrationDefinition, MigrationVariant,
    SchemaParametricConstructor, TenantContext,
};
pub use history::{compute_checksum, AppliedMigration, HistoryTable, MigrationExecutor, MigrationStep};
pub use orchestrator::{FailurePolicy, MigrationOrchestrator, OrchestrationReport, TenantFailure};
pub use resolver::{MigrationResolver, PreparedMigration};
pub use runner::{MigrationPass, Migrator, SchemaReport};
