//! Migration Orchestrator
//!
//! Startup (or admin-triggered) sweep: migrate the shared schema first, then
//! every tenant schema listed in the registry at the time of the sweep.

use crate::context::DataContext;
use crate::error::{Result, StoreError};
use crate::migration::{per_tenant, shared, MigrationDefinition, MigrationPass, Migrator, SchemaReport};
use crate::registry::TenantRecord;
use crate::tenant::TenantHandle;
use serde::Serialize;
use std::str::FromStr;
use std::time::Instant;
use tracing::{error, info};

/// What to do when one tenant's pass fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the sweep and surface the error.
    #[default]
    Abort,
    /// Record the failure and move on to the next tenant.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(StoreError::configuration(format!(
                "Unknown migration failure policy '{}', expected 'abort' or 'continue'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantFailure {
    pub store: String,
    pub schema: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationReport {
    pub shared: SchemaReport,
    pub tenants: Vec<SchemaReport>,
    pub failures: Vec<TenantFailure>,
    pub duration_ms: u64,
}

impl OrchestrationReport {
    pub fn migrations_applied(&self) -> usize {
        self.shared.applied.len() + self.tenants.iter().map(|t| t.applied.len()).sum::<usize>()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct MigrationOrchestrator {
    context: DataContext,
    migrator: Migrator,
    policy: FailurePolicy,
    shared_migrations: Vec<MigrationDefinition>,
    tenant_migrations: Vec<MigrationDefinition>,
}

impl MigrationOrchestrator {
    pub fn new(context: DataContext, migrator: Migrator, policy: FailurePolicy) -> Self {
        Self {
            context,
            migrator,
            policy,
            shared_migrations: shared::migrations(),
            tenant_migrations: per_tenant::migrations(),
        }
    }

    /// Replace the built-in migration sets.
    pub fn with_migrations(
        mut self,
        shared_migrations: Vec<MigrationDefinition>,
        tenant_migrations: Vec<MigrationDefinition>,
    ) -> Self {
        self.shared_migrations = shared_migrations;
        self.tenant_migrations = tenant_migrations;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    /// Run the full sweep.
    ///
    /// A failure in the shared schema always aborts, since every tenant
    /// depends on it. Tenant failures follow the configured policy.
    pub async fn run(&self) -> Result<OrchestrationReport> {
        let start = Instant::now();

        info!(
            "Migrating shared schema ({} migrations)",
            self.shared_migrations.len()
        );
        let shared = self
            .migrator
            .apply_pending(&MigrationPass::shared(&self.shared_migrations))
            .await?;

        let tenants = self.context.registry().list_tenants().await?;
        info!("Migrating {} tenant schemas", tenants.len());

        let mut reports = Vec::with_capacity(tenants.len());
        let mut failures = Vec::new();

        for tenant in &tenants {
            match self.migrate_tenant(tenant).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(
                        "Migration of store {} ({}) failed: {}",
                        tenant.code, tenant.schema_name, e
                    );
                    match self.policy {
                        FailurePolicy::Abort => return Err(e),
                        FailurePolicy::Continue => failures.push(TenantFailure {
                            store: tenant.code.clone(),
                            schema: tenant.schema_name.clone(),
                            error: e.to_string(),
                        }),
                    }
                }
            }
        }

        let report = OrchestrationReport {
            shared,
            tenants: reports,
            failures,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Migration sweep finished: {} applied across {} schemas, {} failed in {}ms",
            report.migrations_applied(),
            report.tenants.len() + 1,
            report.failures.len(),
            report.duration_ms
        );

        Ok(report)
    }

    async fn migrate_tenant(&self, tenant: &TenantRecord) -> Result<SchemaReport> {
        let handle = TenantHandle::for_schema(&self.context, &tenant.schema_name)?;
        self.migrator
            .apply_pending(&MigrationPass::tenant(&handle, &self.tenant_migrations))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDatabase;
    use crate::model::HISTORY_TABLE;
    use std::sync::Arc;

    fn setup(policy: FailurePolicy) -> (Arc<MemoryDatabase>, MigrationOrchestrator) {
        let db = Arc::new(MemoryDatabase::new());
        let ctx = DataContext::new(db.clone(), db.clone());
        let migrator = Migrator::new(db.clone(), "postgres");
        (db.clone(), MigrationOrchestrator::new(ctx, migrator, policy))
    }

    fn ids(migrations: &[MigrationDefinition]) -> Vec<String> {
        migrations.iter().map(|m| m.id.to_string()).collect()
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert_eq!(" Continue ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Continue);
        assert!("retry".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default(), FailurePolicy::Abort);
    }

    #[tokio::test]
    async fn test_new_tenant_gets_isolated_schema() {
        let (db, orchestrator) = setup(FailurePolicy::Abort);
        db.add_tenant(TenantRecord::new("ACME", "Acme", "Leeds", "acme_store"));

        let report = orchestrator.run().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.tenants[0].schema, "acme_store");

        assert_eq!(db.history("hq"), ids(&shared::migrations()));
        assert_eq!(db.history("acme_store"), ids(&per_tenant::migrations()));
        assert!(db.has_table("\"acme_store\".\"inventory\""));
        assert!(db.has_table(&format!("\"acme_store\".\"{}\"", HISTORY_TABLE)));

        // shared tables are created once, by the shared pass only
        let catalog_ddl: Vec<_> = db
            .executed()
            .into_iter()
            .filter(|sql| sql.contains("\"hq\".\"products\""))
            .collect();
        assert_eq!(catalog_ddl.len(), 2);
        assert!(!db.has_table("\"acme_store\".\"products\""));
    }

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let (db, orchestrator) = setup(FailurePolicy::Abort);
        db.add_tenant(TenantRecord::new("ACME", "Acme", "Leeds", "acme_store"));

        let first = orchestrator.run().await.unwrap();
        assert!(first.migrations_applied() > 0);
        let executed = db.executed().len();

        let second = orchestrator.run().await.unwrap();
        assert_eq!(second.migrations_applied(), 0);
        assert_eq!(db.executed().len(), executed);
    }

    #[tokio::test]
    async fn test_late_tenant_receives_full_history() {
        let (db, orchestrator) = setup(FailurePolicy::Abort);
        db.add_tenant(TenantRecord::new("ACME", "Acme", "Leeds", "acme_store"));
        orchestrator.run().await.unwrap();

        db.add_tenant(TenantRecord::new("ZEN", "Zenith", "York", "zenith_store"));
        let report = orchestrator.run().await.unwrap();

        let zenith = report
            .tenants
            .iter()
            .find(|t| t.schema == "zenith_store")
            .unwrap();
        assert_eq!(zenith.applied, ids(&per_tenant::migrations()));
        assert_eq!(db.history("zenith_store"), db.history("acme_store"));
        assert!(report.shared.applied.is_empty());
    }

    #[tokio::test]
    async fn test_abort_policy_stops_sweep() {
        let (db, orchestrator) = setup(FailurePolicy::Abort);
        db.add_tenant(TenantRecord::new("ACME", "Acme", "Leeds", "acme_store"));
        db.add_tenant(TenantRecord::new("ZEN", "Zenith", "York", "zenith_store"));
        db.fail_schema("acme_store");

        let err = orchestrator.run().await.unwrap_err();
        assert_eq!(err.schema(), Some("acme_store"));
        assert!(db.history("zenith_store").is_empty());
    }

    #[tokio::test]
    async fn test_continue_policy_records_failures() {
        let (db, orchestrator) = setup(FailurePolicy::Continue);
        db.add_tenant(TenantRecord::new("ACME", "Acme", "Leeds", "acme_store"));
        db.add_tenant(TenantRecord::new("ZEN", "Zenith", "York", "zenith_store"));
        db.fail_schema("acme_store");

        let report = orchestrator.run().await.unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.failures[0].schema, "acme_store");
        assert_eq!(db.history("zenith_store"), ids(&per_tenant::migrations()));

        // the failed tenant catches up on the next sweep
        db.heal_schema("acme_store");
        let report = orchestrator.run().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(db.history("acme_store"), db.history("zenith_store"));
    }

    #[tokio::test]
    async fn test_shared_failure_is_fatal_under_any_policy() {
        let (db, orchestrator) = setup(FailurePolicy::Continue);
        db.add_tenant(TenantRecord::new("ACME", "Acme", "Leeds", "acme_store"));
        db.fail_schema("hq");

        assert!(orchestrator.run().await.is_err());
        assert!(db.history("acme_store").is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_apply_once() {
        let (db, orchestrator) = setup(FailurePolicy::Abort);
        db.add_tenant(TenantRecord::new("ACME", "Acme", "Leeds", "acme_store"));
        let orchestrator = Arc::new(orchestrator);

        let a = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.run().await.unwrap().migrations_applied() }
        });
        let b = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.run().await.unwrap().migrations_applied() }
        });

        let total = a.await.unwrap() + b.await.unwrap();
        assert_eq!(
            total,
            shared::migrations().len() + per_tenant::migrations().len()
        );
        assert_eq!(db.history("acme_store"), ids(&per_tenant::migrations()));
    }
}
