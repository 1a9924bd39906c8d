use crate::error::{Result, StoreError};
use crate::migration::history::compute_checksum;
use crate::migration::{
    HistoryTable, MigrationDefinition, MigrationExecutor, MigrationResolver, MigrationStep,
    Operation, PreparedMigration, TenantContext,
};
use crate::model::SHARED_SCHEMA;
use crate::tenant::TenantHandle;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// One schema's migration run: which migrations, and the tenant they are
/// instantiated for when the schema belongs to a tenant.
pub struct MigrationPass<'a> {
    pub schema: &'a str,
    pub migrations: &'a [MigrationDefinition],
    pub context: Option<&'a dyn TenantContext>,
}

impl<'a> MigrationPass<'a> {
    pub fn shared(migrations: &'a [MigrationDefinition]) -> Self {
        Self {
            schema: SHARED_SCHEMA,
            migrations,
            context: None,
        }
    }

    pub fn tenant(handle: &'a TenantHandle, migrations: &'a [MigrationDefinition]) -> Self {
        Self {
            schema: handle.schema(),
            migrations,
            context: Some(handle),
        }
    }

    fn sorted(&self) -> Vec<&'a MigrationDefinition> {
        let mut migrations: Vec<_> = self.migrations.iter().collect();
        migrations.sort_by_key(|m| m.id);
        migrations
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub schema: String,
    pub applied: Vec<String>,
    pub skipped: usize,
}

/// Applies migration passes, one schema at a time.
///
/// Passes over the same schema are serialized in-process; the executor
/// serializes across processes.
#[derive(Clone)]
pub struct Migrator {
    executor: Arc<dyn MigrationExecutor>,
    active_provider: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Migrator {
    pub fn new(executor: Arc<dyn MigrationExecutor>, active_provider: &str) -> Self {
        Self {
            executor,
            active_provider: active_provider.to_string(),
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn active_provider(&self) -> &str {
        &self.active_provider
    }

    async fn lock_schema(&self, schema: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(schema.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Apply every migration of the pass not yet in the schema's history, in id order.
    pub async fn apply_pending(&self, pass: &MigrationPass<'_>) -> Result<SchemaReport> {
        let _guard = self.lock_schema(pass.schema).await;

        let history = HistoryTable::new(pass.schema);
        self.executor.ensure_history(&history).await?;

        let applied: HashMap<String, String> = self
            .executor
            .applied_migrations(&history)
            .await?
            .into_iter()
            .map(|m| (m.migration_id, m.checksum))
            .collect();
        debug!(
            "Schema {} has {} applied migrations",
            pass.schema,
            applied.len()
        );

        for id in applied.keys() {
            if !pass.migrations.iter().any(|m| m.id == id) {
                warn!("Schema {} records unknown migration {}", pass.schema, id);
            }
        }

        let resolver = MigrationResolver::new(pass.context);
        let mut report = SchemaReport {
            schema: pass.schema.to_string(),
            ..Default::default()
        };

        for definition in pass.sorted() {
            let prepared = resolver.create_migration(definition, &self.active_provider)?;
            let step = self.render(pass, &prepared, prepared.up_operations())?;

            if let Some(checksum) = applied.get(definition.id) {
                if checksum != &step.checksum {
                    warn!(
                        "Migration {} in {} was modified after being applied (recorded {}, now {})",
                        definition.id, pass.schema, checksum, step.checksum
                    );
                }
                debug!("Skipping already applied migration: {}", definition.id);
                report.skipped += 1;
                continue;
            }

            info!("Applying migration: {} to {}", definition.id, pass.schema);

            if self.executor.apply(&history, &step).await? {
                info!(
                    "Successfully applied migration: {} (checksum: {})",
                    definition.id, step.checksum
                );
                report.applied.push(definition.id.to_string());
            } else {
                debug!(
                    "Migration {} was applied to {} concurrently",
                    definition.id, pass.schema
                );
                report.skipped += 1;
            }
        }

        Ok(report)
    }

    /// Revert applied migrations newer than `target`, newest first.
    /// `None` reverts everything in the pass.
    pub async fn revert_to(
        &self,
        pass: &MigrationPass<'_>,
        target: Option<&str>,
    ) -> Result<Vec<String>> {
        if let Some(target) = target {
            if !pass.migrations.iter().any(|m| m.id == target) {
                return Err(StoreError::invalid_request(format!(
                    "Unknown migration {} for schema {}",
                    target, pass.schema
                )));
            }
        }

        let _guard = self.lock_schema(pass.schema).await;

        let history = HistoryTable::new(pass.schema);
        self.executor.ensure_history(&history).await?;
        let applied: Vec<String> = self
            .executor
            .applied_migrations(&history)
            .await?
            .into_iter()
            .map(|m| m.migration_id)
            .collect();

        let resolver = MigrationResolver::new(pass.context);
        let mut reverted = Vec::new();

        for definition in pass.sorted().into_iter().rev() {
            if target.is_some_and(|t| definition.id <= t) {
                break;
            }
            if !applied.iter().any(|id| id == definition.id) {
                continue;
            }

            let prepared = resolver.create_migration(definition, &self.active_provider)?;
            let step = self.render(pass, &prepared, prepared.down_operations())?;

            info!("Reverting migration: {} in {}", definition.id, pass.schema);
            if self.executor.revert(&history, &step).await? {
                reverted.push(definition.id.to_string());
            }
        }

        Ok(reverted)
    }

    fn render(
        &self,
        pass: &MigrationPass<'_>,
        prepared: &PreparedMigration,
        operations: Vec<Operation>,
    ) -> Result<MigrationStep> {
        if let Some(context) = pass.context {
            for operation in &operations {
                let Some((schema, table)) = operation.target_table() else {
                    continue;
                };
                if context.model().is_excluded_from_migrations(schema, table) {
                    return Err(StoreError::MigrationFailed {
                        schema: pass.schema.to_string(),
                        migration: prepared.id().to_string(),
                        cause: format!(
                            "{}.{} is owned by another schema's migrations",
                            schema, table
                        ),
                    });
                }
            }
        }

        let statements: Vec<String> = operations.iter().map(Operation::to_sql).collect();

        Ok(MigrationStep {
            migration_id: prepared.id().to_string(),
            provider: prepared.active_provider().to_string(),
            checksum: compute_checksum(&statements),
            statements,
        })
    }
}
