use crate::db::identifier::{qualified_name, quote_ident};
use crate::error::Result;
use crate::model::HISTORY_TABLE;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// The migration history table of one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTable {
    schema: String,
}

impl HistoryTable {
    pub fn new(schema: &str) -> Self {
        Self {
            schema: schema.to_string(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn qualified_name(&self) -> String {
        qualified_name(&self.schema, HISTORY_TABLE)
    }

    /// Idempotent DDL creating the schema and its history table.
    pub fn create_sql(&self) -> String {
        format!(
            r#"
            CREATE SCHEMA IF NOT EXISTS {};
            CREATE TABLE IF NOT EXISTS {} (
                migration_id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                checksum TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            quote_ident(&self.schema),
            self.qualified_name()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub migration_id: String,
    pub checksum: String,
}

/// One rendered migration direction.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub migration_id: String,
    pub provider: String,
    pub checksum: String,
    pub statements: Vec<String>,
}

/// Executes rendered migrations against one schema's history.
#[async_trait]
pub trait MigrationExecutor: Send + Sync {
    async fn ensure_history(&self, history: &HistoryTable) -> Result<()>;

    async fn applied_migrations(&self, history: &HistoryTable) -> Result<Vec<AppliedMigration>>;

    /// Execute the step and record it in one transaction.
    ///
    /// Returns `Ok(false)` without executing anything when the history
    /// already holds the step's id.
    async fn apply(&self, history: &HistoryTable, step: &MigrationStep) -> Result<bool>;

    /// Execute a down step and remove its history row in one transaction.
    async fn revert(&self, history: &HistoryTable, step: &MigrationStep) -> Result<bool>;
}

/// SHA-256 over the rendered statements.
pub fn compute_checksum(statements: &[String]) -> String {
    let mut hasher = Sha256::new();
    for statement in statements {
        hasher.update(statement.as_bytes());
        hasher.update(b";\n");
    }
    hex::encode(hasher.finalize())
}
