//! In-process backend for unit tests.
//!
//! Mirrors the PostgreSQL backend's ordering, case-insensitive matching and
//! per-schema table layout, keyed by the qualified table names the compiled
//! models hand it. A model bound to the wrong schema writes to the wrong
//! map here exactly as it would write to the wrong table in PostgreSQL.

use crate::db::{RegistryStore, TenantStore};
use crate::error::{Result, StoreError};
use crate::migration::{AppliedMigration, HistoryTable, MigrationExecutor, MigrationStep};
use crate::model::{CompiledModel, Entity};
use crate::registry::{CatalogItem, TenantRecord};
use crate::tenant::records::check_catalog_reference;
use crate::tenant::{CatalogueEntry, StockRecord, StockWrite};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    tenants: Vec<TenantRecord>,
    products: Vec<CatalogItem>,
    /// Stock rows keyed by qualified table name.
    stock: HashMap<String, Vec<StockRecord>>,
    /// History rows keyed by qualified history table name.
    history: HashMap<String, Vec<AppliedMigration>>,
    tables: BTreeSet<String>,
    executed: Vec<String>,
    failing_schemas: HashSet<String>,
    unreachable: bool,
}

#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn add_tenant(&self, record: TenantRecord) {
        self.state().tenants.push(record);
    }

    pub fn add_product(&self, item: CatalogItem) {
        self.state().products.push(item);
    }

    pub fn set_discontinued(&self, code: &str, discontinued: bool) {
        let mut state = self.state();
        for item in state.products.iter_mut().filter(|p| p.code == code) {
            item.discontinued = discontinued;
        }
    }

    /// Make every migration applied to `schema` fail.
    pub fn fail_schema(&self, schema: &str) {
        self.state().failing_schemas.insert(schema.to_string());
    }

    pub fn heal_schema(&self, schema: &str) {
        self.state().failing_schemas.remove(schema);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Every DDL statement executed, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Migration ids recorded in `schema`'s history table.
    pub fn history(&self, schema: &str) -> Vec<String> {
        let key = HistoryTable::new(schema).qualified_name();
        self.state()
            .history
            .get(&key)
            .map(|rows| rows.iter().map(|r| r.migration_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn tamper_checksum(&self, schema: &str, migration_id: &str) {
        let key = HistoryTable::new(schema).qualified_name();
        if let Some(rows) = self.state().history.get_mut(&key) {
            for row in rows.iter_mut().filter(|r| r.migration_id == migration_id) {
                row.checksum = "tampered".to_string();
            }
        }
    }

    pub fn has_table(&self, qualified: &str) -> bool {
        self.state().tables.contains(qualified)
    }

    pub fn stock_rows(&self, qualified: &str) -> Vec<StockRecord> {
        self.state().stock.get(qualified).cloned().unwrap_or_default()
    }

    fn check_reachable(&self, schema: &str) -> Result<()> {
        if self.state().unreachable {
            return Err(StoreError::ConnectionFailed {
                schema: schema.to_string(),
                cause: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

fn track_tables(tables: &mut BTreeSet<String>, statement: &str) {
    if let Some(rest) = statement.strip_prefix("CREATE TABLE ") {
        if let Some(name) = rest.split(" (").next() {
            tables.insert(name.to_string());
        }
    } else if let Some(rest) = statement.strip_prefix("DROP TABLE ") {
        tables.remove(rest.trim_end_matches(';'));
    }
}

fn find_product<'a>(products: &'a [CatalogItem], code: &str) -> Option<&'a CatalogItem> {
    products
        .iter()
        .filter(|p| p.code.eq_ignore_ascii_case(code))
        .min_by(|a, b| a.code.cmp(&b.code))
}

#[async_trait]
impl RegistryStore for MemoryDatabase {
    async fn ping(&self) -> bool {
        !self.state().unreachable
    }

    async fn list_tenants(&self, model: &CompiledModel) -> Result<Vec<TenantRecord>> {
        let stores = model.mapping(Entity::Tenant)?;
        self.check_reachable(&stores.schema)?;

        let mut tenants = self.state().tenants.clone();
        tenants.sort_by(|a, b| a.schema_name.cmp(&b.schema_name));
        Ok(tenants)
    }

    async fn find_tenant(&self, model: &CompiledModel, code: &str) -> Result<Option<TenantRecord>> {
        let stores = model.mapping(Entity::Tenant)?;
        self.check_reachable(&stores.schema)?;

        Ok(self
            .state()
            .tenants
            .iter()
            .filter(|t| t.code.eq_ignore_ascii_case(code))
            .min_by(|a, b| a.code.cmp(&b.code))
            .cloned())
    }

    async fn upsert_tenant(
        &self,
        model: &CompiledModel,
        record: &TenantRecord,
    ) -> Result<TenantRecord> {
        let stores = model.mapping(Entity::Tenant)?;
        self.check_reachable(&stores.schema)?;

        let mut state = self.state();
        let code = state
            .tenants
            .iter()
            .find(|t| t.code.eq_ignore_ascii_case(&record.code))
            .map(|t| t.code.clone())
            .unwrap_or_else(|| record.code.clone());

        if let Some(owner) = state
            .tenants
            .iter()
            .find(|t| t.schema_name == record.schema_name && t.code != code)
        {
            return Err(StoreError::DuplicateSchema {
                schema: record.schema_name.clone(),
                owner: owner.code.clone(),
            });
        }

        let saved = TenantRecord {
            code: code.clone(),
            ..record.clone()
        };
        match state.tenants.iter_mut().find(|t| t.code == code) {
            Some(existing) => *existing = saved.clone(),
            None => state.tenants.push(saved.clone()),
        }
        Ok(saved)
    }

    async fn list_products(&self, model: &CompiledModel) -> Result<Vec<CatalogItem>> {
        let products = model.mapping(Entity::CatalogItem)?;
        self.check_reachable(&products.schema)?;

        let mut items = self.state().products.clone();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn find_product(&self, model: &CompiledModel, code: &str) -> Result<Option<CatalogItem>> {
        let products = model.mapping(Entity::CatalogItem)?;
        self.check_reachable(&products.schema)?;

        Ok(find_product(&self.state().products, code).cloned())
    }

    async fn upsert_product(&self, model: &CompiledModel, item: &CatalogItem) -> Result<CatalogItem> {
        let products = model.mapping(Entity::CatalogItem)?;
        self.check_reachable(&products.schema)?;

        let mut state = self.state();
        let code = find_product(&state.products, &item.code)
            .map(|p| p.code.clone())
            .unwrap_or_else(|| item.code.clone());

        let saved = CatalogItem {
            code: code.clone(),
            ..item.clone()
        };
        match state.products.iter_mut().find(|p| p.code == code) {
            Some(existing) => *existing = saved.clone(),
            None => state.products.push(saved.clone()),
        }
        Ok(saved)
    }
}

#[async_trait]
impl TenantStore for MemoryDatabase {
    async fn find_catalog_item(
        &self,
        model: &CompiledModel,
        code: &str,
    ) -> Result<Option<CatalogItem>> {
        model.mapping(Entity::CatalogItem)?;
        self.check_reachable(&model.default_schema)?;

        Ok(find_product(&self.state().products, code).cloned())
    }

    async fn list_stock(&self, model: &CompiledModel) -> Result<Vec<StockRecord>> {
        let stock = model.mapping(Entity::Stock)?;
        self.check_reachable(&stock.schema)?;

        let mut rows = self.stock_rows(&stock.qualified_name);
        rows.sort_by(|a, b| b.last_ordered_at.cmp(&a.last_ordered_at));
        Ok(rows)
    }

    async fn upsert_stock(&self, model: &CompiledModel, write: StockWrite) -> Result<StockRecord> {
        let stock = model.mapping(Entity::Stock)?;
        model.mapping(Entity::CatalogItem)?;
        self.check_reachable(&stock.schema)?;

        let mut state = self.state();
        let canonical = check_catalog_reference(&write.code, find_product(&state.products, &write.code))?
            .code
            .clone();
        let record = write.into_record(&canonical, Utc::now());

        let rows = state.stock.entry(stock.qualified_name.clone()).or_default();
        match rows.iter_mut().find(|r| r.code == record.code) {
            Some(existing) => *existing = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(record)
    }

    async fn catalogue(&self, model: &CompiledModel) -> Result<Vec<CatalogueEntry>> {
        let stock = model.mapping(Entity::Stock)?;
        self.check_reachable(&stock.schema)?;

        let state = self.state();
        let mut entries: Vec<CatalogueEntry> = state
            .stock
            .get(&stock.qualified_name)
            .into_iter()
            .flatten()
            .filter_map(|record| {
                state
                    .products
                    .iter()
                    .find(|p| p.code == record.code)
                    .map(|item| CatalogueEntry::new(record, item))
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[async_trait]
impl MigrationExecutor for MemoryDatabase {
    async fn ensure_history(&self, history: &HistoryTable) -> Result<()> {
        self.check_reachable(history.schema())?;

        let mut state = self.state();
        state.history.entry(history.qualified_name()).or_default();
        state.tables.insert(history.qualified_name());
        Ok(())
    }

    async fn applied_migrations(&self, history: &HistoryTable) -> Result<Vec<AppliedMigration>> {
        self.check_reachable(history.schema())?;

        let mut rows = self
            .state()
            .history
            .get(&history.qualified_name())
            .cloned()
            .unwrap_or_default();
        rows.sort_by(|a, b| a.migration_id.cmp(&b.migration_id));
        Ok(rows)
    }

    async fn apply(&self, history: &HistoryTable, step: &MigrationStep) -> Result<bool> {
        self.check_reachable(history.schema())?;

        let mut state = self.state();
        if state.failing_schemas.contains(history.schema()) {
            return Err(StoreError::MigrationFailed {
                schema: history.schema().to_string(),
                migration: step.migration_id.clone(),
                cause: "injected failure".to_string(),
            });
        }

        let rows = state.history.entry(history.qualified_name()).or_default();
        if rows.iter().any(|r| r.migration_id == step.migration_id) {
            return Ok(false);
        }
        rows.push(AppliedMigration {
            migration_id: step.migration_id.clone(),
            checksum: step.checksum.clone(),
        });

        for statement in &step.statements {
            track_tables(&mut state.tables, statement);
            state.executed.push(statement.clone());
        }
        Ok(true)
    }

    async fn revert(&self, history: &HistoryTable, step: &MigrationStep) -> Result<bool> {
        self.check_reachable(history.schema())?;

        let mut state = self.state();
        let rows = state.history.entry(history.qualified_name()).or_default();
        let before = rows.len();
        rows.retain(|r| r.migration_id != step.migration_id);
        if rows.len() == before {
            return Ok(false);
        }

        for statement in &step.statements {
            track_tables(&mut state.tables, statement);
            state.executed.push(statement.clone());
        }
        Ok(true)
    }
}
