use crate::db::{RegistryStore, TenantStore};
use crate::error::{is_unique_violation, Result, StoreError};
use crate::migration::{AppliedMigration, HistoryTable, MigrationExecutor, MigrationStep};
use crate::model::{CompiledModel, Entity};
use crate::registry::{CatalogItem, TenantRecord};
use crate::tenant::records::check_catalog_reference;
use crate::tenant::{CatalogueEntry, StockRecord, StockWrite};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Object, Pool};
use tokio_postgres::Row;
use tracing::{debug, info};

/// PostgreSQL-backed store for the registry, tenant data and migration history.
#[derive(Clone)]
pub struct PgDatabase {
    pool: Pool,
}

impl PgDatabase {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn client(&self, schema: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                schema: schema.to_string(),
                cause: e.to_string(),
            })
    }
}

fn tenant_from_row(row: &Row) -> TenantRecord {
    TenantRecord {
        code: row.get("code"),
        name: row.get("name"),
        city: row.get("city"),
        schema_name: row.get("schema_name"),
    }
}

fn product_from_row(row: &Row) -> CatalogItem {
    CatalogItem {
        code: row.get("code"),
        name: row.get("name"),
        category: row.get("category"),
        reference_price: row.get("reference_price"),
        discontinued: row.get("discontinued"),
    }
}

fn stock_from_row(row: &Row) -> StockRecord {
    StockRecord {
        code: row.get("code"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
        last_ordered_at: row.get("last_ordered_at"),
    }
}

#[async_trait]
impl RegistryStore for PgDatabase {
    async fn ping(&self) -> bool {
        match self.pool.get().await {
            Ok(client) => client.execute("SELECT 1", &[]).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn list_tenants(&self, model: &CompiledModel) -> Result<Vec<TenantRecord>> {
        let stores = model.mapping(Entity::Tenant)?;
        let client = self.client(&stores.schema).await?;

        let sql = format!(
            "SELECT {} FROM {} ORDER BY schema_name",
            stores.column_list(),
            stores.qualified_name
        );
        let rows = client.query(sql.as_str(), &[]).await?;

        Ok(rows.iter().map(tenant_from_row).collect())
    }

    async fn find_tenant(&self, model: &CompiledModel, code: &str) -> Result<Option<TenantRecord>> {
        let stores = model.mapping(Entity::Tenant)?;
        let client = self.client(&stores.schema).await?;

        let sql = format!(
            "SELECT {} FROM {} WHERE lower(code) = lower($1) ORDER BY code LIMIT 1",
            stores.column_list(),
            stores.qualified_name
        );
        let row = client.query_opt(sql.as_str(), &[&code]).await?;

        Ok(row.as_ref().map(tenant_from_row))
    }

    async fn upsert_tenant(
        &self,
        model: &CompiledModel,
        record: &TenantRecord,
    ) -> Result<TenantRecord> {
        let stores = model.mapping(Entity::Tenant)?;
        let mut client = self.client(&stores.schema).await?;
        let tx = client.transaction().await?;

        let find_sql = format!(
            "SELECT code FROM {} WHERE lower(code) = lower($1) ORDER BY code LIMIT 1 FOR UPDATE",
            stores.qualified_name
        );
        let code: String = tx
            .query_opt(find_sql.as_str(), &[&record.code])
            .await?
            .map(|row| row.get(0))
            .unwrap_or_else(|| record.code.clone());

        let owner_sql = format!(
            "SELECT code FROM {} WHERE schema_name = $1 AND code <> $2 LIMIT 1",
            stores.qualified_name
        );
        if let Some(row) = tx
            .query_opt(owner_sql.as_str(), &[&record.schema_name, &code])
            .await?
        {
            return Err(StoreError::DuplicateSchema {
                schema: record.schema_name.clone(),
                owner: row.get(0),
            });
        }

        let upsert_sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name, city = EXCLUDED.city, \
             schema_name = EXCLUDED.schema_name \
             RETURNING {}",
            stores.qualified_name,
            stores.column_list(),
            stores.column_list()
        );
        let row = tx
            .query_one(
                upsert_sql.as_str(),
                &[&code, &record.name, &record.city, &record.schema_name],
            )
            .await
            .map_err(|e| {
                // The unique index on schema_name catches a concurrent claim.
                if is_unique_violation(&e) {
                    StoreError::DuplicateSchema {
                        schema: record.schema_name.clone(),
                        owner: "another store".to_string(),
                    }
                } else {
                    StoreError::from(e)
                }
            })?;

        tx.commit().await?;

        let saved = tenant_from_row(&row);
        info!("Saved store {} -> schema {}", saved.code, saved.schema_name);
        Ok(saved)
    }

    async fn list_products(&self, model: &CompiledModel) -> Result<Vec<CatalogItem>> {
        let products = model.mapping(Entity::CatalogItem)?;
        let client = self.client(&products.schema).await?;

        let sql = format!(
            "SELECT {} FROM {} ORDER BY name",
            products.column_list(),
            products.qualified_name
        );
        let rows = client.query(sql.as_str(), &[]).await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn find_product(&self, model: &CompiledModel, code: &str) -> Result<Option<CatalogItem>> {
        let products = model.mapping(Entity::CatalogItem)?;
        let client = self.client(&products.schema).await?;

        let sql = format!(
            "SELECT {} FROM {} WHERE lower(code) = lower($1) ORDER BY code LIMIT 1",
            products.column_list(),
            products.qualified_name
        );
        let row = client.query_opt(sql.as_str(), &[&code]).await?;

        Ok(row.as_ref().map(product_from_row))
    }

    async fn upsert_product(&self, model: &CompiledModel, item: &CatalogItem) -> Result<CatalogItem> {
        let products = model.mapping(Entity::CatalogItem)?;
        let mut client = self.client(&products.schema).await?;
        let tx = client.transaction().await?;

        let find_sql = format!(
            "SELECT code FROM {} WHERE lower(code) = lower($1) ORDER BY code LIMIT 1 FOR UPDATE",
            products.qualified_name
        );
        let code: String = tx
            .query_opt(find_sql.as_str(), &[&item.code])
            .await?
            .map(|row| row.get(0))
            .unwrap_or_else(|| item.code.clone());

        let upsert_sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name, category = EXCLUDED.category, \
             reference_price = EXCLUDED.reference_price, discontinued = EXCLUDED.discontinued \
             RETURNING {}",
            products.qualified_name,
            products.column_list(),
            products.column_list()
        );
        let row = tx
            .query_one(
                upsert_sql.as_str(),
                &[
                    &code,
                    &item.name,
                    &item.category,
                    &item.reference_price,
                    &item.discontinued,
                ],
            )
            .await?;

        tx.commit().await?;
        Ok(product_from_row(&row))
    }
}

#[async_trait]
impl TenantStore for PgDatabase {
    async fn find_catalog_item(
        &self,
        model: &CompiledModel,
        code: &str,
    ) -> Result<Option<CatalogItem>> {
        let products = model.mapping(Entity::CatalogItem)?;
        let client = self.client(&model.default_schema).await?;

        let sql = format!(
            "SELECT {} FROM {} WHERE lower(code) = lower($1) ORDER BY code LIMIT 1",
            products.column_list(),
            products.qualified_name
        );
        let row = client.query_opt(sql.as_str(), &[&code]).await?;

        Ok(row.as_ref().map(product_from_row))
    }

    async fn list_stock(&self, model: &CompiledModel) -> Result<Vec<StockRecord>> {
        let stock = model.mapping(Entity::Stock)?;
        let client = self.client(&stock.schema).await?;

        let sql = format!(
            "SELECT {} FROM {} ORDER BY last_ordered_at DESC",
            stock.column_list(),
            stock.qualified_name
        );
        let rows = client.query(sql.as_str(), &[]).await?;

        Ok(rows.iter().map(stock_from_row).collect())
    }

    async fn upsert_stock(&self, model: &CompiledModel, write: StockWrite) -> Result<StockRecord> {
        let stock = model.mapping(Entity::Stock)?;
        let products = model.mapping(Entity::CatalogItem)?;
        let mut client = self.client(&stock.schema).await?;
        let tx = client.transaction().await?;

        // FOR SHARE holds the catalog row until commit so it cannot be
        // discontinued or removed between the check and the write.
        let catalog_sql = format!(
            "SELECT {} FROM {} WHERE lower(code) = lower($1) ORDER BY code LIMIT 1 FOR SHARE",
            products.column_list(),
            products.qualified_name
        );
        let item = tx
            .query_opt(catalog_sql.as_str(), &[&write.code])
            .await?
            .as_ref()
            .map(product_from_row);
        let canonical = check_catalog_reference(&write.code, item.as_ref())?
            .code
            .clone();

        let record = write.into_record(&canonical, Utc::now());

        let upsert_sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (code) DO UPDATE SET quantity = EXCLUDED.quantity, \
             unit_price = EXCLUDED.unit_price, last_ordered_at = EXCLUDED.last_ordered_at \
             RETURNING {}",
            stock.qualified_name,
            stock.column_list(),
            stock.column_list()
        );
        let row = tx
            .query_one(
                upsert_sql.as_str(),
                &[
                    &record.code,
                    &record.quantity,
                    &record.unit_price,
                    &record.last_ordered_at,
                ],
            )
            .await?;

        tx.commit().await?;
        Ok(stock_from_row(&row))
    }

    async fn catalogue(&self, model: &CompiledModel) -> Result<Vec<CatalogueEntry>> {
        let stock = model.mapping(Entity::Stock)?;
        let products = model.mapping(Entity::CatalogItem)?;
        let client = self.client(&stock.schema).await?;

        let sql = format!(
            "SELECT s.code, s.quantity, s.unit_price, s.last_ordered_at, \
                    p.name, p.category, p.reference_price, p.discontinued \
             FROM {} s JOIN {} p ON p.code = s.code \
             ORDER BY p.name",
            stock.qualified_name, products.qualified_name
        );
        let rows = client.query(sql.as_str(), &[]).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let record = stock_from_row(row);
                let item = CatalogItem {
                    code: record.code.clone(),
                    name: row.get("name"),
                    category: row.get("category"),
                    reference_price: row.get("reference_price"),
                    discontinued: row.get("discontinued"),
                };
                CatalogueEntry::new(&record, &item)
            })
            .collect())
    }
}

fn migration_error(
    history: &HistoryTable,
    migration: &str,
) -> impl Fn(tokio_postgres::Error) -> StoreError {
    let schema = history.schema().to_string();
    let migration = migration.to_string();
    move |e| StoreError::MigrationFailed {
        schema: schema.clone(),
        migration: migration.clone(),
        cause: e.to_string(),
    }
}

const SCHEMA_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

#[async_trait]
impl MigrationExecutor for PgDatabase {
    async fn ensure_history(&self, history: &HistoryTable) -> Result<()> {
        let mut client = self.client(history.schema()).await?;
        let on_error = migration_error(history, "history table creation");

        let tx = client.transaction().await.map_err(&on_error)?;
        tx.execute(SCHEMA_LOCK_SQL, &[&history.schema()])
            .await
            .map_err(&on_error)?;
        tx.batch_execute(&history.create_sql())
            .await
            .map_err(&on_error)?;
        tx.commit().await.map_err(&on_error)?;

        Ok(())
    }

    async fn applied_migrations(&self, history: &HistoryTable) -> Result<Vec<AppliedMigration>> {
        let client = self.client(history.schema()).await?;

        let sql = format!(
            "SELECT migration_id, checksum FROM {} ORDER BY migration_id",
            history.qualified_name()
        );
        let rows = client
            .query(sql.as_str(), &[])
            .await
            .map_err(migration_error(history, "query applied migrations"))?;

        Ok(rows
            .iter()
            .map(|row| AppliedMigration {
                migration_id: row.get(0),
                checksum: row.get(1),
            })
            .collect())
    }

    async fn apply(&self, history: &HistoryTable, step: &MigrationStep) -> Result<bool> {
        let mut client = self.client(history.schema()).await?;
        let on_error = migration_error(history, &step.migration_id);

        let tx = client.transaction().await.map_err(&on_error)?;
        tx.execute(SCHEMA_LOCK_SQL, &[&history.schema()])
            .await
            .map_err(&on_error)?;

        // Another process may have applied it while we waited for the lock.
        let recorded_sql = format!(
            "SELECT 1 FROM {} WHERE migration_id = $1",
            history.qualified_name()
        );
        if tx
            .query_opt(recorded_sql.as_str(), &[&step.migration_id])
            .await
            .map_err(&on_error)?
            .is_some()
        {
            debug!(
                "Migration {} already recorded in {}",
                step.migration_id,
                history.schema()
            );
            return Ok(false);
        }

        for statement in &step.statements {
            tx.batch_execute(statement).await.map_err(&on_error)?;
        }

        let insert_sql = format!(
            "INSERT INTO {} (migration_id, provider, checksum) VALUES ($1, $2, $3)",
            history.qualified_name()
        );
        tx.execute(
            insert_sql.as_str(),
            &[&step.migration_id, &step.provider, &step.checksum],
        )
        .await
        .map_err(|e| StoreError::MigrationFailed {
            schema: history.schema().to_string(),
            migration: step.migration_id.clone(),
            cause: format!("Failed to record migration: {}", e),
        })?;

        tx.commit().await.map_err(&on_error)?;
        Ok(true)
    }

    async fn revert(&self, history: &HistoryTable, step: &MigrationStep) -> Result<bool> {
        let mut client = self.client(history.schema()).await?;
        let on_error = migration_error(history, &step.migration_id);

        let tx = client.transaction().await.map_err(&on_error)?;
        tx.execute(SCHEMA_LOCK_SQL, &[&history.schema()])
            .await
            .map_err(&on_error)?;

        let delete_sql = format!(
            "DELETE FROM {} WHERE migration_id = $1",
            history.qualified_name()
        );
        let removed = tx
            .execute(delete_sql.as_str(), &[&step.migration_id])
            .await
            .map_err(&on_error)?;
        if removed == 0 {
            return Ok(false);
        }

        for statement in &step.statements {
            tx.batch_execute(statement).await.map_err(&on_error)?;
        }

        tx.commit().await.map_err(&on_error)?;
        Ok(true)
    }
}

impl std::fmt::Debug for PgDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDatabase")
            .field("pool", &self.pool.status())
            .finish()
    }
}
