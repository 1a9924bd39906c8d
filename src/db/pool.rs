use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::model::SHARED_SCHEMA;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::info;

/// Build the process-wide pool and verify the database answers.
pub async fn connect(config: &Config) -> Result<Pool> {
    let pool = create_pool(&config.database_url, config.pool_size, config.pool_timeout)?;

    let client = pool.get().await.map_err(|e| StoreError::ConnectionFailed {
        schema: SHARED_SCHEMA.to_string(),
        cause: e.to_string(),
    })?;

    // Simple ping query
    client
        .execute("SELECT 1", &[])
        .await
        .map_err(|e| StoreError::ConnectionFailed {
            schema: SHARED_SCHEMA.to_string(),
            cause: format!("Ping failed: {}", e),
        })?;

    info!("Connected to PostgreSQL (pool size {})", config.pool_size);

    Ok(pool)
}

fn create_pool(database_url: &str, max_size: u32, timeout: Duration) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(timeout),
            create: Some(timeout),
            recycle: Some(timeout),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| StoreError::configuration(format!("Failed to create pool: {}", e)))
}
