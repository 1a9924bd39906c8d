use crate::error::{Result, StoreError};
use crate::migration::FailurePolicy;
use ipnetwork::IpNetwork;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gateway_host: String,
    pub gateway_port: u16,
    pub pool_size: u32,
    pub pool_timeout: Duration,
    /// Provider identifier stamped onto every instantiated migration.
    pub active_provider: String,
    pub failure_policy: FailurePolicy,
    pub migrate_on_startup: bool,
    pub admin_token: Option<String>,
    pub allowed_admin_ips: Vec<IpNetwork>,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // Build database_url from individual fields or use DATABASE_URL if provided
        let database_url = match lookup("DATABASE_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(StoreError::configuration("DATABASE_URL is set but empty"));
            }
            Some(url) => url,
            None => {
                let db_host = var("DB_HOST", "localhost");
                let db_port = var("DB_PORT", "5432");
                let db_name = var("DB_NAME", "multistore");
                let db_user = var("DB_USER", "multistore");
                let db_password = var("DB_PASSWORD", "password");

                // URL-encode password to handle special characters
                let encoded_password = urlencoding::encode(&db_password);

                format!(
                    "postgres://{}:{}@{}:{}/{}",
                    db_user, encoded_password, db_host, db_port, db_name
                )
            }
        };

        let gateway_host = var("GATEWAY_HOST", "127.0.0.1");
        let gateway_port = var("GATEWAY_PORT", "9000").parse().unwrap_or(9000);
        let pool_size = var("DB_POOL_SIZE", "16").parse().unwrap_or(16);
        let pool_timeout_secs: u64 = var("DB_POOL_TIMEOUT_SECS", "5").parse().unwrap_or(5);

        let active_provider = var("DB_PROVIDER", "postgres").trim().to_string();
        if active_provider.is_empty() {
            return Err(StoreError::configuration(
                "DB_PROVIDER must name the active database provider",
            ));
        }

        let failure_policy = var("MIGRATION_FAILURE_POLICY", "abort").parse()?;

        let migrate_on_startup = !matches!(
            var("MIGRATE_ON_STARTUP", "true").to_ascii_lowercase().as_str(),
            "false" | "0" | "no" | "off"
        );

        let admin_token = lookup("ADMIN_TOKEN").filter(|t| !t.is_empty());

        let allowed_admin_ips = parse_networks(&var("ALLOWED_ADMIN_IPS", "127.0.0.0/8,::1/128"));

        let log_dir = PathBuf::from(var("LOG_DIR", "./logs"));

        Ok(Config {
            database_url,
            gateway_host,
            gateway_port,
            pool_size,
            pool_timeout: Duration::from_secs(pool_timeout_secs),
            active_provider,
            failure_policy,
            migrate_on_startup,
            admin_token,
            allowed_admin_ips,
            log_dir,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.gateway_host, self.gateway_port);
        addr.parse()
            .map_err(|e| StoreError::configuration(format!("Invalid socket address {}: {}", addr, e)))
    }
}

fn parse_networks(list: &str) -> Vec<IpNetwork> {
    list.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                IpNetwork::from_str(trimmed).ok()
            }
        })
        .collect()
}
