use multistore_gateway::api::{self, AppState};
use multistore_gateway::config::Config;
use multistore_gateway::context::DataContext;
use multistore_gateway::db::{self, PgDatabase};
use multistore_gateway::migration::{MigrationOrchestrator, Migrator};
use multistore_gateway::security::AdminAuthConfig;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    let dotenv = dotenvy::dotenv();

    let config = Config::from_env()?;

    std::fs::create_dir_all(&config.log_dir).unwrap_or_else(|e| {
        eprintln!(
            "Warning: Could not create log directory {}: {}",
            config.log_dir.display(),
            e
        );
    });

    // Create file appender with daily rotation
    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "multistore-gateway.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,multistore_gateway=debug")),
        )
        // Console output
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        // File output with JSON format for easy parsing
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
        .init();

    debug!("Logging initialized - log directory: {}", config.log_dir.display());
    if let Err(e) = dotenv {
        warn!("No .env file found or error loading it: {}", e);
    }

    let socket_addr = config.socket_addr()?;

    info!("Starting Multistore Gateway on {}", socket_addr);
    info!("Pool size: {}, timeout: {:?}", config.pool_size, config.pool_timeout);
    info!("Active migration provider: {}", config.active_provider);
    info!("Migration failure policy: {:?}", config.failure_policy);
    info!("Admin networks: {:?}", config.allowed_admin_ips);

    let pool = db::connect(&config).await?;
    let database = Arc::new(PgDatabase::new(pool));

    let context = DataContext::new(database.clone(), database.clone());
    let orchestrator = Arc::new(MigrationOrchestrator::new(
        context.clone(),
        Migrator::new(database.clone(), &config.active_provider),
        config.failure_policy,
    ));

    if config.migrate_on_startup {
        let report = orchestrator.run().await?;
        for failure in &report.failures {
            warn!(
                "Store {} ({}) left unmigrated: {}",
                failure.store, failure.schema, failure.error
            );
        }
    } else {
        info!("MIGRATE_ON_STARTUP disabled, skipping migration sweep");
    }

    let state = Arc::new(AppState::new(context, orchestrator));
    let admin_auth = Arc::new(AdminAuthConfig::from_config(&config));
    if !admin_auth.is_enabled() {
        warn!("ADMIN_TOKEN not set, admin endpoints are disabled");
    }

    let app = api::router(state, admin_auth).layer(TraceLayer::new_for_http());

    // Create listener
    let listener = tokio::net::TcpListener::bind(&socket_addr).await?;
    info!("Server listening on {}", socket_addr);

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
