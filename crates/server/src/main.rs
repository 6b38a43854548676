use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offerline_core::{
    create_notifier, load_config, validate_config, ArtifactLayout, CompanionNotifier, Config,
    FsJobStore, JobOrchestrator, JobStore, ProcessStepInvoker, SqliteJobStore, StepInvoker,
    StorageBackend, STANDARD_PIPELINE,
};
use offerline_server::api::create_router;
use offerline_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("OFFERLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "offerline {} configuration loaded (hash {})",
        VERSION,
        &config_hash[..16]
    );
    info!("Storage backend: {:?}", config.storage.backend);
    info!("Output directory: {:?}", config.storage.output_dir);

    let store = create_store(&config)?;

    let invoker: Arc<dyn StepInvoker> = Arc::new(ProcessStepInvoker::new(
        config.generator.clone(),
        STANDARD_PIPELINE,
    ));
    info!(
        "Using generator: {} {:?}",
        config.generator.program, config.generator.args
    );

    let notifier: Arc<dyn CompanionNotifier> = Arc::from(create_notifier(&config.companion));
    if config.companion.enabled {
        info!("Companion notifier enabled ({})", config.companion.program);
    }

    let orchestrator = Arc::new(JobOrchestrator::new(
        config.orchestrator.clone(),
        store,
        invoker,
        notifier,
        ArtifactLayout::new(&config.storage.output_dir),
        STANDARD_PIPELINE,
        config.generator.product_type.clone(),
    ));
    orchestrator.start().await;
    info!("Job orchestrator started");

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&orchestrator)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Stopping orchestrator...");
    orchestrator.stop().await;
    info!("Server shut down");

    Ok(())
}

fn create_store(config: &Config) -> Result<Arc<dyn JobStore>> {
    let store: Arc<dyn JobStore> = match config.storage.backend {
        StorageBackend::Fs => Arc::new(
            FsJobStore::new(&config.storage.output_dir)
                .context("Failed to create filesystem job store")?,
        ),
        StorageBackend::Sqlite => {
            let path = config
                .storage
                .database_path
                .as_deref()
                .context("storage.database_path is required for the sqlite backend")?;
            info!("Database path: {:?}", path);
            Arc::new(SqliteJobStore::new(path).context("Failed to create sqlite job store")?)
        }
    };
    info!("Job store initialized");
    Ok(store)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
