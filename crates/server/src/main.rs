use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskrelay_core::{
    load_config, validate_config, AgentPool, Dispatcher, Executor, ProcessExecutor,
    SqliteTicketStore, TicketStore,
};
use taskrelay_server::{api::create_router, state::AppState};

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
    let config_path = std::env::var("TASKRELAY_CONFIG")
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
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Project root: {:?}", config.project_root);
    info!("Database path: {:?}", config.database.path);

    // Create SQLite ticket store
    let ticket_store: Arc<dyn TicketStore> = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to create ticket store")?,
    );
    info!("Ticket store initialized");

    // Agent pools and the process executor
    let pool = AgentPool::from_config(&config.pools).context("Failed to create agent pools")?;
    for status in pool.status() {
        info!(pool = %status.name, max_concurrent = status.max_concurrent, "Agent pool ready");
    }

    let executor = ProcessExecutor::new(config.project_root.clone(), config.agents.clone());
    executor
        .validate()
        .await
        .context("Agent executor validation failed")?;

    // Create and start the dispatcher
    let dispatcher = Arc::new(Dispatcher::new(
        config.dispatcher.clone(),
        pool,
        Arc::new(executor),
        Arc::clone(&ticket_store),
    ));
    dispatcher
        .start()
        .await
        .context("Failed to start dispatcher")?;
    info!("Dispatcher started");

    if config.dispatcher.enqueue_on_startup {
        let queued = dispatcher
            .submit_active_tickets()
            .await
            .context("Failed to enqueue stored tickets")?;
        info!(tasks = queued, "Enqueued stored unfinished tickets");
    }

    // Periodic status log
    let status_logger = tokio::spawn(log_status(
        Arc::clone(&dispatcher),
        Duration::from_secs(config.dispatcher.status_log_interval_secs.max(1)),
    ));

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&ticket_store),
        Arc::clone(&dispatcher),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    let exit_when_idle = config.dispatcher.exit_when_idle;
    let idle_dispatcher = Arc::clone(&dispatcher);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if exit_when_idle {
                tokio::select! {
                    _ = shutdown_signal() => {},
                    _ = idle_dispatcher.wait_idle() => {
                        info!("Dispatcher idle, shutting down");
                    }
                }
            } else {
                shutdown_signal().await;
            }
        })
        .await
        .context("Server error")?;

    // Stop the dispatcher, letting running agents finish
    info!("Server shutting down...");
    status_logger.abort();
    if let Err(e) = dispatcher.stop().await {
        error!("Failed to stop dispatcher: {}", e);
    }

    let status = dispatcher.status().await;
    info!(
        completed = status.completed,
        failed = status.failed,
        blocked = status.blocked,
        queued = status.queue_size,
        "Dispatcher stopped"
    );

    Ok(())
}

/// Log a one-line dispatcher summary at a fixed interval.
async fn log_status(dispatcher: Arc<Dispatcher>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let status = dispatcher.status().await;
        info!(
            active = status.active,
            queued = status.queue_size,
            blocked = status.blocked,
            completed = status.completed,
            failed = status.failed,
            "Dispatcher status"
        );
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
