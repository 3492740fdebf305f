use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use memoblog::{
    AccountManager, AppConfig, AppState, BlogRepository, BlogService, Cli, MemoryStore, SessionStore,
    build_router,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()
        .and_then(|config| config.apply_cli(cli))
        .context("failed to load application configuration")?;

    init_tracing();

    let store = Arc::new(match &config.data_dir {
        Some(dir) => {
            info!(data_dir = %dir.display(), durability = ?config.durability, "opening durable store");
            MemoryStore::open(dir, config.durability, config.checkpoint_every)
                .with_context(|| format!("failed to open data directory {}", dir.display()))?
        }
        None => {
            info!("running with an in-memory store, data is lost on exit");
            MemoryStore::new()
        }
    });
    let repository: Arc<dyn BlogRepository> = store.clone();

    let accounts = AccountManager::with_cost(repository.clone(), config.bcrypt_cost);
    if let Some(admin) = &config.admin {
        accounts
            .ensure_moderator(&admin.username, &admin.password)
            .await
            .context("failed to seed the moderator account")?;
    }

    let sessions = Arc::new(SessionStore::new(config.max_sessions, config.session_ttl));
    let service = BlogService::new(repository, config.per_page);
    let app = build_router(AppState::new(service, accounts, sessions));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, per_page = config.per_page, "memoblog started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store
        .checkpoint()
        .await
        .context("failed to write final snapshot")?;
    info!("memoblog stopped");

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("memoblog=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
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
