use std::sync::Arc;

use ghostwire::{
    approval::{ApprovalStore, JoinWorkflow},
    config::AppConfig,
    console,
    hub::Hub,
    ws,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging first
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghostwire=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ghostwire relay v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::init()?;
    info!("Configuration loaded");

    if let Some(parent) = config.store.path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // A corrupt store is fatal: refusing to start beats silently dropping
    // operator-granted approvals.
    let store = ApprovalStore::new(config.store.path.clone());
    let approved = store.load().await.map_err(|e| {
        anyhow::anyhow!(
            "approval store at {} is unreadable: {e}",
            config.store.path.display()
        )
    })?;
    for user in &approved {
        info!("Found approval for {}", user.identity.username);
    }

    let state = ws::AppState {
        hub: Hub::spawn(),
        joins: Arc::new(Mutex::new(JoinWorkflow::new(store, approved))),
    };

    // Operator command loop on stdin
    tokio::spawn(console::run(state.clone()));

    let app = ws::create_router(state);
    let listener = TcpListener::bind(config.server.bind_addr()).await?;
    info!("Relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
