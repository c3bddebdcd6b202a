// crates/server/src/main.rs
//! Agentdeck server binary.
//!
//! Wires the discovery scanner, the session registry timer, and the Axum
//! HTTP/WebSocket surface together, then serves until ctrl-c.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use agentdeck_server::discovery::spawn_discovery;
use agentdeck_server::{create_app, AppState, Config, EventHub, SessionRegistry};

/// How often the registry applies time-gated state transitions.
const TICK_INTERVAL: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agentdeck=info,agentdeck_server=info")),
        )
        .compact()
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        root = %config.transcript_root.display(),
        port = config.port,
        "starting agentdeck"
    );

    let registry = Arc::new(SessionRegistry::new(EventHub::new()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_discovery(
        registry.clone(),
        config.transcript_root.clone(),
        shutdown_rx.clone(),
    );

    // Timer loop. Drives idle/stop transitions and git status refreshes.
    let tick_registry = registry.clone();
    let mut tick_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick_shutdown.changed() => {
                    if *tick_shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    tick_registry.tick(Utc::now().timestamp_millis()).await;
                }
            }
        }
    });

    let app = create_app(AppState::new(registry.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://localhost:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    registry.shutdown_all().await;
    Ok(())
}
