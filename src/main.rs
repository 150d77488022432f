//! Oracle Terminal - dashboard backend for the autonomous trading agent
//!
//! Logs the agent's timestamped thoughts, serves them over HTTP and SSE,
//! tracks approximate API spend against a budget, and proxies Polymarket
//! position data.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oracle_terminal::api::{create_router, AppState};
use oracle_terminal::control::PanicButton;
use oracle_terminal::mission::MissionTracker;
use oracle_terminal::models::Config;
use oracle_terminal::positions::PositionsSource;
use oracle_terminal::thoughts::{ThoughtFeed, ThoughtStore};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::from_env()?;

    info!("🔮 Oracle terminal starting");

    let store = Arc::new(
        ThoughtStore::open(&config.logs_dir, config.rolling_capacity)
            .context("Failed to open thought store")?,
    );
    info!(
        "🧠 Thought log at {} (rolling capacity {})",
        config.logs_dir.display(),
        config.rolling_capacity
    );

    let feed = ThoughtFeed::spawn(store.clone(), Duration::from_millis(config.stream_tick_ms));

    let mission = Arc::new(MissionTracker::new(
        config.logs_dir.join("mission.json"),
        config.mission_starting_spend,
        config.mission_budget,
    ));

    let positions = Arc::new(
        PositionsSource::new(
            config.positions_file.clone(),
            config.polymarket_wallet.clone(),
        )
        .context("Failed to build positions source")?,
    );
    match &config.polymarket_wallet {
        Some(wallet) => info!("📈 Positions: Polymarket data API for {wallet} (snapshot fallback)"),
        None => info!(
            "📈 Positions: local snapshot {}",
            config.positions_file.display()
        ),
    }

    if config.admin_token.is_none() {
        info!("🔒 ADMIN_TOKEN not set - panic endpoint disabled");
    }

    let state = AppState {
        store,
        feed,
        mission,
        positions,
        panic: Arc::new(PanicButton::new(config.panic_script.clone())),
        admin_token: config.admin_token.clone(),
    };

    let app = create_router(state, &config.public_dir);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 Oracle terminal listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing with env-filter overrides
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oracle_terminal=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv::dotenv();

    // 2) Also try the crate-dir .env (common when running with --manifest-path
    // from elsewhere). CARGO_MANIFEST_DIR points at the crate at compile time.
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];

    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}
