//! Tally API server.
//!
//! Main entry point for the ledger service. Also runs the scheduled
//! balance health job when enabled.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_api::{AppState, create_router};
use tally_db::{HealthRepository, LedgerSettings, connect_with};
use tally_shared::config::HealthCheckConfig;
use tally_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect_with(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    let settings = LedgerSettings::from(&config);
    let jwt_service = JwtService::new(JwtConfig::from(&config.jwt));

    if config.health.enabled {
        let health = HealthRepository::new(db.clone(), settings.clone());
        tokio::spawn(run_health_job(health, config.health.clone()));
    } else {
        info!("Scheduled balance health check disabled");
    }

    let state = AppState {
        db: Arc::new(db),
        jwt_service: Arc::new(jwt_service),
        settings,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Human-readable logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tally=debug,tally_db=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Checks the accounting equation on a fixed interval, healing if configured.
async fn run_health_job(health: HealthRepository, config: HealthCheckConfig) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
    // The first tick completes immediately; skip it so startup is not slowed.
    ticker.tick().await;
    info!(
        interval_secs = config.interval_secs,
        auto_heal = config.auto_heal,
        "Scheduled balance health check started"
    );

    loop {
        ticker.tick().await;
        match health.run_scheduled(config.auto_heal, Utc::now()).await {
            Ok(run) if run.report.is_healthy() => {}
            Ok(run) => match run.healing {
                Some(result) if result.healed => {
                    info!(actions = result.actions.len(), "Scheduled auto-heal repaired balances");
                }
                Some(result) => {
                    error!(
                        remaining = result.remaining_drift.len(),
                        "Scheduled auto-heal could not repair all balances"
                    );
                }
                None => warn!(
                    drift = run.report.drift.len(),
                    "Balance drift detected; auto-heal disabled"
                ),
            },
            Err(e) => error!(error = %e, "Scheduled balance health check failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
