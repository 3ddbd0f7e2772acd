mod bootstrap;
mod health;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cartbot_core::config::{AppConfig, LoadOptions};
use cartbot_dialog::IntentDispatcher;

fn init_logging(config: &AppConfig) {
    use cartbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    spawn_idle_sweeper(app.dispatcher.clone(), app.config.ordering.session_idle_secs);

    let state = routes::AppState {
        dispatcher: app.dispatcher.clone(),
        nlu: app.nlu.clone(),
        default_language: app.config.nlu.language_code.clone(),
    };
    let router = routes::router(state, &app.config.server.cors_origins);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        text_query_enabled = app.nlu.is_some(),
        "cartbot-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal(grace)).await?;

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "cartbot-server stopped"
    );

    Ok(())
}

/// Periodically drops sessions whose conversation went quiet. The sweep
/// period is clamped so short idle windows do not turn into a busy loop.
fn spawn_idle_sweeper(dispatcher: Arc<IntentDispatcher>, idle_secs: u64) {
    let idle = chrono::Duration::seconds(idle_secs as i64);
    let period = Duration::from_secs(idle_secs.clamp(30, 300));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = dispatcher.sessions().evict_idle(idle).await;
            if evicted > 0 {
                tracing::debug!(
                    event_name = "system.sessions.evicted",
                    correlation_id = "sweeper",
                    evicted,
                    "idle sessions dropped"
                );
            }
        }
    });
}

async fn shutdown_signal(grace: Duration) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "shutdown signal received, draining connections"
    );

    // Hard stop if draining outlives the grace window.
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        tracing::warn!(
            event_name = "system.server.forced_exit",
            correlation_id = "shutdown",
            "graceful drain window elapsed, exiting"
        );
        std::process::exit(0);
    });
}
