// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use edge_auth_server::{
    api::router,
    auth::sweeper::SessionSweeper,
    config::{self, AuthSettings, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    state::AppState,
};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().pretty().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let settings = match AuthSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let addr = match config::bind_address() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(settings);
    let registry = state.access.snapshot();
    for warning in registry.validate() {
        warn!(%warning, "Whitelist configuration warning");
    }
    let stats = registry.stats();
    info!(
        entries = stats.total_entries,
        domains = stats.domain_count,
        admins = stats.tier_distribution.admin,
        case_sensitive = stats.case_sensitive,
        "Authorization registry loaded"
    );

    let shutdown = CancellationToken::new();
    if let Some(interval) = state.settings.sweep_interval {
        let sweeper = SessionSweeper::new(state.sessions.clone(), interval);
        tokio::spawn(sweeper.run(shutdown.clone()));
    } else {
        info!("Session sweeper disabled");
    }

    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(%addr, "Edge auth server listening (docs at /docs)");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
    {
        error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    shutdown.cancel();
    info!("Server stopped");
    ExitCode::SUCCESS
}
