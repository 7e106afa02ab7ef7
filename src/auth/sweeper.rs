// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Sweeper
//!
//! Background task that periodically removes expired sessions. Lookups
//! already drop expired sessions lazily; the sweeper bounds memory for
//! sessions that are never presented again.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::SessionStore;

/// Background sweeper for expired sessions.
pub struct SessionSweeper {
    sessions: Arc<SessionStore>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<SessionStore>, interval: Duration) -> Self {
        Self { sessions, interval }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Session sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session sweeper shutting down");
                    return;
                }
            }

            self.sweep_step();
        }
    }

    /// One sweep; returns the number of sessions removed.
    pub fn sweep_step(&self) -> usize {
        let removed = self.sessions.sweep_expired();
        if removed > 0 {
            info!(
                removed,
                remaining = self.sessions.len(),
                "Session sweeper: removed expired sessions"
            );
        } else {
            debug!("Session sweeper: nothing to remove");
        }
        removed
    }
}
