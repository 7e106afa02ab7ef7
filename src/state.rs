// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::registry::{AccessControl, AuthorizationRegistry};
use crate::auth::session::{Clock, SessionStore, SystemClock};
use crate::config::AuthSettings;

#[derive(Clone, Debug)]
pub struct AppState {
    pub settings: Arc<AuthSettings>,
    pub access: Arc<AccessControl>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(settings: AuthSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: AuthSettings, clock: Arc<dyn Clock>) -> Self {
        let registry = AuthorizationRegistry::new(&settings.whitelist);
        let sessions = SessionStore::with_clock(settings.session_timeout, clock);
        Self {
            settings: Arc::new(settings),
            access: Arc::new(AccessControl::new(registry)),
            sessions: Arc::new(sessions),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AuthSettings::default())
    }
}
