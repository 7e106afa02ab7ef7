// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-scoped authorization context.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::session::Session;
use super::Tier;

/// Authorization facts for one request.
///
/// Built by the request pipeline from a reused or freshly created session and
/// stored in the request extensions. Route guards and handlers read it; it is
/// dropped with the request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthContext {
    /// Normalized email of the proxy-authenticated user
    pub email: String,

    /// Tier resolved on this request
    pub tier: Tier,

    pub is_admin: bool,

    pub can_access_premium: bool,

    /// Session token (never serialized)
    #[serde(skip)]
    pub session_id: String,

    /// When the trusted header was extracted for this request
    pub authenticated_at: DateTime<Utc>,

    /// Audit-only proxy headers captured when the session was created
    pub proxy_context: BTreeMap<String, String>,
}

impl AuthContext {
    /// Build the context for a request served by `session`.
    pub fn from_session(session: &Session, authenticated_at: DateTime<Utc>) -> Self {
        Self {
            email: session.email.clone(),
            tier: session.tier,
            is_admin: session.is_admin,
            can_access_premium: session.can_access_premium,
            session_id: session.session_id.clone(),
            authenticated_at,
            proxy_context: session.proxy_context.clone(),
        }
    }

    /// Check if this user has administrative privileges.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }
}
