// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Demo endpoints: one public, one premium-gated.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::identity::has_trusted_marker;
use crate::auth::{Auth, AuthError, OptionalAuth, Tier};
use crate::state::AppState;

/// Response for GET /demo/status
#[derive(Debug, Serialize, ToSchema)]
pub struct DemoStatusResponse {
    pub service: String,
    pub version: String,
    /// Whether the request carried the proxy's trusted marker header
    pub proxied: bool,
    /// Whether an auth context was attached (false while the path is public)
    pub authenticated: bool,
    pub cookie_sessions: bool,
    pub timestamp: DateTime<Utc>,
}

/// Response for GET /v1/premium/content
#[derive(Debug, Serialize, ToSchema)]
pub struct PremiumContentResponse {
    pub email: String,
    pub tier: Tier,
    pub content: String,
}

/// Public status endpoint.
#[utoipa::path(
    get,
    path = "/demo/status",
    tag = "Demo",
    responses(
        (status = 200, description = "Service status", body = DemoStatusResponse)
    )
)]
pub async fn demo_status(
    State(state): State<AppState>,
    OptionalAuth(ctx): OptionalAuth,
    headers: HeaderMap,
) -> Json<DemoStatusResponse> {
    Json(DemoStatusResponse {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        proxied: has_trusted_marker(&headers),
        authenticated: ctx.is_some(),
        cookie_sessions: state.settings.use_cookies,
        timestamp: Utc::now(),
    })
}

/// Premium resource, available to the full and admin tiers.
#[utoipa::path(
    get,
    path = "/v1/premium/content",
    tag = "Demo",
    responses(
        (status = 200, description = "Premium content", body = PremiumContentResponse),
        (status = 401, description = "No authenticated user found"),
        (status = 403, description = "Tier does not include premium access"),
    )
)]
pub async fn premium_content(Auth(ctx): Auth) -> Result<Json<PremiumContentResponse>, AuthError> {
    if !ctx.can_access_premium {
        tracing::debug!(email = %ctx.email, tier = %ctx.tier, "Premium content denied");
        return Err(AuthError::InsufficientPrivilege);
    }

    Ok(Json(PremiumContentResponse {
        email: ctx.email,
        tier: ctx.tier,
        content: "Premium analytics are available for your account.".to_string(),
    }))
}
