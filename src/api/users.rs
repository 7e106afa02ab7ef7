// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Current-user and session endpoints.

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::clear_session_cookie_header;
use crate::auth::session::fingerprint;
use crate::auth::{Auth, AuthContext, AuthError};
use crate::state::AppState;

/// Response for POST /v1/session/logout
#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    /// Whether a live session was removed
    pub invalidated: bool,
}

/// Get the current authenticated user's information.
///
/// Returns the identity, tier and proxy context of the caller. The session
/// token itself is never included.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "User information", body = AuthContext),
        (status = 401, description = "No authenticated user found"),
        (status = 403, description = "User is not whitelisted"),
    )
)]
pub async fn get_current_user(Auth(ctx): Auth) -> Json<AuthContext> {
    Json(ctx)
}

/// End the current session.
///
/// The proxy identity is untouched; the next request simply starts a new
/// session.
#[utoipa::path(
    post,
    path = "/v1/session/logout",
    tag = "Users",
    responses(
        (status = 200, description = "Session ended", body = LogoutResponse),
        (status = 401, description = "No authenticated user found"),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Auth(ctx): Auth,
) -> Result<impl IntoResponse, AuthError> {
    let invalidated = state.sessions.invalidate(&ctx.session_id);
    tracing::info!(
        email = %ctx.email,
        session = %fingerprint(&ctx.session_id),
        invalidated,
        "Session logged out"
    );

    let clear = if state.settings.use_cookies {
        Some((SET_COOKIE, clear_session_cookie_header(&state.settings)?))
    } else {
        None
    };

    Ok((AppendHeaders(clear), Json(LogoutResponse { invalidated })))
}
