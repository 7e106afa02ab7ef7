// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route guards for handlers behind the authentication pipeline.
//!
//! ```rust,ignore
//! async fn me(Auth(ctx): Auth) -> impl IntoResponse {
//!     // ctx is the request's AuthContext
//! }
//!
//! async fn stats(AdminOnly(ctx): AdminOnly) -> impl IntoResponse {
//!     // only admins reach here
//! }
//! ```
//!
//! Guards never authenticate on their own; they only read the context the
//! pipeline stored in the request extensions.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Extensions},
};

use super::{AuthContext, AuthError};

/// Require an authenticated request.
///
/// Rejects with `401` when no [`AuthContext`] is present, e.g. on a route
/// that was mounted outside the pipeline or declared public.
pub fn require_auth(extensions: &Extensions) -> Result<&AuthContext, AuthError> {
    extensions
        .get::<AuthContext>()
        .ok_or(AuthError::Unauthenticated)
}

/// Require an authenticated admin.
///
/// `401` without a context, `403` when the context is not an admin.
pub fn require_admin(extensions: &Extensions) -> Result<&AuthContext, AuthError> {
    let ctx = require_auth(extensions)?;
    if !ctx.is_admin() {
        tracing::warn!(email = %ctx.email, tier = %ctx.tier, "Admin route denied");
        return Err(AuthError::InsufficientPrivilege);
    }
    Ok(ctx)
}

/// Extractor for authenticated requests.
pub struct Auth(pub AuthContext);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_auth(&parts.extensions).cloned().map(Auth)
    }
}

/// Extractor that requires admin privileges.
pub struct AdminOnly(pub AuthContext);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_admin(&parts.extensions).cloned().map(AdminOnly)
    }
}

/// Optional authentication extractor.
///
/// Yields `None` instead of rejecting, for public routes that adapt their
/// output when the pipeline happened to run.
pub struct OptionalAuth(pub Option<AuthContext>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<AuthContext>().cloned()))
    }
}
