// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Expected outcomes such as "not found" or "expired" never appear here;
/// those are `None`/`false` at the store and registry level. Every variant
/// maps to a fixed, non-sensitive response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// None of the trusted identity headers carried a value
    MissingIdentity,
    /// A trusted identity header was present but is not an email
    MalformedIdentity,
    /// Identity is not in the whitelist
    NotAuthorized { email: String },
    /// Route guard found no pipeline-injected context
    Unauthenticated,
    /// Route guard requires a higher tier
    InsufficientPrivilege,
    /// Session store could not create a session
    StoreUnavailable,
    /// Unexpected fault inside the pipeline
    Internal,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingIdentity => "missing_identity",
            AuthError::MalformedIdentity => "malformed_identity",
            AuthError::NotAuthorized { .. } => "not_authorized",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::InsufficientPrivilege => "insufficient_privilege",
            AuthError::StoreUnavailable => "store_unavailable",
            AuthError::Internal => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingIdentity
            | AuthError::MalformedIdentity
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::NotAuthorized { .. } | AuthError::InsufficientPrivilege => {
                StatusCode::FORBIDDEN
            }
            AuthError::StoreUnavailable | AuthError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingIdentity | AuthError::MalformedIdentity => {
                write!(f, "No authenticated user found")
            }
            AuthError::NotAuthorized { email } => {
                write!(f, "User {email} is not authorized to access this application")
            }
            AuthError::Unauthenticated => write!(f, "Authentication required"),
            AuthError::InsufficientPrivilege => {
                write!(f, "Insufficient privileges for this operation")
            }
            AuthError::StoreUnavailable | AuthError::Internal => {
                write!(f, "Internal authentication error")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
