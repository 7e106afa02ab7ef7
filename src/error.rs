// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Handler errors that are not authentication decisions.
//!
//! Identity, whitelist and tier failures are `AuthError`s and carry an
//! `error_code`. Everything else a handler rejects (an unknown tier name, a
//! tier command for something that is not an address or `@domain`) is an
//! [`ApiError`] with the same `{"error": ...}` body and no code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Status plus a short, caller-safe message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ApiErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 for request input the admin endpoints cannot act on.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.status, message = %self.message, "Request rejected");
        (
            self.status,
            Json(ApiErrorBody {
                error: &self.message,
            }),
        )
            .into_response()
    }
}
