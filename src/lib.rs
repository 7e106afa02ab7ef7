// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge Auth Server - Authorization and sessions behind an identity-aware proxy
//!
//! Users are authenticated by Cloudflare Access before reaching this service.
//! This crate authorizes the forwarded identity against a whitelist, resolves
//! an access tier and keeps short-lived server-side sessions.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Identity extraction, authorization registry, sessions, guards
//! - `config` - Environment-based settings
//! - `state` - Shared application state

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
