// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Edge-authenticated authorization for the server. Users are authenticated
//! upstream by an identity-aware proxy (Cloudflare Access) which forwards the
//! verified email in a trusted header. This module decides what that user may
//! do here.
//!
//! ## Auth Flow
//!
//! 1. The proxy authenticates the user and forwards
//!    `Cf-Access-Authenticated-User-Email`
//! 2. The server:
//!    - Extracts and normalizes the email ([`identity`])
//!    - Checks it against the whitelist and resolves a tier ([`registry`])
//!    - Reuses or creates a server-side session ([`session`])
//!    - Attaches an [`AuthContext`] to the request ([`middleware`])
//! 3. Handlers declare their requirements with [`Auth`] or [`AdminOnly`]
//!
//! ## Security
//!
//! - All non-public endpoints require an authorized identity
//! - Public paths never touch identity, whitelist or sessions
//! - Session tokens are 256-bit random values and are never logged in clear
//! - Session cookies are `HttpOnly` and `SameSite=Strict`

pub mod context;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod middleware;
pub mod registry;
pub mod session;
pub mod sweeper;
pub mod tier;

pub use context::AuthContext;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use tier::Tier;
