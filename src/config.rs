// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into an
//! [`AuthSettings`] value that is handed to [`crate::state::AppState`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_WHITELIST` | Addresses and `@domain` wildcards, comma-separated | empty |
//! | `AUTH_ADMIN_EMAILS` | Admin tier entries | empty |
//! | `AUTH_FULL_USERS` | Full tier entries | empty |
//! | `AUTH_LIMITED_USERS` | Limited tier entries | empty |
//! | `AUTH_CASE_SENSITIVE` | Case-sensitive email matching | `false` |
//! | `SESSION_TIMEOUT_SECS` | Rolling session timeout, must be positive | `3600` |
//! | `SESSION_USE_COOKIES` | Issue and honour the session cookie | `true` |
//! | `SESSION_COOKIE_SECURE` | Set the `Secure` cookie attribute | `true` |
//! | `SESSION_SWEEP_INTERVAL_SECS` | Expired-session sweep period (`0` disables) | `300` |
//! | `AUTH_PUBLIC_PATHS` | Exact paths that bypass authentication | see [`DEFAULT_PUBLIC_PATHS`] |
//! | `AUTH_PUBLIC_PREFIXES` | Path prefixes that bypass authentication | `/static/,/docs/` |
//! | `AUTH_AUDIT_LOG` | Emit an audit log entry per authenticated request | `true` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::auth::registry::WhitelistConfig;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const WHITELIST_ENV: &str = "AUTH_WHITELIST";
pub const ADMIN_EMAILS_ENV: &str = "AUTH_ADMIN_EMAILS";
pub const FULL_USERS_ENV: &str = "AUTH_FULL_USERS";
pub const LIMITED_USERS_ENV: &str = "AUTH_LIMITED_USERS";
pub const CASE_SENSITIVE_ENV: &str = "AUTH_CASE_SENSITIVE";
pub const SESSION_TIMEOUT_ENV: &str = "SESSION_TIMEOUT_SECS";
pub const USE_COOKIES_ENV: &str = "SESSION_USE_COOKIES";
pub const COOKIE_SECURE_ENV: &str = "SESSION_COOKIE_SECURE";
pub const SWEEP_INTERVAL_ENV: &str = "SESSION_SWEEP_INTERVAL_SECS";
pub const PUBLIC_PATHS_ENV: &str = "AUTH_PUBLIC_PATHS";
pub const PUBLIC_PREFIXES_ENV: &str = "AUTH_PUBLIC_PREFIXES";
pub const AUDIT_LOG_ENV: &str = "AUTH_AUDIT_LOG";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Default rolling session timeout (1 hour).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default period of the background session sweep (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Health checks, API docs and the public demo endpoint.
pub const DEFAULT_PUBLIC_PATHS: [&str; 6] = [
    "/health",
    "/health/live",
    "/health/ready",
    "/docs",
    "/api-doc/openapi.json",
    "/demo/status",
];

/// Static assets and Swagger UI resources.
pub const DEFAULT_PUBLIC_PREFIXES: [&str; 2] = ["/static/", "/docs/"];

/// Startup configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} is not a boolean")]
    InvalidBool { key: &'static str, value: String },
    #[error("invalid value for {key}: {value:?} is not a valid number of seconds")]
    InvalidNumber { key: &'static str, value: String },
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),
}

/// Settings for the authorization pipeline and session store.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub whitelist: WhitelistConfig,
    pub session_timeout: Duration,
    pub use_cookies: bool,
    pub cookie_secure: bool,
    /// `None` disables the background sweeper
    pub sweep_interval: Option<Duration>,
    pub public_paths: HashSet<String>,
    pub public_prefixes: Vec<String>,
    pub audit_logging: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            whitelist: WhitelistConfig::default(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            use_cookies: true,
            cookie_secure: true,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
            public_prefixes: DEFAULT_PUBLIC_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            audit_logging: true,
        }
    }
}

impl AuthSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let whitelist = WhitelistConfig {
            whitelist: parse_list(lookup(WHITELIST_ENV)),
            admin_emails: parse_list(lookup(ADMIN_EMAILS_ENV)),
            full_users: parse_list(lookup(FULL_USERS_ENV)),
            limited_users: parse_list(lookup(LIMITED_USERS_ENV)),
            case_sensitive: parse_bool(CASE_SENSITIVE_ENV, lookup(CASE_SENSITIVE_ENV), false)?,
        };

        let session_timeout = match parse_secs(SESSION_TIMEOUT_ENV, lookup(SESSION_TIMEOUT_ENV))? {
            Some(timeout) if timeout.is_zero() => {
                return Err(ConfigError::InvalidNumber {
                    key: SESSION_TIMEOUT_ENV,
                    value: "0".to_string(),
                })
            }
            Some(timeout) => timeout,
            None => defaults.session_timeout,
        };

        let sweep_interval = match parse_secs(SWEEP_INTERVAL_ENV, lookup(SWEEP_INTERVAL_ENV))? {
            Some(interval) if interval.is_zero() => None,
            Some(interval) => Some(interval),
            None => defaults.sweep_interval,
        };

        let public_paths = match lookup(PUBLIC_PATHS_ENV) {
            Some(raw) => parse_list(Some(raw)).into_iter().collect(),
            None => defaults.public_paths,
        };

        let public_prefixes = match lookup(PUBLIC_PREFIXES_ENV) {
            Some(raw) => parse_list(Some(raw)),
            None => defaults.public_prefixes,
        };

        Ok(Self {
            whitelist,
            session_timeout,
            use_cookies: parse_bool(USE_COOKIES_ENV, lookup(USE_COOKIES_ENV), true)?,
            cookie_secure: parse_bool(COOKIE_SECURE_ENV, lookup(COOKIE_SECURE_ENV), true)?,
            sweep_interval,
            public_paths,
            public_prefixes,
            audit_logging: parse_bool(AUDIT_LOG_ENV, lookup(AUDIT_LOG_ENV), true)?,
        })
    }

    /// Whether `path` bypasses the authentication pipeline entirely.
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.contains(path)
            || self
                .public_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Bind address from `HOST` / `PORT`.
pub fn bind_address() -> Result<std::net::SocketAddr, ConfigError> {
    let host = std::env::var(HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var(PORT_ENV).unwrap_or_else(|_| "8080".to_string());
    let raw = format!("{host}:{port}");
    raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
}

fn parse_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key, value: raw }),
    }
}

fn parse_secs(key: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidNumber {
                key,
                value: value.to_string(),
            }),
    }
}
