// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity extraction from proxy-forwarded headers.
//!
//! ## Trust Model
//!
//! The reverse proxy (Cloudflare Access) authenticates the user before the
//! request reaches this service and forwards the verified email in a header.
//! This module does no cryptographic verification of its own: it only asserts
//! that one of the trusted headers is present and email-shaped.
//!
//! `has_trusted_marker` is a separate hardening check. It is NOT part of
//! `extract` and callers must invoke it explicitly if they want it.

use std::collections::BTreeMap;

use axum::http::{HeaderMap, Method};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AuthError;

/// Trusted identity headers, first non-empty value wins.
pub const IDENTITY_HEADERS: [&str; 3] = [
    "cf-access-authenticated-user-email",
    "x-cf-access-authenticated-user-email",
    "cf-authenticated-user-email",
];

/// Proxy headers retained for audit. Never used for authorization.
pub const PROXY_CONTEXT_HEADERS: [&str; 7] = [
    "cf-ray",
    "cf-ipcountry",
    "cf-connecting-ip",
    "user-agent",
    "host",
    "x-forwarded-for",
    "referer",
];

/// Marker header the proxy adds to every request it forwards.
pub const TRUSTED_MARKER_HEADER: &str = "cf-ray";

/// Trust mechanism recorded on every identity.
pub const IDENTITY_SOURCE: &str = "cloudflare_access";

/// Normalized identity taken from the trusted headers.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    /// Lower-cased, trimmed, always contains `@`
    pub email: String,
    pub authenticated_at: DateTime<Utc>,
    pub source: &'static str,
    /// Selected forwarded headers, keyed by lower-case header name
    pub proxy_context: BTreeMap<String, String>,
}

impl Identity {
    /// Build an identity from a raw header value.
    ///
    /// Fails with `MissingIdentity` for an empty value and `MalformedIdentity`
    /// when the value has no `@`.
    pub fn new(
        raw_email: &str,
        proxy_context: BTreeMap<String, String>,
    ) -> Result<Self, AuthError> {
        let email = raw_email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::MissingIdentity);
        }
        if !email.contains('@') {
            return Err(AuthError::MalformedIdentity);
        }

        Ok(Self {
            email,
            authenticated_at: Utc::now(),
            source: IDENTITY_SOURCE,
            proxy_context,
        })
    }

    /// Ray id assigned by the proxy, if present.
    pub fn ray_id(&self) -> Option<&str> {
        self.proxy_context.get("cf-ray").map(String::as_str)
    }

    /// Emit an audit entry for this identity. Purely observational.
    pub fn log_access(&self, method: &Method, path: &str) {
        tracing::info!(
            target: "audit",
            email = %self.email,
            method = %method,
            path = %path,
            source = self.source,
            ray_id = self.ray_id().unwrap_or("-"),
            country = self.proxy_context.get("cf-ipcountry").map(String::as_str).unwrap_or("-"),
            connecting_ip = self.proxy_context.get("cf-connecting-ip").map(String::as_str).unwrap_or("-"),
            "Proxy-authenticated request"
        );
    }
}

/// Extract the identity from the trusted headers.
pub fn extract(headers: &HeaderMap) -> Result<Identity, AuthError> {
    let raw = IDENTITY_HEADERS
        .iter()
        .filter_map(|name| header_str(headers, name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .ok_or(AuthError::MissingIdentity)?;

    Identity::new(raw, proxy_context(headers))
}

/// Collect the audit-only proxy headers that are present.
pub fn proxy_context(headers: &HeaderMap) -> BTreeMap<String, String> {
    PROXY_CONTEXT_HEADERS
        .iter()
        .filter_map(|name| {
            header_str(headers, name).map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// Check that the proxy's marker header is present and non-empty.
///
/// Optional extra confidence that the request transited the trusted proxy.
pub fn has_trusted_marker(headers: &HeaderMap) -> bool {
    header_str(headers, TRUSTED_MARKER_HEADER)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn extracts_and_normalizes_canonical_header() {
        let identity = extract(&headers(&[(
            "cf-access-authenticated-user-email",
            "  User@EXAMPLE.com ",
        )]))
        .unwrap();
        assert_eq!(identity.email, "user@example.com");
        assert_eq!(identity.source, IDENTITY_SOURCE);
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert(
            axum::http::HeaderName::from_bytes(b"CF-Access-Authenticated-User-Email").unwrap(),
            HeaderValue::from_static("a@b.com"),
        );
        assert_eq!(extract(&map).unwrap().email, "a@b.com");
    }

    #[test]
    fn falls_through_empty_variants_in_order() {
        let identity = extract(&headers(&[
            ("cf-access-authenticated-user-email", "   "),
            ("x-cf-access-authenticated-user-email", ""),
            ("cf-authenticated-user-email", "alt@example.com"),
        ]))
        .unwrap();
        assert_eq!(identity.email, "alt@example.com");
    }

    #[test]
    fn first_non_empty_variant_wins() {
        let identity = extract(&headers(&[
            ("x-cf-access-authenticated-user-email", "second@example.com"),
            ("cf-authenticated-user-email", "third@example.com"),
        ]))
        .unwrap();
        assert_eq!(identity.email, "second@example.com");
    }

    #[test]
    fn missing_headers_fail() {
        assert_eq!(
            extract(&HeaderMap::new()).unwrap_err(),
            AuthError::MissingIdentity
        );
        assert_eq!(
            extract(&headers(&[("cf-access-authenticated-user-email", " ")])).unwrap_err(),
            AuthError::MissingIdentity
        );
    }

    #[test]
    fn value_without_at_is_malformed() {
        assert_eq!(
            extract(&headers(&[("cf-access-authenticated-user-email", "not-an-email")]))
                .unwrap_err(),
            AuthError::MalformedIdentity
        );
    }

    #[test]
    fn captures_proxy_context_for_audit() {
        let identity = extract(&headers(&[
            ("cf-access-authenticated-user-email", "a@b.com"),
            ("cf-ray", "8a1b2c3d4e-LHR"),
            ("cf-ipcountry", "GB"),
            ("cf-connecting-ip", "203.0.113.7"),
            ("user-agent", "curl/8.0"),
            ("x-unrelated", "ignored"),
        ]))
        .unwrap();
        assert_eq!(identity.ray_id(), Some("8a1b2c3d4e-LHR"));
        assert_eq!(identity.proxy_context.get("cf-ipcountry").unwrap(), "GB");
        assert_eq!(identity.proxy_context.len(), 4);
        assert!(!identity.proxy_context.contains_key("x-unrelated"));
    }

    #[test]
    fn identity_new_rejects_empty_and_at_less_values() {
        assert!(Identity::new("", BTreeMap::new()).is_err());
        assert!(Identity::new("nobody", BTreeMap::new()).is_err());
        assert!(Identity::new("x@y", BTreeMap::new()).is_ok());
    }

    #[test]
    fn trusted_marker_is_independent_of_extraction() {
        let with_marker = headers(&[("cf-ray", "abc")]);
        assert!(has_trusted_marker(&with_marker));
        assert!(extract(&with_marker).is_err());

        let without_marker = headers(&[("cf-access-authenticated-user-email", "a@b.com")]);
        assert!(!has_trusted_marker(&without_marker));
        assert!(extract(&without_marker).is_ok());

        assert!(!has_trusted_marker(&headers(&[("cf-ray", "  ")])));
    }
}
