// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request authentication pipeline for Axum.
//!
//! ## Flow
//!
//! 1. Public paths (exact match or public prefix) pass straight through:
//!    no header extraction, no authorization, no session access.
//! 2. The identity is extracted from the trusted proxy headers (401 if absent).
//! 3. The identity is authorized against the current registry snapshot (403).
//! 4. The session from the `session_id` cookie is reused when it belongs to
//!    the same email, with its tier refreshed. Otherwise a new session is
//!    created and the response carries a new cookie.
//! 5. An [`AuthContext`] is inserted into the request extensions and the
//!    downstream handler runs.
//!
//! Panics in steps 2-4 are caught here and answered with a generic 500.

use std::panic::{self, AssertUnwindSafe};

use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, Method,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};

use super::identity;
use super::registry::Authorization;
use super::session::fingerprint;
use super::{AuthContext, AuthError};
use crate::config::AuthSettings;
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session_id";

/// Apply the authentication pipeline to every route of `router`.
///
/// ```rust,ignore
/// let app = middleware::apply(Router::new().route("/v1/users/me", get(me)), state);
/// ```
pub fn apply(router: Router, state: AppState) -> Router {
    router.layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Authentication middleware function.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if state.settings.is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let outcome = run_guarded(|| {
        authenticate(
            &state,
            request.method(),
            request.uri().path(),
            request.headers(),
        )
    });

    let Authenticated {
        context,
        set_cookie,
    } = match outcome {
        Ok(authenticated) => authenticated,
        Err(err) => {
            match &err {
                AuthError::NotAuthorized { email } => {
                    tracing::warn!(email = %email, path = %request.uri().path(), "Access denied")
                }
                AuthError::MissingIdentity | AuthError::MalformedIdentity => {
                    tracing::debug!(
                        path = %request.uri().path(),
                        error_code = err.error_code(),
                        "No usable identity"
                    )
                }
                _ => tracing::error!(
                    path = %request.uri().path(),
                    error_code = err.error_code(),
                    "Authentication pipeline failed"
                ),
            }
            return err.into_response();
        }
    };

    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;

    // Handlers that manage the cookie themselves (logout) take precedence.
    if let Some(cookie) = set_cookie {
        if !sets_session_cookie(response.headers()) {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }
    response
}

fn sets_session_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&format!("{SESSION_COOKIE}=")))
}

/// Result of a successful pipeline run.
struct Authenticated {
    context: AuthContext,
    /// Present when a new session was created in cookie mode
    set_cookie: Option<HeaderValue>,
}

/// Extract, authorize and reconcile the session for a protected request.
fn authenticate(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
) -> Result<Authenticated, AuthError> {
    let identity = identity::extract(headers)?;
    if state.settings.audit_logging {
        identity.log_access(method, path);
    }

    let tier = match state.access.authorize(&identity.email) {
        Authorization::Granted(tier) => tier,
        Authorization::Denied => {
            return Err(AuthError::NotAuthorized {
                email: identity.email,
            })
        }
    };

    if state.settings.use_cookies {
        let resumed = session_cookie(headers)
            .and_then(|id| state.sessions.resume(id, &identity.email, tier));
        if let Some(session) = resumed {
            return Ok(Authenticated {
                context: AuthContext::from_session(&session, identity.authenticated_at),
                set_cookie: None,
            });
        }
    }

    let session = state.sessions.open(
        &identity.email,
        tier.has_admin_privileges(),
        tier,
        identity.proxy_context.clone(),
    )?;
    tracing::info!(
        email = %identity.email,
        tier = %tier,
        session = %fingerprint(&session.session_id),
        "New session established"
    );

    let set_cookie = if state.settings.use_cookies {
        Some(session_cookie_header(&session.session_id, &state.settings)?)
    } else {
        None
    };

    Ok(Authenticated {
        context: AuthContext::from_session(&session, identity.authenticated_at),
        set_cookie,
    })
}

/// Run `f`, turning a panic into `AuthError::Internal`.
fn run_guarded<T>(f: impl FnOnce() -> Result<T, AuthError>) -> Result<T, AuthError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!("Panic inside authentication pipeline");
        Err(AuthError::Internal)
    })
}

/// Session id from the request's `Cookie` header(s).
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .find(|value| !value.is_empty())
}

/// `Set-Cookie` value for a newly created session.
pub fn session_cookie_header(
    session_id: &str,
    settings: &AuthSettings,
) -> Result<HeaderValue, AuthError> {
    build_cookie(session_id, settings.session_timeout.as_secs(), settings)
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie_header(settings: &AuthSettings) -> Result<HeaderValue, AuthError> {
    build_cookie("", 0, settings)
}

fn build_cookie(
    value: &str,
    max_age: u64,
    settings: &AuthSettings,
) -> Result<HeaderValue, AuthError> {
    let secure = if settings.cookie_secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={value}; Path=/; Max-Age={max_age}; HttpOnly{secure}; SameSite=Strict"
    ))
    .map_err(|_| AuthError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        routing::get,
        Extension, Json,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::registry::WhitelistConfig;
    use crate::auth::session::ManualClock;
    use crate::auth::Tier;

    const EMAIL_HEADER: &str = "cf-access-authenticated-user-email";

    fn settings() -> AuthSettings {
        AuthSettings {
            whitelist: WhitelistConfig {
                whitelist: vec!["@acme.com".to_string(), "admin@corp.io".to_string()],
                admin_emails: vec!["admin@corp.io".to_string()],
                full_users: vec!["full@acme.com".to_string()],
                ..Default::default()
            },
            session_timeout: Duration::from_secs(60),
            ..Default::default()
        }
    }

    async fn whoami(Extension(ctx): Extension<AuthContext>) -> Json<Value> {
        Json(json!({
            "email": ctx.email,
            "tier": ctx.tier,
            "is_admin": ctx.is_admin,
            "session_id": ctx.session_id,
        }))
    }

    fn app(state: AppState) -> Router {
        let router = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/static/app.js", get(|| async { "js" }))
            .route("/protected", get(whoami));
        apply(router, state)
    }

    fn request(path: &str, email: Option<&str>, cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(path);
        if let Some(email) = email {
            builder = builder.header(EMAIL_HEADER, email);
        }
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string())
    }

    fn cookie_value(set_cookie: &str) -> String {
        set_cookie
            .split(';')
            .next()
            .unwrap()
            .trim_start_matches("session_id=")
            .to_string()
    }

    #[tokio::test]
    async fn public_path_bypasses_pipeline() {
        let state = AppState::new(settings());
        let response = app(state.clone())
            .oneshot(request("/health", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_none());
        assert_eq!(state.access.authorization_checks(), 0);
        assert!(state.sessions.is_empty());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn public_path_ignores_unlisted_identity() {
        let state = AppState::new(settings());
        let response = app(state.clone())
            .oneshot(request("/health", Some("someone@unlisted.com"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.access.authorization_checks(), 0);
    }

    #[tokio::test]
    async fn static_prefix_bypasses_pipeline() {
        let state = AppState::new(settings());
        let response = app(state.clone())
            .oneshot(request("/static/app.js", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.access.authorization_checks(), 0);
    }

    #[tokio::test]
    async fn missing_identity_returns_401() {
        let state = AppState::new(settings());
        let response = app(state.clone())
            .oneshot(request("/protected", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "No authenticated user found");
        assert_eq!(state.access.authorization_checks(), 0);
    }

    #[tokio::test]
    async fn malformed_identity_returns_401() {
        let response = app(AppState::new(settings()))
            .oneshot(request("/protected", Some("not-an-email"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "malformed_identity");
    }

    #[tokio::test]
    async fn unlisted_identity_returns_403() {
        let state = AppState::new(settings());
        let response = app(state.clone())
            .oneshot(request("/protected", Some("someone@unlisted.com"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(set_cookie(&response).is_none());
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("someone@unlisted.com"));
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn authorized_request_gets_context_and_cookie() {
        let state = AppState::new(settings());
        let response = app(state.clone())
            .oneshot(request("/protected", Some("Admin@Corp.io"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = set_cookie(&response).expect("new session cookie");
        assert!(cookie.starts_with("session_id="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=60"));

        let body = json_body(response).await;
        assert_eq!(body["email"], "admin@corp.io");
        assert_eq!(body["tier"], "admin");
        assert_eq!(body["is_admin"], true);
        assert_eq!(body["session_id"], cookie_value(&cookie));
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn cookie_session_is_reused() {
        let state = AppState::new(settings());
        let first = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), None))
            .await
            .unwrap();
        let session_id = cookie_value(&set_cookie(&first).unwrap());

        let cookie = format!("theme=dark; session_id={session_id}");
        let second = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(second.status(), StatusCode::OK);
        assert!(set_cookie(&second).is_none());
        assert_eq!(json_body(second).await["session_id"], session_id);
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn reused_session_picks_up_tier_changes() {
        let state = AppState::new(settings());
        let first = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), None))
            .await
            .unwrap();
        let session_id = cookie_value(&set_cookie(&first).unwrap());
        assert_eq!(json_body(first).await["tier"], "limited");

        state.access.assign_tier("bob@acme.com", Tier::Admin);

        let cookie = format!("session_id={session_id}");
        let second = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), Some(&cookie)))
            .await
            .unwrap();
        let body = json_body(second).await;
        assert_eq!(body["session_id"], session_id);
        assert_eq!(body["tier"], "admin");
        assert_eq!(body["is_admin"], true);
        assert_eq!(state.sessions.get(&session_id).unwrap().tier, Tier::Admin);
    }

    #[tokio::test]
    async fn session_of_another_email_is_not_reused() {
        let state = AppState::new(settings());
        let first = app(state.clone())
            .oneshot(request("/protected", Some("alice@acme.com"), None))
            .await
            .unwrap();
        let alice_session = cookie_value(&set_cookie(&first).unwrap());

        let cookie = format!("session_id={alice_session}");
        let second = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), Some(&cookie)))
            .await
            .unwrap();

        let new_cookie = set_cookie(&second).expect("bob gets his own session");
        assert_ne!(cookie_value(&new_cookie), alice_session);
        assert_eq!(json_body(second).await["email"], "bob@acme.com");
        assert_eq!(state.sessions.len(), 2);
        assert_eq!(state.sessions.get(&alice_session).unwrap().email, "alice@acme.com");
    }

    #[tokio::test]
    async fn expired_cookie_session_is_replaced() {
        let clock = Arc::new(ManualClock::new());
        let state = AppState::with_clock(settings(), clock.clone());
        let first = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), None))
            .await
            .unwrap();
        let old = cookie_value(&set_cookie(&first).unwrap());

        clock.advance_secs(61);
        let cookie = format!("session_id={old}");
        let second = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), Some(&cookie)))
            .await
            .unwrap();

        let fresh = cookie_value(&set_cookie(&second).expect("replacement cookie"));
        assert_ne!(fresh, old);
        assert!(state.sessions.get(&old).is_none());
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn unknown_cookie_creates_new_session() {
        let state = AppState::new(settings());
        let response = app(state.clone())
            .oneshot(request(
                "/protected",
                Some("bob@acme.com"),
                Some("session_id=forged"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_some());
    }

    #[tokio::test]
    async fn cookie_mode_disabled_never_sets_cookie() {
        let state = AppState::new(AuthSettings {
            use_cookies: false,
            ..settings()
        });
        for _ in 0..2 {
            let response = app(state.clone())
                .oneshot(request("/protected", Some("full@acme.com"), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(set_cookie(&response).is_none());
            assert_eq!(json_body(response).await["tier"], "full");
        }
        assert_eq!(state.sessions.len(), 2);
    }

    #[tokio::test]
    async fn insecure_cookie_omits_secure_attribute() {
        let state = AppState::new(AuthSettings {
            cookie_secure: false,
            ..settings()
        });
        let response = app(state)
            .oneshot(request("/protected", Some("bob@acme.com"), None))
            .await
            .unwrap();
        let cookie = set_cookie(&response).unwrap();
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn zero_timeout_still_serves_new_sessions() {
        let state = AppState::new(AuthSettings {
            session_timeout: Duration::ZERO,
            ..settings()
        });
        for _ in 0..20 {
            let response = app(state.clone())
                .oneshot(request("/protected", Some("bob@acme.com"), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json_body(response).await["email"], "bob@acme.com");
        }
    }

    #[tokio::test]
    async fn empty_session_cookie_does_not_hide_valid_one() {
        let state = AppState::new(settings());
        let first = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), None))
            .await
            .unwrap();
        let session_id = cookie_value(&set_cookie(&first).unwrap());

        let cookie = format!("session_id=; session_id={session_id}");
        let second = app(state.clone())
            .oneshot(request("/protected", Some("bob@acme.com"), Some(&cookie)))
            .await
            .unwrap();
        assert!(set_cookie(&second).is_none());
        assert_eq!(json_body(second).await["session_id"], session_id);
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn case_sensitive_mode_never_matches_mixed_case_entries() {
        let state = AppState::new(AuthSettings {
            whitelist: WhitelistConfig {
                whitelist: vec!["User@Example.com".to_string(), "@acme.com".to_string()],
                case_sensitive: true,
                ..Default::default()
            },
            ..Default::default()
        });

        // identities are lower-cased before authorization
        for header in ["User@Example.com", "user@example.com"] {
            let response = app(state.clone())
                .oneshot(request("/protected", Some(header), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            assert!(json_body(response).await["error"]
                .as_str()
                .unwrap()
                .contains("user@example.com"));
        }

        let response = app(state)
            .oneshot(request("/protected", Some("Bob@acme.com"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn run_guarded_converts_panics() {
        let result: Result<(), AuthError> = run_guarded(|| panic!("boom"));
        assert_eq!(result.unwrap_err(), AuthError::Internal);

        let result = run_guarded(|| Err::<(), _>(AuthError::MissingIdentity));
        assert_eq!(result.unwrap_err(), AuthError::MissingIdentity);
        assert_eq!(run_guarded(|| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_cookie(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("a=1; session_id=tok; b=2"));
        assert_eq!(session_cookie(&headers), Some("tok"));

        headers.insert(COOKIE, HeaderValue::from_static("session_id="));
        assert_eq!(session_cookie(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("session_id=; session_id=tok"));
        assert_eq!(session_cookie(&headers), Some("tok"));

        headers.insert(COOKIE, HeaderValue::from_static("xsession_id=tok"));
        assert_eq!(session_cookie(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("session_id=second"));
        assert_eq!(session_cookie(&headers), Some("second"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let header = clear_session_cookie_header(&AuthSettings::default()).unwrap();
        let value = header.to_str().unwrap();
        assert!(value.starts_with("session_id=;"));
        assert!(value.contains("Max-Age=0"));
    }
}
