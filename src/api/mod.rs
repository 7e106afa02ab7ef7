// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        middleware,
        registry::{RegistryStats, TierDistribution},
        AuthContext, Tier,
    },
    state::AppState,
};

pub mod admin;
pub mod demo;
pub mod health;
pub mod users;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .route("/session/logout", post(users::logout))
        .route("/premium/content", get(demo::premium_content))
        .route("/admin/stats", get(admin::get_stats))
        .route("/admin/whitelist/warnings", get(admin::get_warnings))
        .route(
            "/admin/tiers/{email}",
            put(admin::assign_tier).delete(admin::remove_tier),
        )
        .route("/admin/tiers/bulk", post(admin::bulk_assign))
        .route("/admin/sessions/sweep", post(admin::sweep_sessions));

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/demo/status", get(demo::demo_status))
        .nest("/v1", v1_routes)
        .with_state(state.clone())
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));

    with_service_layers(middleware::apply(app, state))
}

/// Request ids, access logs and handler panic recovery around the app.
fn with_service_layers(app: Router) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    app.layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        demo::demo_status,
        demo::premium_content,
        users::get_current_user,
        users::logout,
        admin::get_stats,
        admin::get_warnings,
        admin::assign_tier,
        admin::remove_tier,
        admin::bulk_assign,
        admin::sweep_sessions
    ),
    components(
        schemas(
            AuthContext,
            Tier,
            RegistryStats,
            TierDistribution,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            demo::DemoStatusResponse,
            demo::PremiumContentResponse,
            users::LogoutResponse,
            admin::AdminStatsResponse,
            admin::WarningsResponse,
            admin::AssignTierRequest,
            admin::TierAssignment,
            admin::BulkAssignRequest,
            admin::TierResponse,
            admin::BulkAssignResponse,
            admin::SweepResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Demo", description = "Public and premium demo resources"),
        (name = "Users", description = "Current user and session"),
        (name = "Admin", description = "Access management (admin tier)")
    )
)]
struct ApiDoc;
