// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for access management.
//!
//! These endpoints require the admin tier and provide:
//! - Registry and session statistics
//! - Whitelist configuration warnings
//! - Tier management commands (each swaps in a new registry snapshot)
//! - On-demand session sweeping

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{registry::RegistryStats, AdminOnly, Tier},
    error::ApiError,
    state::AppState,
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// System statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStatsResponse {
    /// Whitelist and tier list summary.
    pub registry: RegistryStats,
    /// Sessions currently held in memory.
    pub active_sessions: usize,
    /// Authorization lookups performed since startup.
    pub authorization_checks: u64,
    /// Rolling session timeout.
    pub session_timeout_secs: u64,
    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Whitelist configuration warnings.
#[derive(Debug, Serialize, ToSchema)]
pub struct WarningsResponse {
    pub warnings: Vec<String>,
    pub count: usize,
}

/// Body for PUT /v1/admin/tiers/{email}
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTierRequest {
    /// "admin", "full" or "limited" (case-insensitive)
    pub tier: String,
}

/// One entry of a bulk assignment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TierAssignment {
    /// Address or `@domain` wildcard.
    pub email: String,
    pub tier: String,
}

/// Body for POST /v1/admin/tiers/bulk
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAssignRequest {
    pub assignments: Vec<TierAssignment>,
}

/// Result of a single tier command.
#[derive(Debug, Serialize, ToSchema)]
pub struct TierResponse {
    pub email: String,
    /// Whether the entry is covered by the whitelist.
    pub whitelisted: bool,
    /// Tier the entry now resolves to, if whitelisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_tier: Option<Tier>,
}

/// Result of a bulk tier command.
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAssignResponse {
    pub applied: usize,
}

/// Result of a manual sweep.
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    pub removed: usize,
    pub remaining: usize,
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_tier(value: &str) -> Result<Tier, ApiError> {
    Tier::from_str(value).ok_or_else(|| ApiError::bad_request(format!("unknown tier: {value}")))
}

fn validate_entry(entry: &str) -> Result<(), ApiError> {
    let trimmed = entry.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(ApiError::bad_request(format!(
            "invalid email or @domain entry: {entry:?}"
        )));
    }
    Ok(())
}

fn tier_response(state: &AppState, email: &str) -> TierResponse {
    let snapshot = state.access.snapshot();
    let effective_tier = snapshot.get_tier(email).ok();
    TierResponse {
        email: email.to_string(),
        whitelisted: effective_tier.is_some(),
        effective_tier,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Get registry and session statistics. Admin only.
#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "System statistics", body = AdminStatsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn get_stats(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Json<AdminStatsResponse> {
    Json(AdminStatsResponse {
        registry: state.access.snapshot().stats(),
        active_sessions: state.sessions.len(),
        authorization_checks: state.access.authorization_checks(),
        session_timeout_secs: state.sessions.timeout().as_secs(),
        timestamp: Utc::now(),
    })
}

/// List whitelist configuration warnings. Admin only.
#[utoipa::path(
    get,
    path = "/v1/admin/whitelist/warnings",
    tag = "Admin",
    responses(
        (status = 200, description = "Configuration warnings", body = WarningsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn get_warnings(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Json<WarningsResponse> {
    let warnings: Vec<String> = state
        .access
        .snapshot()
        .validate()
        .iter()
        .map(ToString::to_string)
        .collect();
    Json(WarningsResponse {
        count: warnings.len(),
        warnings,
    })
}

/// Assign a tier to an address or domain wildcard. Admin only.
///
/// The whitelist itself is not changed; assigning a tier to an entry the
/// whitelist does not cover has no effect until it is whitelisted.
#[utoipa::path(
    put,
    path = "/v1/admin/tiers/{email}",
    tag = "Admin",
    params(("email" = String, Path, description = "Address or @domain wildcard")),
    request_body = AssignTierRequest,
    responses(
        (status = 200, description = "Tier assigned", body = TierResponse),
        (status = 400, description = "Invalid entry or tier"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn assign_tier(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(request): Json<AssignTierRequest>,
) -> Result<Json<TierResponse>, ApiError> {
    validate_entry(&email)?;
    let tier = parse_tier(&request.tier)?;

    state.access.assign_tier(&email, tier);
    tracing::info!(target: "audit", admin = %admin.email, entry = %email, tier = %tier, "Tier assigned by admin");

    Ok(Json(tier_response(&state, &email)))
}

/// Remove an address or domain wildcard from every tier list. Admin only.
#[utoipa::path(
    delete,
    path = "/v1/admin/tiers/{email}",
    tag = "Admin",
    params(("email" = String, Path, description = "Address or @domain wildcard")),
    responses(
        (status = 200, description = "Tier removed", body = TierResponse),
        (status = 400, description = "Invalid entry"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn remove_tier(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<TierResponse>, ApiError> {
    validate_entry(&email)?;

    state.access.remove_tier(&email);
    tracing::info!(target: "audit", admin = %admin.email, entry = %email, "Tier removed by admin");

    Ok(Json(tier_response(&state, &email)))
}

/// Apply several tier assignments at once. Admin only.
///
/// Either every assignment is applied or none is.
#[utoipa::path(
    post,
    path = "/v1/admin/tiers/bulk",
    tag = "Admin",
    request_body = BulkAssignRequest,
    responses(
        (status = 200, description = "Assignments applied", body = BulkAssignResponse),
        (status = 400, description = "Invalid entry or tier"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn bulk_assign(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<BulkAssignRequest>,
) -> Result<Json<BulkAssignResponse>, ApiError> {
    let assignments = request
        .assignments
        .into_iter()
        .map(|assignment| {
            validate_entry(&assignment.email)?;
            Ok((assignment.email, parse_tier(&assignment.tier)?))
        })
        .collect::<Result<Vec<(String, Tier)>, ApiError>>()?;

    state.access.bulk_assign(&assignments);
    tracing::info!(target: "audit", admin = %admin.email, count = assignments.len(), "Bulk tier assignment by admin");

    Ok(Json(BulkAssignResponse {
        applied: assignments.len(),
    }))
}

/// Remove expired sessions now. Admin only.
#[utoipa::path(
    post,
    path = "/v1/admin/sessions/sweep",
    tag = "Admin",
    responses(
        (status = 200, description = "Sweep finished", body = SweepResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn sweep_sessions(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Json<SweepResponse> {
    let removed = state.sessions.sweep_expired();
    Json(SweepResponse {
        removed,
        remaining: state.sessions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tier_is_case_insensitive() {
        assert_eq!(parse_tier("Admin").unwrap(), Tier::Admin);
        assert_eq!(parse_tier(" full ").unwrap(), Tier::Full);
        let err = parse_tier("gold").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("gold"));
    }

    #[test]
    fn validate_entry_requires_at_sign() {
        assert!(validate_entry("a@acme.com").is_ok());
        assert!(validate_entry("@acme.com").is_ok());
        assert!(validate_entry("acme.com").is_err());
        assert!(validate_entry("  ").is_err());
    }
}
