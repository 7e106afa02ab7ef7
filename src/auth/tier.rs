// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access tiers for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access tier resolved for an authorized email.
///
/// ## Tier Hierarchy
///
/// - `Admin` - Administrative privileges and premium resources
/// - `Full` - Premium resources, no administration
/// - `Limited` - Basic access only (default for authorized, untiered users)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Full administrative access
    Admin,
    /// Premium access
    Full,
    /// Basic access
    Limited,
}

impl Tier {
    /// All tiers in resolution priority order (admin beats full beats limited).
    pub const PRIORITY: [Tier; 3] = [Tier::Admin, Tier::Full, Tier::Limited];

    /// Whether this tier may use premium resources.
    pub fn can_access_premium(&self) -> bool {
        matches!(self, Tier::Admin | Tier::Full)
    }

    /// Whether this tier carries administrative privileges.
    pub fn has_admin_privileges(&self) -> bool {
        matches!(self, Tier::Admin)
    }

    /// Parse tier from string (case-insensitive).
    /// Used by the tier management endpoints.
    pub fn from_str(s: &str) -> Option<Tier> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Tier::Admin),
            "full" => Some(Tier::Full),
            "limited" => Some(Tier::Limited),
            _ => None,
        }
    }
}

impl Default for Tier {
    /// Authorized users that appear in no tier list get the least privilege.
    fn default() -> Self {
        Tier::Limited
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Admin => write!(f, "admin"),
            Tier::Full => write!(f, "full"),
            Tier::Limited => write!(f, "limited"),
        }
    }
}
