// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Whitelist authorization and tier resolution.
//!
//! ## Matching
//!
//! Whitelist and tier entries are either individual addresses
//! (`user@example.com`) or domain wildcards (`@example.com`). A domain is the
//! substring starting at the first `@`, so `@sub.example.com` and
//! `@example.com` are distinct patterns and neither matches the other.
//!
//! ## Snapshots
//!
//! `AuthorizationRegistry` is immutable once built. Tier changes go through
//! `AccessControl`, which builds a new registry and swaps the shared `Arc`.
//! In-flight requests keep the snapshot they started with.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AuthError, Tier};

/// Public free-mail domains that should never be whitelisted as wildcards.
const PUBLIC_EMAIL_DOMAINS: [&str; 12] = [
    "@gmail.com",
    "@googlemail.com",
    "@yahoo.com",
    "@hotmail.com",
    "@outlook.com",
    "@live.com",
    "@msn.com",
    "@aol.com",
    "@icloud.com",
    "@protonmail.com",
    "@gmx.com",
    "@mail.com",
];

/// Raw whitelist configuration as supplied at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistConfig {
    pub whitelist: Vec<String>,
    pub admin_emails: Vec<String>,
    pub full_users: Vec<String>,
    pub limited_users: Vec<String>,
    pub case_sensitive: bool,
}

/// Outcome of an authorization lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted(Tier),
    Denied,
}

/// A set of exact addresses plus domain wildcards.
#[derive(Debug, Clone, Default)]
struct EmailSet {
    individuals: BTreeSet<String>,
    domains: BTreeSet<String>,
}

impl EmailSet {
    fn from_entries<'a>(entries: impl IntoIterator<Item = &'a String>, case_sensitive: bool) -> Self {
        let mut set = Self::default();
        for entry in entries {
            set.insert(normalize(entry, case_sensitive));
        }
        set
    }

    fn insert(&mut self, entry: String) {
        if entry.is_empty() {
            return;
        }
        if entry.starts_with('@') {
            self.domains.insert(entry);
        } else {
            self.individuals.insert(entry);
        }
    }

    fn remove(&mut self, entry: &str) -> bool {
        self.individuals.remove(entry) | self.domains.remove(entry)
    }

    fn matches(&self, email: &str) -> bool {
        if self.individuals.contains(email) {
            return true;
        }
        domain_of(email)
            .map(|domain| self.domains.contains(domain))
            .unwrap_or(false)
    }

    fn entries(&self) -> impl Iterator<Item = &String> {
        self.individuals.iter().chain(self.domains.iter())
    }

    fn len(&self) -> usize {
        self.individuals.len() + self.domains.len()
    }

    fn is_empty(&self) -> bool {
        self.individuals.is_empty() && self.domains.is_empty()
    }
}

/// Entry counts per tier list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TierDistribution {
    pub admin: usize,
    pub full: usize,
    pub limited: usize,
}

/// Diagnostic summary of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RegistryStats {
    pub individual_count: usize,
    pub domain_count: usize,
    pub total_entries: usize,
    pub tier_distribution: TierDistribution,
    pub case_sensitive: bool,
}

/// Configuration problems found by `AuthorizationRegistry::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistWarning {
    EmptyWhitelist,
    TierMemberNotWhitelisted { tier: Tier, entry: String },
    MultipleTiers { entry: String, tiers: Vec<Tier> },
    PublicDomainWildcard { domain: String },
}

impl std::fmt::Display for WhitelistWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WhitelistWarning::EmptyWhitelist => {
                write!(f, "whitelist is empty; every request will be rejected")
            }
            WhitelistWarning::TierMemberNotWhitelisted { tier, entry } => {
                write!(f, "{tier} tier entry {entry} is not covered by the whitelist")
            }
            WhitelistWarning::MultipleTiers { entry, tiers } => {
                let names: Vec<String> = tiers.iter().map(Tier::to_string).collect();
                write!(f, "{entry} is assigned to multiple tiers: {}", names.join(", "))
            }
            WhitelistWarning::PublicDomainWildcard { domain } => {
                write!(f, "public email domain {domain} is whitelisted as a wildcard")
            }
        }
    }
}

/// Immutable whitelist and tier lists.
#[derive(Debug, Clone)]
pub struct AuthorizationRegistry {
    whitelist: EmailSet,
    admin: EmailSet,
    full: EmailSet,
    limited: EmailSet,
    case_sensitive: bool,
}

impl AuthorizationRegistry {
    /// Build a registry from startup configuration.
    pub fn new(config: &WhitelistConfig) -> Self {
        let cs = config.case_sensitive;
        Self {
            whitelist: EmailSet::from_entries(&config.whitelist, cs),
            admin: EmailSet::from_entries(&config.admin_emails, cs),
            full: EmailSet::from_entries(&config.full_users, cs),
            limited: EmailSet::from_entries(&config.limited_users, cs),
            case_sensitive: cs,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// True iff the email or its domain wildcard is whitelisted.
    pub fn is_authorized(&self, email: &str) -> bool {
        self.whitelist.matches(&normalize(email, self.case_sensitive))
    }

    /// Resolve the tier for an email in fixed priority order.
    pub fn authorize(&self, email: &str) -> Authorization {
        let email = normalize(email, self.case_sensitive);
        if !self.whitelist.matches(&email) {
            return Authorization::Denied;
        }

        let tier = Tier::PRIORITY
            .into_iter()
            .find(|tier| self.tier_set(*tier).matches(&email))
            .unwrap_or_default();
        Authorization::Granted(tier)
    }

    /// Resolve the tier, failing with `NotAuthorized` for non-whitelisted emails.
    pub fn get_tier(&self, email: &str) -> Result<Tier, AuthError> {
        match self.authorize(email) {
            Authorization::Granted(tier) => Ok(tier),
            Authorization::Denied => Err(AuthError::NotAuthorized {
                email: normalize(email, self.case_sensitive),
            }),
        }
    }

    pub fn can_access_premium(&self, email: &str) -> bool {
        self.get_tier(email)
            .map(|tier| tier.can_access_premium())
            .unwrap_or(false)
    }

    pub fn has_admin_privileges(&self, email: &str) -> bool {
        self.get_tier(email)
            .map(|tier| tier.has_admin_privileges())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            individual_count: self.whitelist.individuals.len(),
            domain_count: self.whitelist.domains.len(),
            total_entries: self.whitelist.len(),
            tier_distribution: TierDistribution {
                admin: self.admin.len(),
                full: self.full.len(),
                limited: self.limited.len(),
            },
            case_sensitive: self.case_sensitive,
        }
    }

    /// Report configuration problems. Never affects authorization decisions.
    pub fn validate(&self) -> Vec<WhitelistWarning> {
        let mut warnings = Vec::new();

        if self.whitelist.is_empty() {
            warnings.push(WhitelistWarning::EmptyWhitelist);
        }

        for tier in Tier::PRIORITY {
            let set = self.tier_set(tier);
            for entry in &set.individuals {
                if !self.whitelist.matches(entry) {
                    warnings.push(WhitelistWarning::TierMemberNotWhitelisted {
                        tier,
                        entry: entry.clone(),
                    });
                }
            }
            for domain in &set.domains {
                if !self.whitelist.domains.contains(domain) {
                    warnings.push(WhitelistWarning::TierMemberNotWhitelisted {
                        tier,
                        entry: domain.clone(),
                    });
                }
            }
        }

        let mut seen = BTreeSet::new();
        for entry in Tier::PRIORITY
            .into_iter()
            .flat_map(|tier| self.tier_set(tier).entries())
        {
            if !seen.insert(entry) {
                continue;
            }
            let tiers: Vec<Tier> = Tier::PRIORITY
                .into_iter()
                .filter(|tier| {
                    let set = self.tier_set(*tier);
                    set.individuals.contains(entry) || set.domains.contains(entry)
                })
                .collect();
            if tiers.len() > 1 {
                warnings.push(WhitelistWarning::MultipleTiers {
                    entry: entry.clone(),
                    tiers,
                });
            }
        }

        for domain in &self.whitelist.domains {
            if PUBLIC_EMAIL_DOMAINS.contains(&domain.to_lowercase().as_str()) {
                warnings.push(WhitelistWarning::PublicDomainWildcard {
                    domain: domain.clone(),
                });
            }
        }

        warnings
    }

    /// New registry with `entries` moved to `tier`, or removed from every
    /// tier list when `tier` is `None`.
    fn with_assignments<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a str, Option<Tier>)>,
    ) -> Self {
        let mut next = self.clone();
        for (raw, tier) in entries {
            let entry = normalize(raw, self.case_sensitive);
            for t in Tier::PRIORITY {
                next.tier_set_mut(t).remove(&entry);
            }
            if let Some(tier) = tier {
                next.tier_set_mut(tier).insert(entry);
            }
        }
        next
    }

    fn tier_set(&self, tier: Tier) -> &EmailSet {
        match tier {
            Tier::Admin => &self.admin,
            Tier::Full => &self.full,
            Tier::Limited => &self.limited,
        }
    }

    fn tier_set_mut(&mut self, tier: Tier) -> &mut EmailSet {
        match tier {
            Tier::Admin => &mut self.admin,
            Tier::Full => &mut self.full,
            Tier::Limited => &mut self.limited,
        }
    }
}

/// Shared handle to the current registry snapshot.
///
/// Tier commands produce a new snapshot and swap it in; readers clone the
/// `Arc` and never observe a half-applied change.
#[derive(Debug)]
pub struct AccessControl {
    current: RwLock<Arc<AuthorizationRegistry>>,
    checks: AtomicU64,
}

impl AccessControl {
    pub fn new(registry: AuthorizationRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
            checks: AtomicU64::new(0),
        }
    }

    /// Current registry snapshot.
    pub fn snapshot(&self) -> Arc<AuthorizationRegistry> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Authorize against the current snapshot, counting the lookup.
    pub fn authorize(&self, email: &str) -> Authorization {
        self.checks.fetch_add(1, Ordering::Relaxed);
        self.snapshot().authorize(email)
    }

    /// Number of authorization lookups performed through this handle.
    pub fn authorization_checks(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }

    /// Move an address or domain wildcard to `tier`.
    pub fn assign_tier(&self, email: &str, tier: Tier) {
        self.apply([(email, Some(tier))]);
        tracing::info!(entry = %email, tier = %tier, "Tier assigned");
    }

    /// Remove an address or domain wildcard from every tier list.
    pub fn remove_tier(&self, email: &str) {
        self.apply([(email, None)]);
        tracing::info!(entry = %email, "Tier assignment removed");
    }

    /// Apply several assignments as one snapshot swap.
    pub fn bulk_assign(&self, assignments: &[(String, Tier)]) {
        self.apply(
            assignments
                .iter()
                .map(|(email, tier)| (email.as_str(), Some(*tier))),
        );
        tracing::info!(count = assignments.len(), "Bulk tier assignment applied");
    }

    fn apply<'a>(&self, entries: impl IntoIterator<Item = (&'a str, Option<Tier>)>) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let next = current.with_assignments(entries);
        *current = Arc::new(next);
    }
}

/// Trim, and lower-case unless matching is case-sensitive.
fn normalize(value: &str, case_sensitive: bool) -> String {
    let trimmed = value.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// `@domain` part of an email, starting at the first `@`.
fn domain_of(email: &str) -> Option<&str> {
    email.find('@').map(|idx| &email[idx..])
}
