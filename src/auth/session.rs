// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process session store with rolling expiration.
//!
//! Sessions are volatile and can always be rebuilt from the trusted header,
//! so nothing here is persisted. A session is valid while
//! `now - last_accessed <= timeout`; an expired entry is removed on lookup.
//!
//! The map is split into mutex-guarded shards keyed by a hash of the session
//! id, so requests for different sessions rarely contend on the same lock.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use super::{AuthError, Tier};

/// Random bytes per session token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Number of independently locked shards.
const SHARD_COUNT: usize = 16;

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Server-side session record.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub email: String,
    pub tier: Tier,
    pub is_admin: bool,
    pub can_access_premium: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub proxy_context: BTreeMap<String, String>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        match (now - self.last_accessed).to_std() {
            Ok(idle) => idle > timeout,
            // last_accessed is in the future (clock adjustment): treat as fresh
            Err(_) => false,
        }
    }

    fn apply_tier(&mut self, tier: Tier) {
        self.tier = tier;
        self.is_admin = tier.has_admin_privileges();
        self.can_access_premium = tier.can_access_premium();
    }
}

/// Concurrent session store.
#[derive(Debug)]
pub struct SessionStore {
    shards: Box<[Mutex<HashMap<String, Session>>]>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    rng: SystemRandom,
}

impl SessionStore {
    /// Create a store using the system clock.
    pub fn new(timeout: Duration) -> Self {
        Self::with_clock(timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| Mutex::new(HashMap::new()))
                .collect(),
            timeout,
            clock,
            rng: SystemRandom::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a session and return its id.
    ///
    /// Only fails if the system random source is unavailable.
    pub fn create(
        &self,
        email: &str,
        is_admin: bool,
        tier: Tier,
        proxy_context: BTreeMap<String, String>,
    ) -> Result<String, AuthError> {
        self.open(email, is_admin, tier, proxy_context)
            .map(|session| session.session_id)
    }

    /// Create a session and return the stored record.
    ///
    /// The record is returned as inserted, without a second lookup, so it is
    /// usable even if it would already count as expired.
    pub fn open(
        &self,
        email: &str,
        is_admin: bool,
        tier: Tier,
        proxy_context: BTreeMap<String, String>,
    ) -> Result<Session, AuthError> {
        let session_id = self.generate_token()?;
        let now = self.clock.now();
        let session = Session {
            session_id: session_id.clone(),
            email: email.to_string(),
            tier,
            is_admin,
            can_access_premium: tier.can_access_premium(),
            created_at: now,
            last_accessed: now,
            proxy_context,
        };

        self.shard(&session_id)
            .insert(session_id.clone(), session.clone());
        tracing::debug!(
            session = %fingerprint(&session_id),
            email = %email,
            tier = %tier,
            "Session created"
        );
        Ok(session)
    }

    /// Look up a session, refreshing `last_accessed` when valid.
    ///
    /// Unknown, empty or expired ids yield `None`; expired entries are removed.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.touch(session_id, |_| true, |_| {})
    }

    /// Like `get`, but also overwrites the tier-derived fields.
    pub fn refresh_tier(&self, session_id: &str, tier: Tier) -> Option<Session> {
        self.touch(session_id, |_| true, |session| session.apply_tier(tier))
    }

    /// Reuse a session for `email`, refreshing its tier.
    ///
    /// A session owned by a different email is left untouched and `None` is
    /// returned, as for unknown or expired ids.
    pub fn resume(&self, session_id: &str, email: &str, tier: Tier) -> Option<Session> {
        self.touch(
            session_id,
            |session| session.email == email,
            |session| session.apply_tier(tier),
        )
    }

    /// Remove a session. Returns whether it existed.
    pub fn invalidate(&self, session_id: &str) -> bool {
        if session_id.is_empty() {
            return false;
        }
        let removed = self.shard(session_id).remove(session_id).is_some();
        if removed {
            tracing::debug!(session = %fingerprint(session_id), "Session invalidated");
        }
        removed
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut map = lock(shard);
            let before = map.len();
            map.retain(|_, session| !session.is_expired(now, self.timeout));
            removed += before - map.len();
        }
        removed
    }

    /// Number of stored sessions, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn touch(
        &self,
        session_id: &str,
        accept: impl FnOnce(&Session) -> bool,
        update: impl FnOnce(&mut Session),
    ) -> Option<Session> {
        if session_id.is_empty() {
            return None;
        }
        let now = self.clock.now();
        let mut map = self.shard(session_id);

        let existing = map.get(session_id)?;
        if existing.is_expired(now, self.timeout) {
            map.remove(session_id);
            tracing::debug!(session = %fingerprint(session_id), "Session expired");
            return None;
        }
        if !accept(existing) {
            return None;
        }

        let session = map.get_mut(session_id)?;
        session.last_accessed = now;
        update(session);
        Some(session.clone())
    }

    fn shard(&self, session_id: &str) -> MutexGuard<'_, HashMap<String, Session>> {
        let mut hasher = DefaultHasher::new();
        session_id.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        lock(&self.shards[idx])
    }

    fn generate_token(&self) -> Result<String, AuthError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng.fill(&mut bytes).map_err(|_| {
            tracing::error!("System random source unavailable for session token");
            AuthError::StoreUnavailable
        })?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}

/// Entries are never left half-updated, so a poisoned shard is still usable.
fn lock(shard: &Mutex<HashMap<String, Session>>) -> MutexGuard<'_, HashMap<String, Session>> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Short, non-reversible label for a session id, safe for logs.
pub fn fingerprint(session_id: &str) -> String {
    let digest = Sha256::digest(session_id.as_bytes());
    format!("{digest:x}").chars().take(12).collect()
}

#[cfg(test)]
pub(crate) use test_clock::ManualClock;

#[cfg(test)]
mod test_clock {
    use std::sync::Mutex;

    use chrono::{DateTime, TimeDelta, Utc};

    use super::Clock;

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub(crate) struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self(Mutex::new(Utc::now()))
        }

        pub(crate) fn advance_secs(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now += TimeDelta::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }
}
