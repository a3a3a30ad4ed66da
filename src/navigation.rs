//! Navigation lock: a short-lived exclusive-control token.
//!
//! While an external agent drives the viewer (guided review, remote
//! control), local keyboard and mouse navigation is suppressed. The lock
//! carries its owner's id and a TTL; grants, renewals and releases are
//! issued by external commands; this type only enforces the invariants
//! and answers ownership queries. An expired lock counts as released even
//! before anyone calls `reset`.

use std::time::{Duration, Instant};

/// Exclusive-control token with TTL expiry.
#[derive(Debug, Clone)]
pub struct NavigationLock {
    locked: bool,
    owner_id: String,
    granted_at: Option<Instant>,
    ttl: Duration,
    /// Opaque reference to the controlling client's connection
    client_ref: Option<u64>,
}

impl NavigationLock {
    pub fn new() -> Self {
        Self {
            locked: false,
            owner_id: String::new(),
            granted_at: None,
            ttl: Duration::ZERO,
            client_ref: None,
        }
    }

    /// Grant exclusive control to `owner_id` for `ttl`.
    pub fn grant(&mut self, owner_id: impl Into<String>, ttl: Duration, client_ref: Option<u64>) {
        self.locked = true;
        self.owner_id = owner_id.into();
        self.granted_at = Some(Instant::now());
        self.ttl = ttl;
        self.client_ref = client_ref;
    }

    /// Extend the current grant by restarting its TTL clock. No-op when
    /// unlocked.
    pub fn renew(&mut self, ttl: Duration) {
        if self.locked {
            self.granted_at = Some(Instant::now());
            self.ttl = ttl;
        }
    }

    /// Clear all lock state.
    pub fn reset(&mut self) {
        self.locked = false;
        self.owner_id.clear();
        self.granted_at = None;
        self.ttl = Duration::ZERO;
        self.client_ref = None;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether the grant's TTL has elapsed. An unlocked lock is expired by
    /// definition.
    pub fn is_expired(&self) -> bool {
        match self.granted_at {
            Some(granted_at) => granted_at.elapsed() >= self.ttl,
            None => true,
        }
    }

    /// Locked, unexpired and held by `owner_id`.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.locked && !self.is_expired() && self.owner_id == owner_id
    }

    /// Locked and unexpired, regardless of owner.
    pub fn is_active(&self) -> bool {
        self.locked && !self.is_expired()
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn client_ref(&self) -> Option<u64> {
        self.client_ref
    }
}

impl Default for NavigationLock {
    fn default() -> Self {
        Self::new()
    }
}
