#![forbid(unsafe_code)]

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use subtle::ConstantTimeEq;

/// Identity-keyed, single-use code cache backing the OTP flow.
///
/// Implementations must make `put_overwrite` and `take_if_matches` atomic per
/// identity. The in-memory variant uses one lock for the whole map; an
/// external cache would use its own compare-and-delete.
pub trait ChallengeCache: Send + Sync {
    /// Replaces any previous code for `identity`.
    fn put_overwrite(&self, identity: &str, code: String, issued_at: DateTime<Utc>);

    /// Removes and returns `true` only if a live code for `identity` equals
    /// `code`. A mismatch, a missing entry or an expired entry leaves the
    /// cache untouched.
    fn take_if_matches(&self, identity: &str, code: &str, now: DateTime<Utc>, ttl: Duration)
        -> bool;

    /// Drops entries older than `ttl`; returns how many were dropped.
    fn purge_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize;
}

#[derive(Debug, Clone)]
struct ChallengeEntry {
    code: String,
    issued_at: DateTime<Utc>,
}

impl ChallengeEntry {
    fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now < self.issued_at + ttl
    }
}

#[derive(Debug, Default)]
pub struct InMemoryChallengeCache {
    entries: Mutex<HashMap<String, ChallengeEntry>>,
}

impl InMemoryChallengeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChallengeCache for InMemoryChallengeCache {
    fn put_overwrite(&self, identity: &str, code: String, issued_at: DateTime<Utc>) {
        self.entries
            .lock()
            .insert(identity.to_string(), ChallengeEntry { code, issued_at });
    }

    fn take_if_matches(
        &self,
        identity: &str,
        code: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> bool {
        let mut entries = self.entries.lock();
        let matched = entries.get(identity).is_some_and(|entry| {
            entry.is_live(now, ttl) && bool::from(entry.code.as_bytes().ct_eq(code.as_bytes()))
        });
        if matched {
            entries.remove(identity);
        }
        matched
    }

    fn purge_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now, ttl));
        before - entries.len()
    }
}
