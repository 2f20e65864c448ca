#![forbid(unsafe_code)]

use std::sync::Arc;

use campaign_storage::challenge_cache::ChallengeCache;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use tracing::{info, warn};

use crate::notify::CodeNotifier;

pub const OTP_MIN: u32 = 100_000;
pub const OTP_MAX: u32 = 999_999;
pub const DEFAULT_OTP_TTL_SECONDS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpConfig {
    pub ttl: Duration,
}

impl OtpConfig {
    pub fn mvp_v1() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_OTP_TTL_SECONDS),
        }
    }
}

/// A stored code waiting to be sent. Delivery may block on the network, so
/// callers holding a shared lock deliver after releasing it.
#[must_use = "an issued code reaches nobody until it is delivered"]
pub struct PendingCode {
    identity: String,
    code: String,
    notifier: Arc<dyn CodeNotifier>,
}

impl PendingCode {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// A failed delivery is logged; the code stays live either way.
    pub fn deliver(self) {
        if let Err(err) = self.notifier.deliver(&self.identity, &self.code) {
            warn!(identity = %self.identity, error = %err, "one-time code delivery failed");
        }
    }
}

impl std::fmt::Debug for PendingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCode")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Issues and verifies single-use six digit codes, one live code per identity.
#[derive(Clone)]
pub struct OtpChallengeManager {
    config: OtpConfig,
    cache: Arc<dyn ChallengeCache>,
    notifier: Arc<dyn CodeNotifier>,
}

impl std::fmt::Debug for OtpChallengeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpChallengeManager")
            .field("config", &self.config)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl OtpChallengeManager {
    pub fn new(
        config: OtpConfig,
        cache: Arc<dyn ChallengeCache>,
        notifier: Arc<dyn CodeNotifier>,
    ) -> Self {
        Self {
            config,
            cache,
            notifier,
        }
    }

    pub fn issue(&self, identity: &str, now: DateTime<Utc>) -> PendingCode {
        self.issue_with_rng(identity, now, &mut OsRng)
    }

    /// Replaces any live code for `identity`. The code is live once this
    /// returns; sending it is left to [`PendingCode::deliver`].
    pub fn issue_with_rng<G: Rng + ?Sized>(
        &self,
        identity: &str,
        now: DateTime<Utc>,
        rng: &mut G,
    ) -> PendingCode {
        let purged = self.cache.purge_expired(now, self.config.ttl);
        let code = rng.gen_range(OTP_MIN..=OTP_MAX).to_string();
        self.cache.put_overwrite(identity, code.clone(), now);
        info!(identity, purged, "one-time code issued");
        PendingCode {
            identity: identity.to_string(),
            code,
            notifier: Arc::clone(&self.notifier),
        }
    }

    /// Constant-time comparison; consumes the code only on success.
    pub fn verify(&self, identity: &str, code: &str, now: DateTime<Utc>) -> bool {
        let ok = self
            .cache
            .take_if_matches(identity, code.trim(), now, self.config.ttl);
        if !ok {
            info!(identity, "one-time code rejected");
        }
        ok
    }
}
