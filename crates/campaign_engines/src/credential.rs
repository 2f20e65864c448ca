#![forbid(unsafe_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use base64::Engine;
use campaign_kernel_contracts::admin::{AdminAccount, AdminRole};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::IntakeError;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_SECRET_BYTES: usize = 32;
pub const MAX_TOKEN_TTL_MINUTES: i64 = 480;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    pub sub: String,
    pub role: AdminRole,
    /// Unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
    #[serde(rename = "access_token")]
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Mints and checks `<claims>.<mac>` bearer tokens, both parts base64url.
#[derive(Clone)]
pub struct CredentialSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialSigner {
    /// `ttl_minutes` is clamped to `1..=MAX_TOKEN_TTL_MINUTES`.
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Result<Self, IntakeError> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(IntakeError::PayloadInvalid(format!(
                "token secret must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }
        Ok(Self {
            secret: secret.to_vec(),
            ttl: Duration::minutes(ttl_minutes.clamp(1, MAX_TOKEN_TTL_MINUTES)),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn mint(&self, account: &AdminAccount, now: DateTime<Utc>) -> Result<AccessGrant, IntakeError> {
        let expires_at = now + self.ttl;
        let claims = CredentialClaims {
            sub: account.email.as_str().to_string(),
            role: account.role,
            exp: expires_at.timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|err| IntakeError::StoreUnavailable(format!("claims encode failed: {err}")))?;
        let body = BASE64_URL.encode(payload);
        let tag = BASE64_URL.encode(self.mac_over(body.as_bytes())?);
        Ok(AccessGrant {
            token: format!("{body}.{tag}"),
            token_type: "bearer",
            expires_at,
        })
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<CredentialClaims, IntakeError> {
        let (body, tag) = token
            .trim()
            .split_once('.')
            .ok_or(IntakeError::Unauthorized("malformed token"))?;
        let tag = BASE64_URL
            .decode(tag)
            .map_err(|_| IntakeError::Unauthorized("malformed token"))?;

        let mut mac = self.keyed_mac()?;
        mac.update(body.as_bytes());
        mac.verify_slice(&tag)
            .map_err(|_| IntakeError::Unauthorized("bad token signature"))?;

        let payload = BASE64_URL
            .decode(body)
            .map_err(|_| IntakeError::Unauthorized("malformed token"))?;
        let claims: CredentialClaims = serde_json::from_slice(&payload)
            .map_err(|_| IntakeError::Unauthorized("malformed token"))?;
        if now.timestamp() >= claims.exp {
            return Err(IntakeError::Unauthorized("token expired"));
        }
        Ok(claims)
    }

    fn keyed_mac(&self) -> Result<HmacSha256, IntakeError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| IntakeError::StoreUnavailable("hmac key rejected".to_string()))
    }

    fn mac_over(&self, bytes: &[u8]) -> Result<Vec<u8>, IntakeError> {
        let mut mac = self.keyed_mac()?;
        mac.update(bytes);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
