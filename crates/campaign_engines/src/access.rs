#![forbid(unsafe_code)]

use campaign_kernel_contracts::admin::{AdminAccount, AdminEmail, AdminRole};
use campaign_storage::repo::AdminAccountRepo;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::credential::{AccessGrant, CredentialSigner};
use crate::error::IntakeError;
use crate::otp::{OtpChallengeManager, PendingCode};

pub const REQUEST_CODE_ACK: &str = "If an account with this email exists, an OTP has been sent.";

/// Answer to a code request. `pending` is set only for an active admin and
/// must be delivered by the caller; `ack` is identical either way.
#[derive(Debug)]
pub struct CodeRequest {
    pub ack: &'static str,
    pub pending: Option<PendingCode>,
}

/// Admin account lifecycle plus the OTP login flow.
#[derive(Debug, Clone)]
pub struct AdminAccessRuntime {
    otp: OtpChallengeManager,
    signer: CredentialSigner,
}

impl AdminAccessRuntime {
    pub fn new(otp: OtpChallengeManager, signer: CredentialSigner) -> Self {
        Self { otp, signer }
    }

    /// Returns `true` when the account was created by this call.
    pub fn bootstrap_global_admin<R: AdminAccountRepo>(
        &self,
        repo: &mut R,
        email: &str,
    ) -> Result<bool, IntakeError> {
        let email = AdminEmail::new(email)?;
        if repo.admin_row(&email).is_some() {
            return Ok(false);
        }
        repo.insert_admin_row(AdminAccount::v1(email.clone(), AdminRole::Global))?;
        info!(admin = email.as_str(), "global admin bootstrapped");
        Ok(true)
    }

    pub fn create_admin<R: AdminAccountRepo>(
        &self,
        repo: &mut R,
        actor: &AdminAccount,
        email: &str,
        role: AdminRole,
    ) -> Result<AdminAccount, IntakeError> {
        if !actor.is_active_global() {
            warn!(actor = actor.email.as_str(), "non-global admin attempted admin creation");
            return Err(IntakeError::Forbidden("global admin role required"));
        }
        let account = AdminAccount::v1(AdminEmail::new(email)?, role);
        repo.insert_admin_row(account.clone())?;
        info!(
            admin = account.email.as_str(),
            role = account.role.as_str(),
            created_by = actor.email.as_str(),
            "admin created"
        );
        Ok(account)
    }

    /// Same acknowledgement whether or not the address belongs to an admin.
    pub fn request_code<R: AdminAccountRepo>(
        &self,
        repo: &R,
        email: &str,
        now: DateTime<Utc>,
    ) -> CodeRequest {
        let pending = match active_admin(repo, email) {
            Some(account) => Some(self.otp.issue(account.email.as_str(), now)),
            None => {
                info!("code requested for unknown or inactive admin");
                None
            }
        };
        CodeRequest {
            ack: REQUEST_CODE_ACK,
            pending,
        }
    }

    pub fn verify_code<R: AdminAccountRepo>(
        &self,
        repo: &R,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, IntakeError> {
        let account = active_admin(repo, email).ok_or(IntakeError::ChallengeMismatch)?;
        if !self.otp.verify(account.email.as_str(), code, now) {
            return Err(IntakeError::ChallengeMismatch);
        }
        let grant = self.signer.mint(account, now)?;
        info!(admin = account.email.as_str(), "admin signed in");
        Ok(grant)
    }

    /// Resolves a bearer token to a still-active account.
    pub fn authenticate<R: AdminAccountRepo>(
        &self,
        repo: &R,
        bearer: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminAccount, IntakeError> {
        let claims = self.signer.verify(bearer, now)?;
        active_admin(repo, &claims.sub)
            .cloned()
            .ok_or(IntakeError::Unauthorized("account no longer active"))
    }
}

fn active_admin<'r, R: AdminAccountRepo>(repo: &'r R, email: &str) -> Option<&'r AdminAccount> {
    let email = AdminEmail::new(email).ok()?;
    repo.admin_row(&email).filter(|account| account.is_active)
}
