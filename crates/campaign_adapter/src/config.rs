#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use campaign_engines::credential::{MAX_TOKEN_TTL_MINUTES, MIN_SECRET_BYTES};
use campaign_engines::otp::DEFAULT_OTP_TTL_SECONDS;
use campaign_engines::receipt::DEFAULT_PUBLIC_PREFIX;
use campaign_kernel_contracts::admin::AdminEmail;
use campaign_kernel_contracts::submission::UniquenessPolicy;

pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_STORE_PATH: &str = ".campaign/intake_journal.jsonl";
pub const DEFAULT_EMAILS_FROM: &str = "noreply@campaign.local";

#[derive(Clone, PartialEq, Eq)]
pub struct SendGridSettings {
    pub api_key: String,
    pub from_address: String,
}

impl std::fmt::Debug for SendGridSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridSettings")
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

/// Process configuration, resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    pub http_bind: SocketAddr,
    pub upload_dir: PathBuf,
    pub public_upload_prefix: String,
    pub global_admin_email: AdminEmail,
    pub token_secret: Vec<u8>,
    pub token_ttl_minutes: i64,
    pub otp_ttl_seconds: i64,
    pub uniqueness: UniquenessPolicy,
    /// `None` keeps everything in memory.
    pub store_path: Option<PathBuf>,
    pub sendgrid: Option<SendGridSettings>,
}

impl std::fmt::Debug for IntakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeConfig")
            .field("http_bind", &self.http_bind)
            .field("upload_dir", &self.upload_dir)
            .field("public_upload_prefix", &self.public_upload_prefix)
            .field("global_admin_email", &self.global_admin_email)
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("otp_ttl_seconds", &self.otp_ttl_seconds)
            .field("uniqueness", &self.uniqueness)
            .field("store_path", &self.store_path)
            .field("sendgrid", &self.sendgrid)
            .finish_non_exhaustive()
    }
}

impl IntakeConfig {
    pub fn default_from_env() -> Result<Self, String> {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    pub fn from_env_var_map<F>(mut env_getter: F) -> Result<Self, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |key: &str| {
            env_getter(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let http_bind = get("CAMPAIGN_HTTP_BIND")
            .unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string())
            .parse::<SocketAddr>()
            .map_err(|err| format!("CAMPAIGN_HTTP_BIND is not a socket address: {err}"))?;
        let upload_dir = get("CAMPAIGN_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
        let public_upload_prefix = get("CAMPAIGN_PUBLIC_UPLOAD_PREFIX")
            .unwrap_or_else(|| DEFAULT_PUBLIC_PREFIX.to_string());

        let global_admin_email = get("CAMPAIGN_GLOBAL_ADMIN_EMAIL")
            .ok_or_else(|| "CAMPAIGN_GLOBAL_ADMIN_EMAIL is required".to_string())
            .and_then(|raw| {
                AdminEmail::new(raw)
                    .map_err(|err| format!("CAMPAIGN_GLOBAL_ADMIN_EMAIL invalid: {err}"))
            })?;

        let token_secret = get("CAMPAIGN_TOKEN_SECRET")
            .ok_or_else(|| "CAMPAIGN_TOKEN_SECRET is required".to_string())?
            .into_bytes();
        if token_secret.len() < MIN_SECRET_BYTES {
            return Err(format!(
                "CAMPAIGN_TOKEN_SECRET must be at least {MIN_SECRET_BYTES} bytes"
            ));
        }

        let token_ttl_minutes = parse_i64(
            get("CAMPAIGN_TOKEN_TTL_MINUTES"),
            "CAMPAIGN_TOKEN_TTL_MINUTES",
            MAX_TOKEN_TTL_MINUTES,
        )?
        .clamp(1, MAX_TOKEN_TTL_MINUTES);
        let otp_ttl_seconds = parse_i64(
            get("CAMPAIGN_OTP_TTL_SECONDS"),
            "CAMPAIGN_OTP_TTL_SECONDS",
            DEFAULT_OTP_TTL_SECONDS,
        )?
        .max(1);

        let uniqueness = UniquenessPolicy {
            email: parse_flag(get("CAMPAIGN_ENFORCE_UNIQUE_EMAIL"), false),
            mobile: parse_flag(get("CAMPAIGN_ENFORCE_UNIQUE_MOBILE"), false),
        };

        let store_path = match get("CAMPAIGN_STORE_PATH") {
            Some(v) if is_off(&v) => None,
            Some(v) => Some(PathBuf::from(v)),
            None => Some(PathBuf::from(DEFAULT_STORE_PATH)),
        };

        let sendgrid = get("CAMPAIGN_SENDGRID_API_KEY").map(|api_key| SendGridSettings {
            api_key,
            from_address: get("CAMPAIGN_EMAILS_FROM")
                .unwrap_or_else(|| DEFAULT_EMAILS_FROM.to_string()),
        });

        Ok(Self {
            http_bind,
            upload_dir,
            public_upload_prefix,
            global_admin_email,
            token_secret,
            token_ttl_minutes,
            otp_ttl_seconds,
            uniqueness,
            store_path,
            sendgrid,
        })
    }
}

fn is_off(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(v) => !is_off(&v),
        None => default,
    }
}

fn parse_i64(raw: Option<String>, key: &str, default: i64) -> Result<i64, String> {
    match raw {
        Some(v) => v
            .parse::<i64>()
            .map_err(|_| format!("{key} must be an integer")),
        None => Ok(default),
    }
}
