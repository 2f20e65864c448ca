#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::validate_email;
use crate::{ContractViolation, Validate};

/// Case-folded admin email; doubles as the OTP challenge identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AdminEmail(String);

impl AdminEmail {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(raw.into().trim().to_lowercase());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for AdminEmail {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_email("admin_email", &self.0)
    }
}

impl TryFrom<String> for AdminEmail {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AdminEmail> for String {
    fn from(value: AdminEmail) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Standard,
    Global,
}

impl AdminRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Global => "global",
        }
    }

    /// Accepts the wire names plus the legacy `admin` / `global_admin` spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" | "admin" => Some(Self::Standard),
            "global" | "global_admin" => Some(Self::Global),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccount {
    pub email: AdminEmail,
    pub role: AdminRole,
    pub is_active: bool,
}

impl AdminAccount {
    pub fn v1(email: AdminEmail, role: AdminRole) -> Self {
        Self {
            email,
            role,
            is_active: true,
        }
    }

    pub fn is_active_global(&self) -> bool {
        self.is_active && self.role == AdminRole::Global
    }
}
