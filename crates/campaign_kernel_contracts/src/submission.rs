#![forbid(unsafe_code)]

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::common::{validate_email, validate_text, validate_token};
use crate::{ContractViolation, Validate};

pub const DEFAULT_PAGE_LIMIT: u64 = 100;
pub const MAX_PAGE_LIMIT: u64 = 1_000;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubmissionId(pub u64);

/// Lowercase hex SHA-256 of the stored receipt bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hex: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(hex.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short_prefix(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl Validate for ContentHash {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.len() != 64 {
            return Err(ContractViolation::InvalidValue {
                field: "content_hash",
                reason: "must be 64 hex characters",
            });
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(ContractViolation::InvalidValue {
                field: "content_hash",
                reason: "must be lowercase hex",
            });
        }
        Ok(())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRef {
    pub public_ref: String,
    pub content_hash: ContentHash,
}

impl Validate for ReceiptRef {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("receipt_ref.public_ref", &self.public_ref, 512)?;
        self.content_hash.validate()
    }
}

/// Identity fields as submitted by the public form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionInput {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub emirates_id: String,
    pub region: String,
}

impl SubmissionInput {
    pub fn v1(
        name: String,
        email: String,
        mobile: String,
        emirates_id: String,
        region: String,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            mobile: mobile.trim().to_string(),
            emirates_id: emirates_id.trim().to_string(),
            region: region.trim().to_string(),
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for SubmissionInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("submission_input.name", &self.name, 200)?;
        validate_email("submission_input.email", &self.email)?;
        validate_text("submission_input.mobile", &self.mobile, 32)?;
        if !self
            .mobile
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
        {
            return Err(ContractViolation::InvalidValue {
                field: "submission_input.mobile",
                reason: "must contain digits and separators only",
            });
        }
        if mobile_unique_key(&self.mobile).len() < 6 {
            return Err(ContractViolation::InvalidValue {
                field: "submission_input.mobile",
                reason: "must contain at least 6 digits",
            });
        }
        validate_text("submission_input.emirates_id", &self.emirates_id, 64)?;
        // Blank region is accepted; the canonicalizer files it under Unknown.
        if !self.region.is_empty() {
            validate_text("submission_input.region", &self.region, 120)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub emirates_id: String,
    /// Normalized region label at intake time.
    pub emirate: String,
    /// Region exactly as submitted (trimmed). Language inference reads this,
    /// not the Latin canonical label.
    #[serde(default)]
    pub region_raw: String,
    pub receipt_url: String,
    pub receipt_hash: ContentHash,
    #[serde(deserialize_with = "deserialize_submitted_at")]
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn from_input_v1(
        id: SubmissionId,
        input: SubmissionInput,
        region_label: String,
        receipt: ReceiptRef,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        receipt.validate()?;
        validate_text("submission_record.emirate", &region_label, 120)?;
        Ok(Self {
            id,
            name: input.name,
            email: input.email,
            mobile: input.mobile,
            emirates_id: input.emirates_id,
            emirate: region_label,
            region_raw: input.region,
            receipt_url: receipt.public_ref,
            receipt_hash: receipt.content_hash,
            submitted_at,
        })
    }
}

/// Per-call uniqueness toggles; populated from configuration by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniquenessPolicy {
    pub email: bool,
    pub mobile: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueField {
    Email,
    Mobile,
}

impl UniqueField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Mobile => "mobile",
        }
    }
}

pub fn email_unique_key(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn mobile_unique_key(mobile: &str) -> String {
    mobile
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Id,
    Name,
    Email,
    Mobile,
    Emirate,
    SubmittedAt,
}

impl SortField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Emirate => "emirate",
            Self::SubmittedAt => "submitted_at",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "mobile" => Some(Self::Mobile),
            "emirate" | "region" => Some(Self::Emirate),
            "submitted_at" | "created_at" => Some(Self::SubmittedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub skip: u64,
    pub limit: u64,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl ListQuery {
    /// Resolves raw query parameters. An absent `sort_by` means newest first;
    /// a `sort_by` outside the closed set means id ascending, whatever `order` says.
    pub fn from_raw(
        skip: Option<u64>,
        limit: Option<u64>,
        sort_by: Option<&str>,
        order: Option<&str>,
    ) -> Self {
        let order = order.and_then(SortOrder::parse).unwrap_or(SortOrder::Desc);
        let (sort_by, order) = match sort_by {
            None => (SortField::SubmittedAt, order),
            Some(raw) => match SortField::parse(raw) {
                Some(field) => (field, order),
                None => (SortField::Id, SortOrder::Asc),
            },
        };
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
            sort_by,
            order,
        }
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::from_raw(None, None, None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionPage {
    pub items: Vec<SubmissionRecord>,
    pub total: u64,
}

/// Parses a stored creation timestamp. Inputs without an offset are taken as UTC.
pub fn parse_submitted_at(raw: &str) -> Result<DateTime<Utc>, ContractViolation> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(ContractViolation::InvalidValue {
        field: "submission_record.submitted_at",
        reason: "must be RFC 3339 or naive ISO-8601",
    })
}

fn deserialize_submitted_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_submitted_at(&raw).map_err(serde::de::Error::custom)
}
