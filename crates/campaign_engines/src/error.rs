#![forbid(unsafe_code)]

use campaign_kernel_contracts::submission::UniqueField;
use campaign_kernel_contracts::ContractViolation;
use campaign_storage::StorageError;
use thiserror::Error;

/// Failure taxonomy shared by every intake engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntakeError {
    #[error("invalid payload: {0}")]
    PayloadInvalid(String),
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("{} already registered", .field.as_str())]
    Conflict { field: UniqueField },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("Invalid or expired OTP")]
    ChallengeMismatch,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
}

impl From<ContractViolation> for IntakeError {
    fn from(value: ContractViolation) -> Self {
        Self::PayloadInvalid(value.to_string())
    }
}

impl From<StorageError> for IntakeError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::UniqueViolation { field } => Self::Conflict { field },
            StorageError::DuplicateKey { table: "admins", .. } => Self::Conflict {
                field: UniqueField::Email,
            },
            StorageError::DuplicateKey { table, key } => {
                Self::StoreUnavailable(format!("unexpected duplicate key in {table}: {key}"))
            }
            StorageError::NotFound { table, key } => Self::NotFound(format!("{table}/{key}")),
            StorageError::Unavailable(reason) => Self::StoreUnavailable(reason),
            StorageError::ContractViolation(violation) => violation.into(),
        }
    }
}
