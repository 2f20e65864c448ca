#![forbid(unsafe_code)]

pub mod access;
pub mod analytics;
pub mod credential;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod otp;
pub mod receipt;
pub mod region;
pub mod winner;

pub use error::IntakeError;
