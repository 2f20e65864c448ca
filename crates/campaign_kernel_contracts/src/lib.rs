#![forbid(unsafe_code)]

pub mod admin;
pub mod analytics;
pub mod common;
pub mod region;
pub mod submission;

pub use common::{ContractViolation, Validate};
