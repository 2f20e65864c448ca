#![forbid(unsafe_code)]

pub mod blob;
pub mod challenge_cache;
pub mod repo;
pub mod store;

pub use store::{InsertCursor, IntakeStore, StorageError};
