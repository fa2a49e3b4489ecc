//! Domain model for the credential engine

pub mod credential;
pub mod error;
pub mod usage;

pub use credential::{
    CredentialId, CredentialRecord, CredentialRepository, RejectionReason, ValidationOutcome,
};
pub use error::DomainError;
pub use usage::{UsageLogEntry, UsageLogId, UsageLogRepository, UsageStats};
