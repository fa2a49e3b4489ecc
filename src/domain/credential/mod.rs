//! Credential domain model

pub mod entity;
pub mod repository;
pub mod validation;

pub use entity::{default_scopes, CredentialId, CredentialRecord};
pub use repository::CredentialRepository;
pub use validation::{
    validate_issue_params, IssueParamsError, RejectionReason, ValidationOutcome,
};
