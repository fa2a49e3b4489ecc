//! Credential lifecycle and validation services

pub mod service;
pub mod validator;

pub use service::{CredentialService, IssueRequest, IssuedCredential};
pub use validator::CredentialValidator;
