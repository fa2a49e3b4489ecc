//! Credential store-adapter trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{CredentialId, CredentialRecord};
use crate::domain::DomainError;

/// Store adapter for credential records.
///
/// Implementations sit on a durable key-value store and own the single
/// explicit (de)serialization mapping at that boundary. Ordering of listed
/// results is not part of the contract.
#[async_trait]
pub trait CredentialRepository: Send + Sync + Debug {
    /// Point lookup by id
    async fn get(&self, id: &CredentialId) -> Result<Option<CredentialRecord>, DomainError>;

    /// Resolve the unique record carrying a secret digest
    async fn find_by_digest(&self, digest: &str)
        -> Result<Option<CredentialRecord>, DomainError>;

    /// Persist a new record; digests are unique across all records
    async fn create(&self, record: CredentialRecord) -> Result<CredentialRecord, DomainError>;

    /// Replace an existing record
    async fn update(&self, record: &CredentialRecord) -> Result<CredentialRecord, DomainError>;

    /// Remove a record; returns whether it existed
    async fn delete(&self, id: &CredentialId) -> Result<bool, DomainError>;

    /// All records issued to an owner, unordered
    async fn list_by_owner(&self, owner_id: &str)
        -> Result<Vec<CredentialRecord>, DomainError>;

    /// Whether any record already carries this digest
    async fn digest_exists(&self, digest: &str) -> Result<bool, DomainError> {
        Ok(self.find_by_digest(digest).await?.is_some())
    }
}
