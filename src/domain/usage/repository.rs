//! Usage log store-adapter trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entry::UsageLogEntry;
use crate::domain::credential::CredentialId;
use crate::domain::DomainError;

/// Store adapter for the append-only usage log.
///
/// `append` is the engine's one contended write and must run inside the
/// store's native transaction primitive: the credential's `request_count`
/// increment, its `last_used_at` stamp, and the log insert commit together
/// or not at all. Implementations never retry on the engine's behalf; a
/// transaction that cannot commit surfaces as `DomainError::Transaction`.
#[async_trait]
pub trait UsageLogRepository: Send + Sync + Debug {
    /// Atomically record one request against the entry's credential.
    ///
    /// Fails with `Transaction` when the credential no longer exists, so a
    /// log entry can never outrun its counter increment.
    async fn append(&self, entry: UsageLogEntry) -> Result<UsageLogEntry, DomainError>;

    /// All entries recorded for a credential, unordered
    async fn list_for_credential(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Vec<UsageLogEntry>, DomainError>;

    /// Number of entries recorded for a credential
    async fn count_for_credential(
        &self,
        credential_id: &CredentialId,
    ) -> Result<usize, DomainError> {
        Ok(self.list_for_credential(credential_id).await?.len())
    }
}
