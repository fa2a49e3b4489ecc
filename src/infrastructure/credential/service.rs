//! Credential lifecycle service
//!
//! Issues, revokes, deletes, and enumerates credentials. This is the only
//! place a raw secret ever leaves the engine, and it leaves exactly once.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::domain::credential::{
    validate_issue_params, CredentialId, CredentialRecord, CredentialRepository,
};
use crate::domain::DomainError;
use crate::infrastructure::secret::SecretGenerator;

/// How often `issue` regenerates before conceding a digest collision
const MAX_GENERATION_ATTEMPTS: usize = 3;

/// Parameters for issuing a new credential
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub owner_id: String,
    pub owner_contact: String,
    pub label: String,
    pub description: String,
    pub validity_days: i64,
    pub start_delay_days: i64,
    pub rate_limit: u32,
    pub scopes: Option<Vec<String>>,
    pub ip_allow_list: Option<Vec<String>>,
}

impl IssueRequest {
    /// Request with the standard defaults: valid a year from now, one
    /// thousand requests, default scopes.
    pub fn new(
        owner_id: impl Into<String>,
        owner_contact: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner_contact: owner_contact.into(),
            label: label.into(),
            description: String::new(),
            validity_days: 365,
            start_delay_days: 0,
            rate_limit: 1000,
            scopes: None,
            ip_allow_list: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    pub fn with_start_delay_days(mut self, days: i64) -> Self {
        self.start_delay_days = days;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = Some(scopes.into_iter().map(|s| s.into()).collect());
        self
    }

    pub fn with_ip_allow_list(
        mut self,
        addresses: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.ip_allow_list = Some(addresses.into_iter().map(|a| a.into()).collect());
        self
    }
}

/// Result of issuing a credential
#[derive(Debug)]
pub struct IssuedCredential {
    /// The persisted record (carries only the digest)
    pub record: CredentialRecord,
    /// The raw secret; shown once, never recoverable afterwards
    pub secret: String,
}

/// Credential lifecycle manager
#[derive(Debug)]
pub struct CredentialService<R>
where
    R: CredentialRepository,
{
    repository: Arc<R>,
    generator: SecretGenerator,
}

impl<R: CredentialRepository> CredentialService<R> {
    /// Create a new lifecycle service issuing live credentials
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            generator: SecretGenerator::live(),
        }
    }

    /// Create with a custom secret generator
    pub fn with_generator(mut self, generator: SecretGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Issue a new credential and return its one-time raw secret.
    ///
    /// A digest that already exists in the store triggers regeneration; the
    /// existing record is never overwritten.
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedCredential, DomainError> {
        validate_issue_params(
            &request.owner_id,
            request.validity_days,
            request.start_delay_days,
            request.rate_limit,
        )
        .map_err(|e| DomainError::validation(e.to_string()))?;

        let now = Utc::now();
        let active_from = now + Duration::days(request.start_delay_days);
        let expires_at = active_from + Duration::days(request.validity_days);

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let generated = self.generator.generate();

            if self.repository.digest_exists(&generated.digest).await? {
                warn!(attempt, "Generated digest already present, regenerating");
                continue;
            }

            let mut record = CredentialRecord::new(
                &generated.digest,
                &request.owner_id,
                &request.owner_contact,
                &request.label,
                active_from,
                expires_at,
                request.rate_limit,
            )
            .with_description(&request.description);

            if let Some(scopes) = &request.scopes {
                record = record.with_scopes(scopes.iter().cloned());
            }

            if let Some(addresses) = &request.ip_allow_list {
                record = record.with_ip_allow_list(addresses.iter().cloned());
            }

            match self.repository.create(record).await {
                Ok(created) => {
                    info!(
                        id = %created.id(),
                        owner = %created.owner_id(),
                        "Issued credential"
                    );
                    return Ok(IssuedCredential {
                        record: created,
                        secret: generated.secret,
                    });
                }
                // Lost a race against a concurrent issue landing the same
                // digest; regenerate.
                Err(DomainError::Conflict { .. }) => {
                    warn!(attempt, "Digest conflicted at create time, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::DigestCollision {
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }

    /// Get a credential by id
    pub async fn get(&self, id: &CredentialId) -> Result<Option<CredentialRecord>, DomainError> {
        self.repository.get(id).await
    }

    /// Deactivate a credential; returns whether a change was made.
    ///
    /// Idempotent: a missing or already-revoked credential reports false,
    /// never an error.
    pub async fn revoke(&self, id: &CredentialId) -> Result<bool, DomainError> {
        let Some(mut record) = self.repository.get(id).await? else {
            return Ok(false);
        };

        if !record.revoke() {
            return Ok(false);
        }

        self.repository.update(&record).await?;
        info!(id = %id, "Revoked credential");
        Ok(true)
    }

    /// Permanently remove a credential; returns whether it existed.
    ///
    /// Usage log entries are left in place — the audit trail outlives the
    /// credential.
    pub async fn delete(&self, id: &CredentialId) -> Result<bool, DomainError> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            info!(id = %id, "Deleted credential");
        }
        Ok(deleted)
    }

    /// All credentials issued to an owner, unordered
    pub async fn list_by_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<CredentialRecord>, DomainError> {
        self.repository.list_by_owner(owner_id).await
    }
}
