//! Credential validation
//!
//! The read path of the engine: resolves a presented raw credential and
//! applies the status and window checks. Never mutates the store, so it is
//! safe to retry and needs no locking.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::domain::credential::{
    CredentialId, CredentialRecord, CredentialRepository, RejectionReason, ValidationOutcome,
};
use crate::domain::DomainError;
use crate::infrastructure::secret::SecretGenerator;

/// Validator for presented credentials
#[derive(Debug)]
pub struct CredentialValidator<R>
where
    R: CredentialRepository,
{
    repository: Arc<R>,
    generator: SecretGenerator,
}

impl<R: CredentialRepository> CredentialValidator<R> {
    /// Create a validator over a credential repository.
    ///
    /// The generator must match the one used at issue time, since it owns
    /// the digest computation.
    pub fn new(repository: Arc<R>, generator: SecretGenerator) -> Self {
        Self {
            repository,
            generator,
        }
    }

    /// Validate a raw credential.
    ///
    /// Checks run in a fixed order: digest resolution, revocation, window
    /// start, window end. Status dominates the temporal checks, so a
    /// revoked-and-expired credential reports `Revoked`. Rejections are
    /// ordinary outcomes; only store failures produce `Err`.
    pub async fn validate(&self, raw_secret: &str) -> Result<ValidationOutcome, DomainError> {
        let digest = self.generator.digest_of(raw_secret);

        let Some(record) = self.repository.find_by_digest(&digest).await? else {
            debug!("Presented credential matched no record");
            return Ok(ValidationOutcome::Rejected(RejectionReason::NotFound));
        };

        Ok(Self::judge(record))
    }

    fn judge(record: CredentialRecord) -> ValidationOutcome {
        let now = Utc::now();

        if !record.is_active() {
            debug!(id = %record.id(), "Credential is revoked");
            return ValidationOutcome::Rejected(RejectionReason::Revoked);
        }

        if record.is_not_yet_active_at(now) {
            debug!(id = %record.id(), "Credential is not yet active");
            return ValidationOutcome::Rejected(RejectionReason::NotYetActive);
        }

        if record.is_expired_at(now) {
            debug!(id = %record.id(), "Credential is expired");
            return ValidationOutcome::Rejected(RejectionReason::Expired);
        }

        ValidationOutcome::Accepted(record)
    }

    /// Whether the credential's counter is still below its ceiling.
    ///
    /// Re-reads the record so the answer reflects the latest committed
    /// counter, not the possibly-stale record a caller got from `validate`.
    /// A missing credential is not within any limit.
    pub async fn is_within_rate_limit(&self, id: &CredentialId) -> Result<bool, DomainError> {
        let record = self.repository.get(id).await?;
        Ok(record.is_some_and(|r| r.is_within_rate_limit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;

    use crate::infrastructure::store::{
        InMemoryCredentialRepository, InMemoryStore, InMemoryUsageLogRepository,
    };
    use crate::domain::usage::{UsageLogEntry, UsageLogRepository};

    struct Fixture {
        repository: Arc<InMemoryCredentialRepository>,
        usage: InMemoryUsageLogRepository,
        validator: CredentialValidator<InMemoryCredentialRepository>,
        generator: SecretGenerator,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::open();
        let repository = Arc::new(InMemoryCredentialRepository::new(store.clone()));
        let usage = InMemoryUsageLogRepository::new(store);
        let generator = SecretGenerator::test();
        let validator =
            CredentialValidator::new(Arc::clone(&repository), generator.clone());
        Fixture {
            repository,
            usage,
            validator,
            generator,
        }
    }

    async fn seed(
        fx: &Fixture,
        start_offset_days: i64,
        end_offset_days: i64,
        rate_limit: u32,
    ) -> (String, CredentialRecord) {
        let generated = fx.generator.generate();
        let now = Utc::now();
        let record = CredentialRecord::new(
            &generated.digest,
            "u1",
            "u1@example.com",
            "Test Credential",
            now + Duration::days(start_offset_days),
            now + Duration::days(end_offset_days),
            rate_limit,
        );
        let record = fx.repository.create(record).await.unwrap();
        (generated.secret, record)
    }

    #[tokio::test]
    async fn test_accepts_live_credential() {
        let fx = fixture();
        let (secret, record) = seed(&fx, 0, 30, 100).await;

        let outcome = fx.validator.validate(&secret).await.unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(outcome.record().unwrap().id(), record.id());
    }

    #[tokio::test]
    async fn test_validate_does_not_mutate() {
        let fx = fixture();
        let (secret, record) = seed(&fx, 0, 30, 100).await;

        fx.validator.validate(&secret).await.unwrap();

        let after = fx.repository.get(record.id()).await.unwrap().unwrap();
        assert_eq!(after.request_count(), 0);
        assert!(after.last_used_at().is_none());
    }

    #[tokio::test]
    async fn test_rejects_unknown_secret() {
        let fx = fixture();

        let outcome = fx
            .validator
            .validate("nf_test_0000000000000000")
            .await
            .unwrap();

        assert_eq!(outcome.rejection(), Some(RejectionReason::NotFound));
    }

    #[tokio::test]
    async fn test_rejects_not_yet_active() {
        let fx = fixture();
        let (secret, _) = seed(&fx, 1, 31, 100).await;

        let outcome = fx.validator.validate(&secret).await.unwrap();

        assert_eq!(outcome.rejection(), Some(RejectionReason::NotYetActive));
    }

    #[tokio::test]
    async fn test_rejects_expired() {
        let fx = fixture();
        let (secret, _) = seed(&fx, -31, -1, 100).await;

        let outcome = fx.validator.validate(&secret).await.unwrap();

        assert_eq!(outcome.rejection(), Some(RejectionReason::Expired));
    }

    #[tokio::test]
    async fn test_revoked_dominates_expired() {
        let fx = fixture();
        // Window already closed AND the credential is revoked
        let (secret, mut record) = seed(&fx, -31, -1, 100).await;
        record.revoke();
        fx.repository.update(&record).await.unwrap();

        let outcome = fx.validator.validate(&secret).await.unwrap();

        assert_eq!(outcome.rejection(), Some(RejectionReason::Revoked));
    }

    #[tokio::test]
    async fn test_revoked_dominates_not_yet_active() {
        let fx = fixture();
        let (secret, mut record) = seed(&fx, 1, 31, 100).await;
        record.revoke();
        fx.repository.update(&record).await.unwrap();

        let outcome = fx.validator.validate(&secret).await.unwrap();

        assert_eq!(outcome.rejection(), Some(RejectionReason::Revoked));
    }

    #[tokio::test]
    async fn test_rate_limit_reflects_latest_counter() {
        let fx = fixture();
        let (_, record) = seed(&fx, 0, 30, 2).await;
        let id = *record.id();

        assert!(fx.validator.is_within_rate_limit(&id).await.unwrap());

        for _ in 0..2 {
            let entry = UsageLogEntry::new(
                id,
                "/api/news",
                "GET",
                200,
                10,
                "10.0.0.1",
                "test-agent/1.0",
            )
            .with_query_params(HashMap::new());
            fx.usage.append(entry).await.unwrap();
        }

        // The stale `record` still says zero requests, but the validator
        // re-reads and sees the committed counter.
        assert!(record.is_within_rate_limit());
        assert!(!fx.validator.is_within_rate_limit(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_limit_missing_credential() {
        let fx = fixture();

        let within = fx
            .validator
            .is_within_rate_limit(&CredentialId::new())
            .await
            .unwrap();

        assert!(!within);
    }
}
