//! NewsFlow Gatekeeper
//!
//! Credential lifecycle and usage accounting engine for the NewsFlow API:
//! - credential issuance with irreversible hashing (the raw secret is
//!   returned exactly once and never stored),
//! - time-windowed validity checks with a side-effect-free read path,
//! - atomic request counting under concurrent access,
//! - advisory rate-limit bookkeeping and aggregate usage statistics.
//!
//! The engine talks to a durable store through the repository traits in
//! [`domain`]; the caller picks an implementation at construction time —
//! in-memory or PostgreSQL — and injects it into a [`Gatekeeper`].
//!
//! ```no_run
//! use newsflow_gatekeeper::infrastructure::credential::IssueRequest;
//! use newsflow_gatekeeper::infrastructure::usage::RequestEvent;
//! use newsflow_gatekeeper::Gatekeeper;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Gatekeeper::in_memory();
//!
//!     let issued = engine
//!         .credentials()
//!         .issue(IssueRequest::new("u1", "u1@example.com", "Reader key"))
//!         .await?;
//!     println!("save this key now: {}", issued.secret);
//!
//!     let outcome = engine.validator().validate(&issued.secret).await?;
//!     if let Some(record) = outcome.record() {
//!         if engine.validator().is_within_rate_limit(record.id()).await? {
//!             let event = RequestEvent::new("/api/news", "GET", 200, 37, "10.0.0.1", "curl/8");
//!             engine.usage().record(record.id(), event).await?;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    CredentialId, CredentialRecord, CredentialRepository, DomainError, RejectionReason,
    UsageLogEntry, UsageLogRepository, UsageStats, ValidationOutcome,
};

use std::sync::Arc;

use infrastructure::credential::{CredentialService, CredentialValidator};
use infrastructure::secret::SecretGenerator;
use infrastructure::store::{
    InMemoryCredentialRepository, InMemoryStore, InMemoryUsageLogRepository, PostgresConfig,
    PostgresCredentialRepository, PostgresStore, PostgresUsageLogRepository,
};
use infrastructure::usage::UsageService;

/// The assembled engine: lifecycle manager, validator, and accountant over
/// one injected store.
#[derive(Debug)]
pub struct Gatekeeper<C, U>
where
    C: domain::CredentialRepository,
    U: domain::UsageLogRepository,
{
    credentials: CredentialService<C>,
    validator: CredentialValidator<C>,
    usage: UsageService<U>,
}

/// Gatekeeper over the in-memory store
pub type MemoryGatekeeper = Gatekeeper<InMemoryCredentialRepository, InMemoryUsageLogRepository>;

/// Gatekeeper over the PostgreSQL store
pub type PostgresGatekeeper =
    Gatekeeper<PostgresCredentialRepository, PostgresUsageLogRepository>;

impl<C, U> Gatekeeper<C, U>
where
    C: domain::CredentialRepository,
    U: domain::UsageLogRepository,
{
    /// Assemble an engine from explicit parts.
    ///
    /// Both repositories must sit on the same store so the accountant's
    /// transaction can reach the credential records.
    pub fn from_parts(
        credential_repository: Arc<C>,
        usage_repository: Arc<U>,
        generator: SecretGenerator,
    ) -> Self {
        Self {
            credentials: CredentialService::new(Arc::clone(&credential_repository))
                .with_generator(generator.clone()),
            validator: CredentialValidator::new(credential_repository, generator),
            usage: UsageService::new(usage_repository),
        }
    }

    /// Credential lifecycle manager
    pub fn credentials(&self) -> &CredentialService<C> {
        &self.credentials
    }

    /// Credential validator
    pub fn validator(&self) -> &CredentialValidator<C> {
        &self.validator
    }

    /// Usage accountant
    pub fn usage(&self) -> &UsageService<U> {
        &self.usage
    }
}

impl MemoryGatekeeper {
    /// Engine over a fresh in-memory store, issuing live credentials
    pub fn in_memory() -> Self {
        Self::in_memory_with_generator(SecretGenerator::live())
    }

    /// Engine over a fresh in-memory store with a custom generator
    pub fn in_memory_with_generator(generator: SecretGenerator) -> Self {
        let store = InMemoryStore::open();
        let credential_repository = Arc::new(InMemoryCredentialRepository::new(store.clone()));
        let usage_repository = Arc::new(InMemoryUsageLogRepository::new(store));
        Self::from_parts(credential_repository, usage_repository, generator)
    }
}

impl PostgresGatekeeper {
    /// Engine over a pooled PostgreSQL store.
    ///
    /// Connects, ensures the schema, and wires both repositories onto the
    /// same pool.
    pub async fn connect_postgres(config: &PostgresConfig) -> anyhow::Result<Self> {
        let store = PostgresStore::connect(config).await?;
        store.ensure_schema().await?;

        tracing::info!("Connected to PostgreSQL store");

        let credential_repository = Arc::new(PostgresCredentialRepository::new(store.clone()));
        let usage_repository = Arc::new(PostgresUsageLogRepository::new(store));

        Ok(Self::from_parts(
            credential_repository,
            usage_repository,
            SecretGenerator::live(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credential::IssueRequest;
    use crate::infrastructure::usage::RequestEvent;

    fn test_engine() -> MemoryGatekeeper {
        Gatekeeper::in_memory_with_generator(SecretGenerator::test())
    }

    fn event(status_code: u16) -> RequestEvent {
        RequestEvent::new("/api/news", "GET", status_code, 25, "10.0.0.1", "test/1.0")
    }

    #[tokio::test]
    async fn test_issue_then_validate_round_trip() {
        let engine = test_engine();

        let issued = engine
            .credentials()
            .issue(IssueRequest::new("u1", "u1@example.com", "Key"))
            .await
            .unwrap();

        let outcome = engine.validator().validate(&issued.secret).await.unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(outcome.record().unwrap().id(), issued.record.id());
    }

    #[tokio::test]
    async fn test_revoked_key_rejected_even_when_also_expired() {
        let engine = test_engine();

        let issued = engine
            .credentials()
            .issue(
                IssueRequest::new("u1", "u1@example.com", "Short")
                    .with_validity_days(1),
            )
            .await
            .unwrap();

        engine.credentials().revoke(issued.record.id()).await.unwrap();

        let outcome = engine.validator().validate(&issued.secret).await.unwrap();
        assert_eq!(outcome.rejection(), Some(RejectionReason::Revoked));
    }

    #[tokio::test]
    async fn test_full_request_flow() {
        let engine = test_engine();

        // Issue a key capped at two requests
        let issued = engine
            .credentials()
            .issue(
                IssueRequest::new("u1", "u1@example.com", "Capped")
                    .with_validity_days(30)
                    .with_rate_limit(2),
            )
            .await
            .unwrap();
        let id = *issued.record.id();

        assert!(issued.record.is_active());
        assert_eq!(issued.record.request_count(), 0);

        // Two accepted requests reach the cap
        for _ in 0..2 {
            assert!(engine.validator().validate(&issued.secret).await.unwrap().is_accepted());
            assert!(engine.validator().is_within_rate_limit(&id).await.unwrap());
            engine.usage().record(&id, event(200)).await.unwrap();
        }

        assert!(!engine.validator().is_within_rate_limit(&id).await.unwrap());

        // The accountant itself never enforces the cap
        engine.usage().record(&id, event(429)).await.unwrap();

        let record = engine.credentials().get(&id).await.unwrap().unwrap();
        assert_eq!(record.request_count(), 3);

        let stats = engine.usage().stats(&id).await.unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.error_count, 1);
    }

    #[tokio::test]
    async fn test_deleted_credential_keeps_audit_trail() {
        let engine = test_engine();

        let issued = engine
            .credentials()
            .issue(IssueRequest::new("u1", "u1@example.com", "Key"))
            .await
            .unwrap();
        let id = *issued.record.id();

        engine.usage().record(&id, event(200)).await.unwrap();
        assert!(engine.credentials().delete(&id).await.unwrap());

        let stats = engine.usage().stats(&id).await.unwrap();
        assert_eq!(stats.total_requests, 1);

        // Validation of the old secret now misses
        let outcome = engine.validator().validate(&issued.secret).await.unwrap();
        assert_eq!(outcome.rejection(), Some(RejectionReason::NotFound));
    }
}
