//! Usage accounting service
//!
//! Records every request that reaches it, accepted or rejected downstream,
//! and computes aggregate statistics. Recording is deliberately never gated
//! on the rate limit; enforcement is the caller's policy, applied between
//! validation and acceptance.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::credential::CredentialId;
use crate::domain::usage::{UsageLogEntry, UsageLogRepository, UsageStats};
use crate::domain::DomainError;

/// One observed request, as reported by the caller
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
    pub response_time_ms: u64,
    pub source_address: String,
    pub client_agent: String,
    pub query_params: Option<HashMap<String, String>>,
}

impl RequestEvent {
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
        response_time_ms: u64,
        source_address: impl Into<String>,
        client_agent: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            status_code,
            response_time_ms,
            source_address: source_address.into(),
            client_agent: client_agent.into(),
            query_params: None,
        }
    }

    pub fn with_query_params(mut self, params: HashMap<String, String>) -> Self {
        self.query_params = Some(params);
        self
    }
}

/// Usage accountant
#[derive(Debug)]
pub struct UsageService<R>
where
    R: UsageLogRepository,
{
    repository: Arc<R>,
}

impl<R: UsageLogRepository> UsageService<R> {
    /// Create a new accountant over a usage log repository
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Record one request against a credential.
    ///
    /// Runs as a single store transaction: the credential's counter moves
    /// to `request_count + 1`, `last_used_at` takes the entry's timestamp,
    /// and the log entry lands — together or not at all.
    pub async fn record(
        &self,
        credential_id: &CredentialId,
        event: RequestEvent,
    ) -> Result<UsageLogEntry, DomainError> {
        let mut entry = UsageLogEntry::new(
            *credential_id,
            event.endpoint,
            event.method,
            event.status_code,
            event.response_time_ms,
            event.source_address,
            event.client_agent,
        );

        if let Some(params) = event.query_params {
            entry = entry.with_query_params(params);
        }

        let entry = self.repository.append(entry).await?;

        debug!(
            credential_id = %credential_id,
            endpoint = %entry.endpoint(),
            status = entry.status_code(),
            "Recorded usage"
        );

        Ok(entry)
    }

    /// Aggregate statistics over a credential's usage log.
    ///
    /// An empty log yields the all-zero statistics rather than an error.
    pub async fn stats(&self, credential_id: &CredentialId) -> Result<UsageStats, DomainError> {
        let entries = self.repository.list_for_credential(credential_id).await?;
        Ok(UsageStats::from_entries(&entries))
    }
}
