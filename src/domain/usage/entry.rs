//! Usage log entry and aggregate statistics

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::credential::CredentialId;

/// Usage log entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageLogId(Uuid);

impl UsageLogId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UsageLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UsageLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only audit record for one request that reached the accountant.
///
/// Immutable once written; survives deletion of its credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogEntry {
    id: UsageLogId,
    credential_id: CredentialId,
    endpoint: String,
    method: String,
    status_code: u16,
    response_time_ms: u64,
    timestamp: DateTime<Utc>,
    source_address: String,
    client_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_params: Option<HashMap<String, String>>,
}

impl UsageLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credential_id: CredentialId,
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
        response_time_ms: u64,
        source_address: impl Into<String>,
        client_agent: impl Into<String>,
    ) -> Self {
        Self {
            id: UsageLogId::new(),
            credential_id,
            endpoint: endpoint.into(),
            method: method.into(),
            status_code,
            response_time_ms,
            timestamp: Utc::now(),
            source_address: source_address.into(),
            client_agent: client_agent.into(),
            query_params: None,
        }
    }

    /// Attach the request's query parameters
    pub fn with_query_params(mut self, params: HashMap<String, String>) -> Self {
        self.query_params = Some(params);
        self
    }

    pub fn id(&self) -> &UsageLogId {
        &self.id
    }

    pub fn credential_id(&self) -> &CredentialId {
        &self.credential_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn client_agent(&self) -> &str {
        &self.client_agent
    }

    pub fn query_params(&self) -> Option<&HashMap<String, String>> {
        self.query_params.as_ref()
    }

    /// Whether the downstream answered with a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Aggregate statistics over a credential's usage log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
    pub success_rate_percent: f64,
    pub error_count: u64,
}

impl UsageStats {
    /// All-zero statistics, the answer for an empty log
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold a set of log entries into aggregate statistics.
    ///
    /// Averages and rates are rounded to two decimals.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a UsageLogEntry>) -> Self {
        let mut total: u64 = 0;
        let mut success: u64 = 0;
        let mut time_sum: u64 = 0;

        for entry in entries {
            total += 1;
            time_sum += entry.response_time_ms();
            if entry.is_success() {
                success += 1;
            }
        }

        if total == 0 {
            return Self::empty();
        }

        Self {
            total_requests: total,
            avg_response_time_ms: round2(time_sum as f64 / total as f64),
            success_rate_percent: round2(success as f64 / total as f64 * 100.0),
            error_count: total - success,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status_code: u16, response_time_ms: u64) -> UsageLogEntry {
        UsageLogEntry::new(
            CredentialId::new(),
            "/api/news",
            "GET",
            status_code,
            response_time_ms,
            "10.0.0.1",
            "test-agent/1.0",
        )
    }

    #[test]
    fn test_is_success_window() {
        assert!(entry(200, 10).is_success());
        assert!(entry(201, 10).is_success());
        assert!(entry(299, 10).is_success());
        assert!(!entry(199, 10).is_success());
        assert!(!entry(300, 10).is_success());
        assert!(!entry(404, 10).is_success());
        assert!(!entry(500, 10).is_success());
    }

    #[test]
    fn test_stats_on_empty_log() {
        let stats = UsageStats::from_entries([]);

        assert_eq!(stats, UsageStats::empty());
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.avg_response_time_ms, 0.0);
        assert_eq!(stats.success_rate_percent, 0.0);
        assert_eq!(stats.error_count, 0);
    }

    #[test]
    fn test_stats_mixed_statuses() {
        let entries = vec![entry(200, 100), entry(404, 200), entry(201, 300), entry(500, 400)];

        let stats = UsageStats::from_entries(&entries);

        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.error_count, 2);
        assert_eq!(stats.success_rate_percent, 50.0);
        assert_eq!(stats.avg_response_time_ms, 250.0);
    }

    #[test]
    fn test_stats_rounding() {
        let entries = vec![entry(200, 100), entry(200, 100), entry(500, 101)];

        let stats = UsageStats::from_entries(&entries);

        // 301 / 3 = 100.333..., 2/3 = 66.666...%
        assert_eq!(stats.avg_response_time_ms, 100.33);
        assert_eq!(stats.success_rate_percent, 66.67);
    }

    #[test]
    fn test_entry_camel_case_storage_naming() {
        let value = serde_json::to_value(entry(200, 5)).unwrap();

        assert!(value.get("credentialId").is_some());
        assert!(value.get("statusCode").is_some());
        assert!(value.get("responseTimeMs").is_some());
        assert!(value.get("sourceAddress").is_some());
        assert!(value.get("clientAgent").is_some());
        // Absent optional map is omitted entirely
        assert!(value.get("queryParams").is_none());
    }
}
