//! Credential entity and related types

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credential identifier
///
/// Generated once at issue time and never reused, even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(Uuid);

impl CredentialId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing identifier (store boundary only)
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Endpoints every credential may call unless the issuer narrows them.
pub fn default_scopes() -> HashSet<String> {
    ["/api/news", "/api/news/search"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Issued-credential entity
///
/// The raw secret is never part of this record; only its one-way digest is
/// persisted. `request_count` and `last_used_at` are owned by the usage
/// accountant and move only inside its store transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Unique identifier, immutable after creation
    id: CredentialId,
    /// One-way digest of the raw credential
    secret_digest: String,
    /// Principal the credential was issued to
    owner_id: String,
    /// Contact address for the owner
    owner_contact: String,
    /// Display name for the credential
    label: String,
    /// Description of the credential's purpose
    description: String,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Start of the validity window
    active_from: DateTime<Utc>,
    /// End of the validity window
    expires_at: DateTime<Utc>,
    /// False once revoked; never flips back to true
    is_active: bool,
    /// Accepted-request counter, monotonically non-decreasing
    request_count: u64,
    /// Advisory ceiling compared against `request_count`
    rate_limit: u32,
    /// Permitted endpoint identifiers
    scopes: HashSet<String>,
    /// Permitted source addresses (absent = unrestricted)
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_allow_list: Option<HashSet<String>>,
    /// Last time a usage was recorded against the credential
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// Create a new credential record
    ///
    /// Callers are expected to have validated the issue parameters first;
    /// `active_from <= expires_at` must already hold.
    pub fn new(
        secret_digest: impl Into<String>,
        owner_id: impl Into<String>,
        owner_contact: impl Into<String>,
        label: impl Into<String>,
        active_from: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        rate_limit: u32,
    ) -> Self {
        Self {
            id: CredentialId::new(),
            secret_digest: secret_digest.into(),
            owner_id: owner_id.into(),
            owner_contact: owner_contact.into(),
            label: label.into(),
            description: String::new(),
            created_at: Utc::now(),
            active_from,
            expires_at,
            is_active: true,
            request_count: 0,
            rate_limit,
            scopes: default_scopes(),
            ip_allow_list: None,
            last_used_at: None,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the default scopes
    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Restrict accepted source addresses
    pub fn with_ip_allow_list(
        mut self,
        addresses: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.ip_allow_list = Some(addresses.into_iter().map(|a| a.into()).collect());
        self
    }

    // Getters

    pub fn id(&self) -> &CredentialId {
        &self.id
    }

    pub fn secret_digest(&self) -> &str {
        &self.secret_digest
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn owner_contact(&self) -> &str {
        &self.owner_contact
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn active_from(&self) -> DateTime<Utc> {
        self.active_from
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn scopes(&self) -> &HashSet<String> {
        &self.scopes
    }

    pub fn ip_allow_list(&self) -> Option<&HashSet<String>> {
        self.ip_allow_list.as_ref()
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    // Status checks

    /// Whether the validity window has not opened yet
    pub fn is_not_yet_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.active_from
    }

    /// Whether the validity window has closed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the counter is still below the advisory ceiling
    pub fn is_within_rate_limit(&self) -> bool {
        self.request_count < u64::from(self.rate_limit)
    }

    /// Whether the credential's scopes permit an endpoint
    pub fn allows_endpoint(&self, endpoint: &str) -> bool {
        self.scopes.contains(endpoint)
    }

    /// Whether a source address is acceptable; no allow list means any
    pub fn allows_source(&self, address: &str) -> bool {
        match &self.ip_allow_list {
            Some(allowed) => allowed.contains(address),
            None => true,
        }
    }

    // Mutators

    /// Deactivate the credential; returns whether a change was made
    pub fn revoke(&mut self) -> bool {
        if self.is_active {
            self.is_active = false;
            true
        } else {
            false
        }
    }

    /// Count one recorded usage and stamp its timestamp.
    ///
    /// Only the usage accountant calls this, from inside a store
    /// transaction.
    pub(crate) fn apply_usage(&mut self, at: DateTime<Utc>) {
        self.request_count += 1;
        self.last_used_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_record(rate_limit: u32) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord::new(
            "sha256$digest",
            "owner-1",
            "owner@example.com",
            "Test Credential",
            now,
            now + Duration::days(30),
            rate_limit,
        )
    }

    #[test]
    fn test_new_record_defaults() {
        let record = create_test_record(100);

        assert!(record.is_active());
        assert_eq!(record.request_count(), 0);
        assert!(record.last_used_at().is_none());
        assert_eq!(record.description(), "");
        assert!(record.scopes().contains("/api/news"));
        assert!(record.scopes().contains("/api/news/search"));
        assert!(record.ip_allow_list().is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = create_test_record(10);
        let b = create_test_record(10);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_revoke_is_one_way() {
        let mut record = create_test_record(10);

        assert!(record.revoke());
        assert!(!record.is_active());

        // Second revocation is a no-op
        assert!(!record.revoke());
        assert!(!record.is_active());
    }

    #[test]
    fn test_temporal_checks() {
        let now = Utc::now();
        let record = CredentialRecord::new(
            "sha256$digest",
            "owner-1",
            "owner@example.com",
            "Delayed",
            now + Duration::days(1),
            now + Duration::days(31),
            10,
        );

        assert!(record.is_not_yet_active_at(now));
        assert!(!record.is_expired_at(now));
        assert!(!record.is_not_yet_active_at(now + Duration::days(2)));
        assert!(record.is_expired_at(now + Duration::days(32)));
    }

    #[test]
    fn test_rate_limit_boundary() {
        let mut record = create_test_record(2);

        assert!(record.is_within_rate_limit());
        record.apply_usage(Utc::now());
        assert!(record.is_within_rate_limit());
        record.apply_usage(Utc::now());
        assert!(!record.is_within_rate_limit());
    }

    #[test]
    fn test_apply_usage_stamps_last_used() {
        let mut record = create_test_record(10);
        let at = Utc::now();

        record.apply_usage(at);

        assert_eq!(record.request_count(), 1);
        assert_eq!(record.last_used_at(), Some(at));
    }

    #[test]
    fn test_allows_endpoint() {
        let record = create_test_record(10).with_scopes(vec!["/api/news"]);

        assert!(record.allows_endpoint("/api/news"));
        assert!(!record.allows_endpoint("/api/news/search"));
    }

    #[test]
    fn test_allows_source() {
        let open = create_test_record(10);
        assert!(open.allows_source("10.0.0.1"));

        let restricted = create_test_record(10).with_ip_allow_list(vec!["10.0.0.1"]);
        assert!(restricted.allows_source("10.0.0.1"));
        assert!(!restricted.allows_source("10.0.0.2"));
    }

    #[test]
    fn test_storage_field_naming_is_camel_case() {
        let record = create_test_record(10);
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("secretDigest").is_some());
        assert!(value.get("ownerId").is_some());
        assert!(value.get("requestCount").is_some());
        assert!(value.get("rateLimit").is_some());
        assert!(value.get("activeFrom").is_some());
        assert!(value.get("secret_digest").is_none());
    }
}
