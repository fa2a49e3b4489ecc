//! In-memory store and repository implementations
//!
//! The store is an explicit handle over both collections behind one
//! `RwLock`, so the usage-append transaction can take a single write guard
//! and commit the counter increment and the log insert together. Useful as
//! the test double and for single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::credential::{CredentialId, CredentialRecord, CredentialRepository};
use crate::domain::usage::{UsageLogEntry, UsageLogId, UsageLogRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct StoreInner {
    credentials: HashMap<CredentialId, CredentialRecord>,
    digest_index: HashMap<String, CredentialId>,
    usage_log: HashMap<UsageLogId, UsageLogEntry>,
    closed: bool,
}

/// Handle to an in-memory store with explicit open/close lifecycle
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryStore {
    /// Open a fresh, empty store
    pub fn open() -> Self {
        Self::default()
    }

    /// Close the store; every later operation fails with a storage error
    pub async fn close(&self) {
        self.inner.write().await.closed = true;
    }

    async fn read(&self) -> Result<RwLockReadGuard<'_, StoreInner>, DomainError> {
        let guard = self.inner.read().await;
        if guard.closed {
            return Err(DomainError::storage("Store is closed"));
        }
        Ok(guard)
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, StoreInner>, DomainError> {
        let guard = self.inner.write().await;
        if guard.closed {
            return Err(DomainError::storage("Store is closed"));
        }
        Ok(guard)
    }
}

/// In-memory implementation of `CredentialRepository`
#[derive(Debug, Clone)]
pub struct InMemoryCredentialRepository {
    store: InMemoryStore,
}

impl InMemoryCredentialRepository {
    /// Create a repository over a store handle
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }

    /// Create a repository seeded with initial records
    pub fn with_records(store: InMemoryStore, records: Vec<CredentialRecord>) -> Self {
        let repo = Self::new(store);

        let mut inner = futures::executor::block_on(repo.store.inner.write());
        for record in records {
            inner.digest_index
                .insert(record.secret_digest().to_string(), *record.id());
            inner.credentials.insert(*record.id(), record);
        }
        drop(inner);

        repo
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn get(&self, id: &CredentialId) -> Result<Option<CredentialRecord>, DomainError> {
        let inner = self.store.read().await?;
        Ok(inner.credentials.get(id).cloned())
    }

    async fn find_by_digest(
        &self,
        digest: &str,
    ) -> Result<Option<CredentialRecord>, DomainError> {
        let inner = self.store.read().await?;
        Ok(inner
            .digest_index
            .get(digest)
            .and_then(|id| inner.credentials.get(id))
            .cloned())
    }

    async fn create(&self, record: CredentialRecord) -> Result<CredentialRecord, DomainError> {
        let mut inner = self.store.write().await?;

        if inner.credentials.contains_key(record.id()) {
            return Err(DomainError::conflict(format!(
                "Credential '{}' already exists",
                record.id()
            )));
        }

        if inner.digest_index.contains_key(record.secret_digest()) {
            return Err(DomainError::conflict(
                "A credential with this digest already exists",
            ));
        }

        inner
            .digest_index
            .insert(record.secret_digest().to_string(), *record.id());
        inner.credentials.insert(*record.id(), record.clone());

        Ok(record)
    }

    async fn update(&self, record: &CredentialRecord) -> Result<CredentialRecord, DomainError> {
        let mut inner = self.store.write().await?;

        let Some(previous) = inner.credentials.get(record.id()).cloned() else {
            return Err(DomainError::not_found(format!(
                "Credential '{}' not found",
                record.id()
            )));
        };

        if previous.secret_digest() != record.secret_digest() {
            inner.digest_index.remove(previous.secret_digest());
            inner
                .digest_index
                .insert(record.secret_digest().to_string(), *record.id());
        }

        inner.credentials.insert(*record.id(), record.clone());
        Ok(record.clone())
    }

    async fn delete(&self, id: &CredentialId) -> Result<bool, DomainError> {
        let mut inner = self.store.write().await?;

        if let Some(record) = inner.credentials.remove(id) {
            inner.digest_index.remove(record.secret_digest());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<CredentialRecord>, DomainError> {
        let inner = self.store.read().await?;
        Ok(inner
            .credentials
            .values()
            .filter(|r| r.owner_id() == owner_id)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of `UsageLogRepository`
#[derive(Debug, Clone)]
pub struct InMemoryUsageLogRepository {
    store: InMemoryStore,
}

impl InMemoryUsageLogRepository {
    /// Create a repository over a store handle.
    ///
    /// Pass the same handle as the credential repository; `append` touches
    /// both collections.
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UsageLogRepository for InMemoryUsageLogRepository {
    async fn append(&self, entry: UsageLogEntry) -> Result<UsageLogEntry, DomainError> {
        // One write guard covers the counter increment and the log insert,
        // so concurrent appends serialize and neither write lands alone.
        let mut inner = self.store.write().await?;

        match inner.credentials.get_mut(entry.credential_id()) {
            Some(record) => record.apply_usage(entry.timestamp()),
            None => {
                return Err(DomainError::transaction(format!(
                    "Credential '{}' not found",
                    entry.credential_id()
                )));
            }
        }

        inner.usage_log.insert(*entry.id(), entry.clone());
        Ok(entry)
    }

    async fn list_for_credential(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Vec<UsageLogEntry>, DomainError> {
        let inner = self.store.read().await?;
        Ok(inner
            .usage_log
            .values()
            .filter(|e| e.credential_id() == credential_id)
            .cloned()
            .collect())
    }
}
