//! Store adapter implementations
//!
//! The engine never picks a backend on its own; callers construct one of
//! these handles and inject its repositories at build time.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCredentialRepository, InMemoryStore, InMemoryUsageLogRepository};
pub use postgres::{
    PostgresConfig, PostgresCredentialRepository, PostgresStore, PostgresUsageLogRepository,
};
