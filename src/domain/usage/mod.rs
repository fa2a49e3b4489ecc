//! Usage accounting domain model

pub mod entry;
pub mod repository;

pub use entry::{UsageLogEntry, UsageLogId, UsageStats};
pub use repository::UsageLogRepository;
