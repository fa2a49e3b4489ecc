//! Usage accounting services

pub mod service;

pub use service::{RequestEvent, UsageService};
