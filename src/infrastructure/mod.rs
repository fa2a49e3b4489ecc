//! Infrastructure: services and store implementations

pub mod credential;
pub mod logging;
pub mod secret;
pub mod store;
pub mod usage;
