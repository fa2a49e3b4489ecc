//! Secret generation

pub mod generator;

pub use generator::{GeneratedSecret, SecretGenerator};
