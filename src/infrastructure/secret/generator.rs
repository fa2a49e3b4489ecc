//! Credential secret generation
//!
//! Generates cryptographically secure credential strings with hashing.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Result of generating a new credential secret
#[derive(Debug, Clone)]
pub struct GeneratedSecret {
    /// The full raw secret (only shown once at issue time)
    pub secret: String,
    /// The one-way digest to persist
    pub digest: String,
}

/// Generator for secure credential secrets
///
/// The raw secret is a fixed recognizable prefix followed by the CSPRNG
/// output hex-encoded, which keeps it URL-safe. The digest is SHA-256 in a
/// self-describing `sha256$<base64url>` envelope.
#[derive(Debug, Clone)]
pub struct SecretGenerator {
    /// Prefix for all generated secrets (e.g. "nf_live_", "nf_test_")
    prefix: String,
    /// Number of random bytes behind each secret
    secret_bytes: usize,
}

impl SecretGenerator {
    /// Create a new generator with a custom prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            secret_bytes: 32,
        }
    }

    /// Generator for live credentials
    pub fn live() -> Self {
        Self::new("nf_live_")
    }

    /// Generator for test credentials
    pub fn test() -> Self {
        Self::new("nf_test_")
    }

    /// Set the number of random bytes
    pub fn with_secret_bytes(mut self, bytes: usize) -> Self {
        self.secret_bytes = bytes;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate a fresh secret and its digest
    pub fn generate(&self) -> GeneratedSecret {
        let mut random_bytes = vec![0u8; self.secret_bytes];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let secret = format!("{}{}", self.prefix, hex::encode(&random_bytes));
        let digest = self.digest_of(&secret);

        GeneratedSecret { secret, digest }
    }

    /// Deterministic one-way digest of a raw secret
    pub fn digest_of(&self, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        let result = hasher.finalize();
        format!("sha256${}", URL_SAFE_NO_PAD.encode(result))
    }

    /// Verify a raw secret against a stored digest
    pub fn verify(&self, secret: &str, stored_digest: &str) -> bool {
        let computed = self.digest_of(secret);
        constant_time_compare(&computed, stored_digest)
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::live()
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut result = 0u8;

    for i in 0..a.len() {
        result |= a_bytes[i] ^ b_bytes[i];
    }

    result == 0
}
