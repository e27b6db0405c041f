//! ContentHasher trait for computing asset fingerprints.
//!
//! Defined in runly-core so the compiler can hash canonical bytes without
//! coupling to a specific algorithm. The `Sha256ContentHasher` adapter lives
//! in runly-infra.

/// Abstraction over content hashing.
pub trait ContentHasher: Send + Sync {
    /// Identifier recorded in `security.hash_algo`, e.g. `"SHA-256"`.
    fn algorithm(&self) -> &str;

    /// Compute a lowercase hex-encoded digest of the given bytes.
    fn compute_hash(&self, content: &[u8]) -> String;
}
