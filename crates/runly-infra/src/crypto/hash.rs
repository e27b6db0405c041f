//! SHA-256 content hashing for asset fingerprints.
//!
//! Implements the `ContentHasher` trait from `runly-core` using the `sha2`
//! crate (RustCrypto ecosystem).

use sha2::{Digest, Sha256};

use runly_core::service::hash::ContentHasher;
use runly_types::asset::CANONICAL_HASH_ALGO;

/// SHA-256 implementation of `ContentHasher`.
///
/// Computes lowercase hex-encoded digests of canonical asset bytes.
pub struct Sha256ContentHasher;

impl Sha256ContentHasher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Sha256ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher for Sha256ContentHasher {
    fn algorithm(&self) -> &str {
        CANONICAL_HASH_ALGO
    }

    fn compute_hash(&self, content: &[u8]) -> String {
        let digest = Sha256::digest(content);
        format!("{:x}", digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hash_known_value() {
        let hasher = Sha256ContentHasher::new();
        // SHA-256 of empty input
        assert_eq!(
            hasher.compute_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hash_different_content() {
        let hasher = Sha256ContentHasher::new();
        assert_ne!(hasher.compute_hash(b"asset A"), hasher.compute_hash(b"asset B"));
    }

    #[test]
    fn test_sha256_hash_is_lowercase_hex() {
        let hasher = Sha256ContentHasher::new();
        let hash = hasher.compute_hash(b"{\"manifest\":{}}");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_algorithm_identifier() {
        assert_eq!(Sha256ContentHasher::new().algorithm(), "SHA-256");
    }
}
