//! Cryptographic adapters for Runly.
//!
//! - `hash`: SHA-256 content hashing for asset fingerprints
//! - `signing`: Ed25519 signing, verification and key generation

pub mod hash;
pub mod signing;
