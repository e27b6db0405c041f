//! Infrastructure layer for Runly.
//!
//! Contains implementations of the port traits defined in `runly-core`:
//! SHA-256 hashing, Ed25519 signing, the local operator profile store, the
//! `config.toml` loader, and the HTTP skill invoker.

pub mod config;
pub mod crypto;
pub mod paths;
pub mod profile;
pub mod skill;
