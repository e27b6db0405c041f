//! Shared domain types for Runly.
//!
//! This crate contains the SOP asset document model, operator identity,
//! runtime configuration, and the error enums shared by the core and
//! infrastructure layers.
//!
//! Zero infrastructure dependencies -- only serde, chrono, semver, thiserror.

pub mod asset;
pub mod config;
pub mod error;
pub mod identity;
