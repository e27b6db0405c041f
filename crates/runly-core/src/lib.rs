//! Asset processing for Runly.
//!
//! This crate holds the loader, validator, compiler, renderer and execution
//! engine, plus the "port" traits the infrastructure layer implements. It
//! depends only on `runly-types` and pure-Rust parsing crates -- never on
//! `runly-infra` or any network/crypto crate.

pub mod compiler;
pub mod engine;
pub mod loader;
pub mod renderer;
pub mod service;
pub mod validator;
