//! Port traits implemented by `runly-infra`.

pub mod hash;
pub mod identity;
pub mod signature;
