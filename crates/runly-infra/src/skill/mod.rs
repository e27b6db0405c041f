//! Skill provider adapters.

pub mod http;

pub use http::HttpSkillInvoker;
