//! Execution engine: sequential interpretation of an asset topology.

pub mod context;
pub mod executor;
pub mod expression;

pub use context::{
    AiTaskRequest, NodeExecutionContext, PlaceholderExecutionContext, SkillInvocation, StepFuture,
};
pub use executor::{Engine, EngineConfig, RunReport};
