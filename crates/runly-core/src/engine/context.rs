//! The engine's view of the outside world.
//!
//! [`NodeExecutionContext`] is implemented in runly-infra (HTTP skills) and
//! runly-cli (terminal acknowledgement). The engine only ever sees the
//! trait object, so runs are fully scriptable in tests.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use runly_types::asset::KnowledgeResource;
use runly_types::error::StepError;
use serde_json::{Value, json};

/// Boxed future returned by context methods.
pub type StepFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StepError>> + Send + 'a>>;

/// A fully rendered skill call.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillInvocation {
    pub node_id: String,
    pub skill_id: String,
    pub endpoint: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub payload: Value,
    /// Per-attempt budget in milliseconds.
    pub timeout_ms: u64,
    /// Additional attempts after the first failure.
    pub max_retries: u32,
}

/// A rendered AI task with its resolved knowledge source, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AiTaskRequest {
    pub node_id: String,
    pub prompt: String,
    pub model: Option<String>,
    pub knowledge: Option<KnowledgeResource>,
}

/// Side-effecting operations the engine delegates.
///
/// Methods return boxed futures so the trait stays object-safe behind
/// `Arc<dyn NodeExecutionContext>`.
pub trait NodeExecutionContext: Send + Sync {
    /// Call an external skill provider and return its result payload.
    fn invoke_skill(&self, request: SkillInvocation) -> StepFuture<'_, Value>;

    /// Run a reasoning task and return its result.
    fn run_ai_task(&self, request: AiTaskRequest) -> StepFuture<'_, Value>;

    /// Present `instruction` to the operator and wait for acknowledgement.
    ///
    /// A refusal is reported as [`StepError::Declined`].
    fn await_acknowledgement(&self, node_id: &str, instruction: &str) -> StepFuture<'_, ()>;
}

// ---------------------------------------------------------------------------
// PlaceholderExecutionContext
// ---------------------------------------------------------------------------

/// Sandbox context: no network, no prompts.
///
/// Skills and AI tasks return labelled placeholder results and every HITL
/// node is acknowledged automatically.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderExecutionContext;

impl NodeExecutionContext for PlaceholderExecutionContext {
    fn invoke_skill(&self, request: SkillInvocation) -> StepFuture<'_, Value> {
        Box::pin(async move {
            tracing::info!(
                node_id = %request.node_id,
                skill = %request.skill_id,
                "sandbox: skipping skill call"
            );
            Ok(json!({
                "placeholder": true,
                "skill": request.skill_id,
                "payload": request.payload,
            }))
        })
    }

    fn run_ai_task(&self, request: AiTaskRequest) -> StepFuture<'_, Value> {
        Box::pin(async move {
            tracing::info!(node_id = %request.node_id, "sandbox: skipping AI task");
            Ok(Value::String(format!(
                "[placeholder] response to: {}",
                request.prompt
            )))
        })
    }

    fn await_acknowledgement(&self, node_id: &str, instruction: &str) -> StepFuture<'_, ()> {
        let node_id = node_id.to_string();
        let instruction = instruction.to_string();
        Box::pin(async move {
            tracing::info!(node_id = %node_id, %instruction, "sandbox: auto-acknowledged");
            Ok(())
        })
    }
}
