//! Graph interpreter for asset topologies.
//!
//! The engine walks the topology one node at a time starting at `start_at`,
//! dispatching on node type, until it reaches an empty target, `terminate`,
//! or a TERMINUS node. Execution is strictly sequential; the only waits are
//! on the [`NodeExecutionContext`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use runly_types::asset::{
    Document, Node, NodeConfig, SkillCallConfig, TERMINATE, TERMINATE_ERROR, TerminusConfig,
};
use runly_types::config::RuntimeConfig;
use runly_types::error::{ExecutionError, StepError};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::context::{AiTaskRequest, NodeExecutionContext, SkillInvocation};
use super::expression::RuleEvaluator;
use crate::renderer::{VariableSpace, render, render_value};

// ---------------------------------------------------------------------------
// Config and report
// ---------------------------------------------------------------------------

/// Tunables for a single engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum node visits before the run is aborted. `None` disables the cap.
    pub max_steps: Option<u64>,
    /// Timeout handed to providers when a skill declares `timeout: 0`.
    pub default_skill_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        RuntimeConfig::default().into()
    }
}

impl From<RuntimeConfig> for EngineConfig {
    fn from(config: RuntimeConfig) -> Self {
        Self {
            max_steps: Some(config.max_steps),
            default_skill_timeout_ms: config.default_skill_timeout_ms,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Rendered artifacts keyed by `artifact_ref`.
    pub artifacts: BTreeMap<String, String>,
    /// Node IDs in visit order.
    pub visited: Vec<String>,
    /// Final variable space.
    pub variables: VariableSpace,
}

enum Transition {
    Next(String),
    Halt,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Interprets one document. Create one engine per concurrent run.
pub struct Engine<'a> {
    document: &'a Document,
    index: HashMap<&'a str, &'a Node>,
    context: Arc<dyn NodeExecutionContext>,
    evaluator: RuleEvaluator,
    config: EngineConfig,
}

impl<'a> Engine<'a> {
    pub fn new(
        document: &'a Document,
        context: Arc<dyn NodeExecutionContext>,
        config: EngineConfig,
    ) -> Self {
        Self {
            document,
            index: document.node_index(),
            context,
            evaluator: RuleEvaluator::new(),
            config,
        }
    }

    /// Run the topology with caller-supplied `inputs`.
    ///
    /// Supplied values override dictionary defaults. A required input with
    /// neither fails before the first node runs.
    pub async fn run(&self, inputs: Map<String, Value>) -> Result<RunReport, ExecutionError> {
        let run_id = Uuid::now_v7();
        let mut vars = VariableSpace::new(self.seed_inputs(inputs)?);
        let mut artifacts = BTreeMap::new();
        let mut visited: Vec<String> = Vec::new();

        tracing::info!(
            %run_id,
            urn = %self.document.manifest.urn,
            start_at = %self.document.topology.start_at,
            "starting run"
        );

        let mut current = self.document.topology.start_at.clone();
        let mut previous = String::new();

        loop {
            if current.is_empty() || current == TERMINATE {
                break;
            }
            if current == TERMINATE_ERROR {
                return Err(ExecutionError::TerminatedWithError { node: previous });
            }
            if let Some(max) = self.config.max_steps {
                if visited.len() as u64 >= max {
                    return Err(ExecutionError::StepBudgetExceeded { max });
                }
            }

            let node = self
                .index
                .get(current.as_str())
                .copied()
                .ok_or_else(|| ExecutionError::NodeNotFound {
                    node: current.clone(),
                })?;
            visited.push(node.id.clone());

            tracing::debug!(node_id = %node.id, node_type = %node.type_name(), "executing node");

            let outcome = self.execute_node(node, &mut vars, &mut artifacts).await;
            previous = node.id.clone();

            match outcome {
                Ok(Transition::Next(next)) => current = next,
                Ok(Transition::Halt) => break,
                Err(err) if !node.on_failure.is_empty() => {
                    tracing::warn!(
                        node_id = %node.id,
                        on_failure = %node.on_failure,
                        error = %err,
                        "node failed, following on_failure"
                    );
                    vars.set_step(&node.id, json!({ "error": err.to_string() }));
                    current = node.on_failure.clone();
                }
                Err(err) => {
                    tracing::error!(node_id = %node.id, error = %err, "node failed");
                    return Err(err);
                }
            }
        }

        tracing::info!(%run_id, steps = visited.len(), artifacts = artifacts.len(), "run complete");

        Ok(RunReport {
            run_id,
            artifacts,
            visited,
            variables: vars,
        })
    }

    fn seed_inputs(&self, supplied: Map<String, Value>) -> Result<Map<String, Value>, ExecutionError> {
        let declared = &self.document.dictionary.inputs;

        let mut inputs = Map::new();
        for param in declared {
            if let Some(default) = &param.default {
                inputs.insert(param.name.clone(), default.clone());
            }
        }
        inputs.extend(supplied);

        if let Some(missing) = declared
            .iter()
            .find(|p| p.required && !inputs.contains_key(&p.name))
        {
            return Err(ExecutionError::MissingInput {
                input: missing.name.clone(),
            });
        }
        Ok(inputs)
    }

    async fn execute_node(
        &self,
        node: &Node,
        vars: &mut VariableSpace,
        artifacts: &mut BTreeMap<String, String>,
    ) -> Result<Transition, ExecutionError> {
        let step_err = |source: StepError| ExecutionError::Step {
            node: node.id.clone(),
            source,
        };

        match &node.config {
            NodeConfig::SkillCall(cfg) => {
                let request = self.skill_invocation(node, cfg, vars)?;
                let output = self.context.invoke_skill(request).await.map_err(step_err)?;
                vars.set_step(&node.id, json!({ "output": output }));
                Ok(Transition::Next(node.on_success.clone()))
            }
            NodeConfig::AiTask(cfg) => {
                let knowledge = match cfg.knowledge_ref.as_deref().filter(|k| !k.is_empty()) {
                    Some(id) => Some(self.document.knowledge(id).cloned().ok_or_else(|| {
                        ExecutionError::UnknownKnowledge {
                            node: node.id.clone(),
                            knowledge: id.to_string(),
                        }
                    })?),
                    None => None,
                };
                let request = AiTaskRequest {
                    node_id: node.id.clone(),
                    prompt: render(&cfg.prompt, vars),
                    model: cfg.model.clone(),
                    knowledge,
                };
                let output = self.context.run_ai_task(request).await.map_err(step_err)?;
                vars.set_step(&node.id, json!({ "output": output }));
                Ok(Transition::Next(node.on_success.clone()))
            }
            NodeConfig::Hitl(cfg) => {
                let instruction = render(&cfg.instruction, vars);
                self.context
                    .await_acknowledgement(&node.id, &instruction)
                    .await
                    .map_err(step_err)?;
                vars.set_step(&node.id, json!({ "acknowledged": true }));
                Ok(Transition::Next(node.on_success.clone()))
            }
            NodeConfig::LogicGate(_) => self.select_branch(node, vars),
            NodeConfig::Terminus(cfg) => {
                let value = render(&data_source_template(cfg), vars);
                tracing::info!(node_id = %node.id, artifact = %cfg.artifact_ref, "artifact produced");
                artifacts.insert(cfg.artifact_ref.clone(), value);
                Ok(Transition::Halt)
            }
            NodeConfig::Unknown { node_type, .. } => {
                tracing::warn!(node_id = %node.id, %node_type, "unknown node type, skipping");
                Ok(Transition::Next(node.on_success.clone()))
            }
        }
    }

    fn skill_invocation(
        &self,
        node: &Node,
        cfg: &SkillCallConfig,
        vars: &VariableSpace,
    ) -> Result<SkillInvocation, ExecutionError> {
        let skill = self
            .document
            .skill(&cfg.skill_ref)
            .ok_or_else(|| ExecutionError::UnknownSkill {
                node: node.id.clone(),
                skill: cfg.skill_ref.clone(),
            })?;

        let payload = cfg
            .payload
            .iter()
            .map(|(k, v)| (k.clone(), render_value(v, vars)))
            .collect::<Map<String, Value>>();

        let timeout_ms = match skill.config.timeout {
            0 => self.config.default_skill_timeout_ms,
            ms => ms,
        };

        Ok(SkillInvocation {
            node_id: node.id.clone(),
            skill_id: skill.id.clone(),
            endpoint: skill.config.endpoint.clone(),
            method: skill.config.method.clone(),
            headers: skill.config.headers.clone(),
            payload: Value::Object(payload),
            timeout_ms,
            max_retries: skill.config.max_retries,
        })
    }

    /// First matching rule wins; with no match, fall back to `on_success`.
    fn select_branch(&self, node: &Node, vars: &VariableSpace) -> Result<Transition, ExecutionError> {
        let context = vars.to_expression_context();

        for rule in &node.rules {
            let matched = self
                .evaluator
                .evaluate_rule(&rule.condition, &context)
                .map_err(|e| ExecutionError::Expression {
                    node: node.id.clone(),
                    condition: rule.condition.clone(),
                    message: e.to_string(),
                })?;
            if matched {
                tracing::debug!(node_id = %node.id, condition = %rule.condition, next = %rule.next, "rule matched");
                return Ok(Transition::Next(rule.next.clone()));
            }
        }

        if node.on_success.is_empty() {
            Err(ExecutionError::NoMatchingRule {
                node: node.id.clone(),
            })
        } else {
            Ok(Transition::Next(node.on_success.clone()))
        }
    }
}

/// A bare `data_source` such as `steps.n1.output` is treated as one reference.
fn data_source_template(cfg: &TerminusConfig) -> String {
    if cfg.data_source.contains("{{") {
        cfg.data_source.clone()
    } else {
        format!("{{{{ {} }}}}", cfg.data_source)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
