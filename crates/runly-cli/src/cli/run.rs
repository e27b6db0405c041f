//! `runly run`: execute an asset's topology in the terminal.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use serde_json::{Map, Value};

use runly_core::engine::{
    AiTaskRequest, Engine, EngineConfig, NodeExecutionContext, PlaceholderExecutionContext,
    SkillInvocation, StepFuture,
};
use runly_infra::skill::HttpSkillInvoker;
use runly_types::error::StepError;

use super::asset::{check_runtime, load_valid_document};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Terminal execution context
// ---------------------------------------------------------------------------

/// Real skill calls over HTTP, HITL prompts on the terminal.
///
/// AI tasks always go to the placeholder backend.
struct TerminalExecutionContext {
    invoker: HttpSkillInvoker,
    placeholder: PlaceholderExecutionContext,
    assume_yes: bool,
}

impl NodeExecutionContext for TerminalExecutionContext {
    fn invoke_skill(&self, request: SkillInvocation) -> StepFuture<'_, Value> {
        Box::pin(async move { self.invoker.invoke(&request).await })
    }

    fn run_ai_task(&self, request: AiTaskRequest) -> StepFuture<'_, Value> {
        self.placeholder.run_ai_task(request)
    }

    fn await_acknowledgement(&self, node_id: &str, instruction: &str) -> StepFuture<'_, ()> {
        let node_id = node_id.to_string();
        let instruction = instruction.to_string();
        let assume_yes = self.assume_yes;

        Box::pin(async move {
            println!();
            println!(
                "  {} {}",
                style(format!("[{node_id}]")).yellow().bold(),
                instruction
            );
            if assume_yes {
                println!("  {}", style("acknowledged (--yes)").dim());
                return Ok(());
            }

            let prompt_instruction = instruction.clone();
            let confirmed = tokio::task::spawn_blocking(move || {
                Confirm::new()
                    .with_prompt("Acknowledge and continue?")
                    .default(true)
                    .interact()
            })
            .await
            .map_err(|e| StepError::ExecutionFailed(format!("prompt task failed: {e}")))?
            .map_err(|e| StepError::ExecutionFailed(format!("prompt failed: {e}")))?;

            if confirmed {
                Ok(())
            } else {
                Err(StepError::Declined(prompt_instruction))
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Parse repeated `name=value` flags. Values that parse as JSON keep their type.
pub fn parse_inputs(raw: &[String]) -> Result<Map<String, Value>> {
    let mut inputs = Map::new();
    for pair in raw {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid input '{pair}', expected NAME=VALUE"))?;
        let name = name.trim();
        if name.is_empty() {
            bail!("Invalid input '{pair}', name is empty");
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        inputs.insert(name.to_string(), value);
    }
    Ok(inputs)
}

pub async fn handle_run(
    state: &AppState,
    file: &Path,
    raw_inputs: &[String],
    sandbox: bool,
    assume_yes: bool,
    max_steps: Option<u64>,
    json: bool,
) -> Result<()> {
    let document = load_valid_document(state, file, json)?;
    if !check_runtime(&document)? {
        bail!(
            "{} requires runtime {} or newer (this is {})",
            file.display(),
            document.manifest.min_runtime,
            env!("CARGO_PKG_VERSION")
        );
    }
    let inputs = parse_inputs(raw_inputs)?;

    let context: Arc<dyn NodeExecutionContext> = if sandbox {
        Arc::new(PlaceholderExecutionContext)
    } else {
        Arc::new(TerminalExecutionContext {
            invoker: HttpSkillInvoker::new()?,
            placeholder: PlaceholderExecutionContext,
            assume_yes,
        })
    };

    let mut config = EngineConfig::from(state.config.clone());
    if let Some(max) = max_steps {
        config.max_steps = Some(max);
    }

    if !json {
        println!();
        println!(
            "  {} Running '{}'{}",
            style(">").cyan().bold(),
            style(&document.manifest.title).cyan(),
            if sandbox {
                style(" (sandbox)").dim().to_string()
            } else {
                String::new()
            }
        );
    }

    let engine = Engine::new(&document, context, config);
    let report = engine
        .run(inputs)
        .await
        .with_context(|| format!("Run of {} failed", file.display()))?;

    if json {
        let out = serde_json::json!({
            "run_id": report.run_id.to_string(),
            "visited": report.visited,
            "artifacts": report.artifacts,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "  {} Completed in {} step(s)  {}",
        style("*").green().bold(),
        report.visited.len(),
        style(report.run_id.to_string()).dim()
    );
    println!();

    if report.artifacts.is_empty() {
        println!("  {} No artifacts were produced.", style("!").yellow().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Artifact").fg(Color::Cyan), Cell::new("Value")]);

    for (artifact, value) in &report.artifacts {
        table.add_row(vec![Cell::new(artifact), Cell::new(value)]);
    }

    println!("{table}");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_inputs_types_json_values() {
        let inputs = parse_inputs(&[
            "region=emea".to_string(),
            "limit=5".to_string(),
            "flags={\"dry\":true}".to_string(),
        ])
        .unwrap();
        assert_eq!(inputs["region"], json!("emea"));
        assert_eq!(inputs["limit"], json!(5));
        assert_eq!(inputs["flags"], json!({"dry": true}));
    }

    #[test]
    fn test_parse_inputs_keeps_equals_in_value() {
        let inputs = parse_inputs(&["query=a=b".to_string()]).unwrap();
        assert_eq!(inputs["query"], json!("a=b"));
    }

    #[test]
    fn test_parse_inputs_rejects_malformed_pairs() {
        assert!(parse_inputs(&["noequals".to_string()]).is_err());
        assert!(parse_inputs(&["=value".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_terminal_context_assume_yes_acknowledges() {
        let ctx = TerminalExecutionContext {
            invoker: HttpSkillInvoker::new().unwrap(),
            placeholder: PlaceholderExecutionContext,
            assume_yes: true,
        };
        assert!(ctx.await_acknowledgement("review", "approve?").await.is_ok());
    }

    #[tokio::test]
    async fn test_terminal_context_ai_task_uses_placeholder() {
        let ctx = TerminalExecutionContext {
            invoker: HttpSkillInvoker::new().unwrap(),
            placeholder: PlaceholderExecutionContext,
            assume_yes: true,
        };
        let out = ctx
            .run_ai_task(AiTaskRequest {
                node_id: "think".to_string(),
                prompt: "hello".to_string(),
                model: None,
                knowledge: None,
            })
            .await
            .unwrap();
        assert_eq!(out, json!("[placeholder] response to: hello"));
    }
}
