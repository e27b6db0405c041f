//! Static analysis of an asset before it is sealed or run.
//!
//! Three ordered passes:
//! 1. topology: unique node IDs, existing start node, resolvable edges
//! 2. variables: `{{ inputs.* }}` and `{{ steps.* }}` references in node config
//! 3. resource links: `skill_ref` and `knowledge_ref`
//!
//! [`validate`] stops at the first violation; [`validate_all`] reports every
//! violation in pass order.

use std::collections::{HashMap, HashSet};

use runly_types::asset::{Document, Node, NodeConfig, is_sentinel};
use runly_types::error::ValidationError;

use crate::renderer::{INPUTS, REFERENCE_PATTERN, STEPS};

/// Validate a document, returning the first violation found.
pub fn validate(document: &Document) -> Result<(), ValidationError> {
    match validate_all(document).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Validate a document, returning every violation in pass order.
pub fn validate_all(document: &Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let index = document.node_index();

    check_topology(document, &index, &mut errors);
    check_variables(document, &index, &mut errors);
    check_resource_links(document, &mut errors);

    tracing::debug!(
        urn = %document.manifest.urn,
        violations = errors.len(),
        "validated asset"
    );
    errors
}

// ---------------------------------------------------------------------------
// Pass 1: topology
// ---------------------------------------------------------------------------

fn check_topology(
    document: &Document,
    index: &HashMap<&str, &Node>,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen = HashSet::new();
    for node in &document.topology.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNode {
                node: node.id.clone(),
            });
        }
    }

    let start = &document.topology.start_at;
    if !index.contains_key(start.as_str()) {
        errors.push(ValidationError::StartNodeMissing {
            start: start.clone(),
        });
    }

    for node in &document.topology.nodes {
        for target in node.outgoing_targets() {
            if !is_sentinel(target) && !index.contains_key(target) {
                errors.push(ValidationError::NodeNotFound {
                    node: node.id.clone(),
                    target: target.to_string(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pass 2: variable references
// ---------------------------------------------------------------------------

fn check_variables(
    document: &Document,
    index: &HashMap<&str, &Node>,
    errors: &mut Vec<ValidationError>,
) {
    for node in &document.topology.nodes {
        let mut text = serde_json::to_string(&node.config.to_bag()).unwrap_or_default();

        // The engine evaluates a bare `data_source` as a single reference.
        if let NodeConfig::Terminus(cfg) = &node.config {
            let source = cfg.data_source.trim();
            if !source.is_empty() && !source.contains("{{") {
                if is_bare_reference(source) {
                    text.push_str(&format!(" {{{{{source}}}}}"));
                } else {
                    errors.push(ValidationError::VariableFormat {
                        node: node.id.clone(),
                        reference: source.to_string(),
                    });
                }
            }
        }

        for caps in REFERENCE_PATTERN.captures_iter(&text) {
            let path = &caps[1];
            let segments: Vec<&str> = path.split('.').collect();

            match segments[0] {
                INPUTS => match segments.get(1) {
                    Some(name) if !name.is_empty() => {
                        if document.input(name).is_none() {
                            errors.push(ValidationError::InputRefMissing {
                                node: node.id.clone(),
                                input: (*name).to_string(),
                            });
                        }
                    }
                    _ => errors.push(ValidationError::VariableFormat {
                        node: node.id.clone(),
                        reference: path.to_string(),
                    }),
                },
                STEPS => {
                    if segments.len() < 3 || segments[1].is_empty() {
                        errors.push(ValidationError::VariableFormat {
                            node: node.id.clone(),
                            reference: path.to_string(),
                        });
                    } else if !index.contains_key(segments[1]) {
                        errors.push(ValidationError::NodeNotFound {
                            node: node.id.clone(),
                            target: segments[1].to_string(),
                        });
                    }
                }
                // `env` placeholders left by the loader and any other domain
                // are not checked here.
                _ => {}
            }
        }
    }
}

/// `domain.key[.field...]` with word characters only.
fn is_bare_reference(source: &str) -> bool {
    source.contains('.')
        && source
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c == '_' || c.is_alphanumeric()))
}

// ---------------------------------------------------------------------------
// Pass 3: resource links
// ---------------------------------------------------------------------------

fn check_resource_links(document: &Document, errors: &mut Vec<ValidationError>) {
    for node in &document.topology.nodes {
        match &node.config {
            NodeConfig::SkillCall(cfg) => {
                if document.skill(&cfg.skill_ref).is_none() {
                    errors.push(ValidationError::SkillRefMissing {
                        node: node.id.clone(),
                        skill: cfg.skill_ref.clone(),
                    });
                }
            }
            NodeConfig::AiTask(cfg) => {
                if let Some(knowledge) = cfg.knowledge_ref.as_deref().filter(|k| !k.is_empty()) {
                    if document.knowledge(knowledge).is_none() {
                        errors.push(ValidationError::KnowledgeRefMissing {
                            node: node.id.clone(),
                            knowledge: knowledge.to_string(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
