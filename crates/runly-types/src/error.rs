use thiserror::Error;

/// Errors raised while reading or parsing an asset file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read asset '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("asset is not valid YAML: {0}")]
    Parse(String),

    #[error("failed to serialize asset: {0}")]
    Serialize(String),

    #[error("failed to write asset '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single static-analysis violation. Each names the offending node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("node ID '{node}' is declared more than once")]
    DuplicateNode { node: String },

    #[error("start node '{start}' is not defined in the topology")]
    StartNodeMissing { start: String },

    #[error("node '{node}' points at nonexistent target '{target}'")]
    NodeNotFound { node: String, target: String },

    #[error("node '{node}' has a malformed variable reference: {reference}")]
    VariableFormat { node: String, reference: String },

    #[error("node '{node}' references undeclared input '{input}'")]
    InputRefMissing { node: String, input: String },

    #[error("node '{node}' references skill '{skill}' which is not declared in skills")]
    SkillRefMissing { node: String, skill: String },

    #[error("node '{node}' references knowledge '{knowledge}' which is not declared in knowledge")]
    KnowledgeRefMissing { node: String, knowledge: String },
}

impl ValidationError {
    /// The node the violation was found on.
    pub fn node(&self) -> &str {
        match self {
            ValidationError::StartNodeMissing { start } => start,
            ValidationError::DuplicateNode { node }
            | ValidationError::NodeNotFound { node, .. }
            | ValidationError::VariableFormat { node, .. }
            | ValidationError::InputRefMissing { node, .. }
            | ValidationError::SkillRefMissing { node, .. }
            | ValidationError::KnowledgeRefMissing { node, .. } => node,
        }
    }
}

/// Errors raised while sealing an asset.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("no signing key available; run `runly keys generate` to create an identity")]
    MissingKey,

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("failed to canonicalize asset: {0}")]
    Canonicalization(String),
}

/// Operational failures while verifying a seal.
///
/// A well-formed signature that simply does not match is not an error;
/// verification reports it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("asset has no signature; run `runly build` first")]
    MissingSignature,

    #[error("invalid creator public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("failed to canonicalize asset: {0}")]
    Canonicalization(String),
}

/// Failures reported by a node execution context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("step execution failed: {0}")]
    ExecutionFailed(String),

    #[error("provider did not answer within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("operator declined: {0}")]
    Declined(String),
}

/// Errors that abort (or, via `on_failure`, redirect) a run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("node '{node}' is not defined in the topology")]
    NodeNotFound { node: String },

    #[error("required input '{input}' has no value and no default")]
    MissingInput { input: String },

    #[error("node '{node}' failed: {source}")]
    Step {
        node: String,
        #[source]
        source: StepError,
    },

    #[error("node '{node}' references skill '{skill}' which is not declared")]
    UnknownSkill { node: String, skill: String },

    #[error("node '{node}' references knowledge '{knowledge}' which is not declared")]
    UnknownKnowledge { node: String, knowledge: String },

    #[error("logic gate '{node}' has no matching rule and no on_success fallback")]
    NoMatchingRule { node: String },

    #[error("logic gate '{node}' rule '{condition}' could not be evaluated: {message}")]
    Expression {
        node: String,
        condition: String,
        message: String,
    },

    #[error("run exceeded the step budget of {max} node visits")]
    StepBudgetExceeded { max: u64 },

    #[error("run ended at terminate_error after node '{node}'")]
    TerminatedWithError { node: String },
}

/// Errors resolving the active operator identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("profile '{0}' does not exist")]
    UnknownProfile(String),

    #[error("no signing key is configured for profile '{0}'")]
    MissingKey(String),

    #[error("profile storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_names_node_and_target() {
        let err = ValidationError::NodeNotFound {
            node: "n1".to_string(),
            target: "n99".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("n1"));
        assert!(msg.contains("n99"));
        assert_eq!(err.node(), "n1");
    }

    #[test]
    fn test_step_error_wrapped_in_execution_error() {
        let err = ExecutionError::Step {
            node: "fetch".to_string(),
            source: StepError::Timeout { timeout_ms: 500 },
        };
        assert_eq!(
            err.to_string(),
            "node 'fetch' failed: provider did not answer within 500 ms"
        );
    }

    #[test]
    fn test_missing_signature_display() {
        let err = VerificationError::MissingSignature;
        assert!(err.to_string().contains("no signature"));
    }
}
