//! SOP asset document model.
//!
//! A `.runly` asset is a YAML document with seven top-level domains:
//! `manifest`, `knowledge`, `skills`, `dictionary`, `topology`, `commerce`
//! and `security`. This module is pure data: the loader, validator, compiler
//! and engine in `runly-core` give it behaviour.
//!
//! Maps are `BTreeMap` throughout so that serialization order never depends
//! on hashing state; the compiler relies on this for stable content hashes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Edge target that ends a run normally.
pub const TERMINATE: &str = "terminate";

/// Edge target that ends a run with an error.
pub const TERMINATE_ERROR: &str = "terminate_error";

/// Hash algorithm identifier written into `security.hash_algo` when sealing.
pub const CANONICAL_HASH_ALGO: &str = "SHA-256";

/// Whether an edge target is a reserved sentinel rather than a node ID.
pub fn is_sentinel(target: &str) -> bool {
    target.is_empty() || target == TERMINATE || target == TERMINATE_ERROR
}

// ---------------------------------------------------------------------------
// Document (root aggregate)
// ---------------------------------------------------------------------------

/// The root of a `.runly` asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub manifest: Manifest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge: Vec<KnowledgeResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<SkillResource>,
    pub dictionary: Dictionary,
    pub topology: Topology,
    pub commerce: Commerce,
    pub security: Security,
}

impl Document {
    /// Look up a topology node by ID.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.topology.nodes.iter().find(|n| n.id == id)
    }

    /// Build an ID -> node index over the topology.
    ///
    /// When IDs collide the first declaration wins.
    pub fn node_index(&self) -> HashMap<&str, &Node> {
        let mut index = HashMap::with_capacity(self.topology.nodes.len());
        for node in &self.topology.nodes {
            index.entry(node.id.as_str()).or_insert(node);
        }
        index
    }

    /// Look up a declared skill by ID.
    pub fn skill(&self, id: &str) -> Option<&SkillResource> {
        self.skills.iter().find(|s| s.id == id)
    }

    /// Look up a declared knowledge resource by ID.
    pub fn knowledge(&self, id: &str) -> Option<&KnowledgeResource> {
        self.knowledge.iter().find(|k| k.id == id)
    }

    /// Look up a declared dictionary input by name.
    pub fn input(&self, name: &str) -> Option<&Parameter> {
        self.dictionary.inputs.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// 1. Manifest
// ---------------------------------------------------------------------------

/// Identity, version and lifecycle header of an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Uniform resource name, e.g. `urn:runly:sop:daily-report`.
    pub urn: String,
    pub title: String,
    /// Semantic version of the asset itself.
    pub version: String,
    pub status: AssetStatus,
    pub creator: Creator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Minimum runtime version able to execute this asset.
    pub min_runtime: String,
}

impl Manifest {
    /// Check `min_runtime` against the given runtime version.
    ///
    /// An empty requirement is always satisfied. A leading `v` is tolerated.
    pub fn supports_runtime(&self, runtime: &semver::Version) -> Result<bool, semver::Error> {
        let raw = self.min_runtime.trim();
        if raw.is_empty() {
            return Ok(true);
        }
        let required = semver::Version::parse(raw.trim_start_matches('v'))?;
        Ok(*runtime >= required)
    }
}

/// Publication status of an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Draft,
    Published,
    Deprecated,
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetStatus::Draft => write!(f, "draft"),
            AssetStatus::Published => write!(f, "published"),
            AssetStatus::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// The asset's author. Re-stamped from the operator identity at seal time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Creator {
    pub me_id: String,
    pub name: String,
    /// Hex-encoded Ed25519 public key.
    pub pub_key: String,
}

// ---------------------------------------------------------------------------
// 2. Knowledge
// ---------------------------------------------------------------------------

/// A declared knowledge source that AI tasks may draw on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeResource {
    pub id: String,
    pub provider_type: KnowledgeProviderType,
    pub description: String,
    pub config: KnowledgeConfig,
    pub injection: KnowledgeInjection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnowledgeProviderType {
    #[default]
    SemanticApi,
    VdbDirect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub endpoint: String,
    pub method: String,
    /// Per-call timeout in milliseconds.
    pub timeout: u64,
    pub max_retries: u32,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vdb_params: Option<VdbParams>,
}

/// Vector search parameters for `VDB_DIRECT` knowledge sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VdbParams {
    pub index_name: String,
    pub top_k: u32,
    pub threshold: f64,
    pub embedding_model: String,
}

/// How retrieved knowledge is injected into a prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeInjection {
    pub target_variable: String,
    pub max_tokens: u32,
    pub format: String,
    pub cache_ttl: u64,
}

// ---------------------------------------------------------------------------
// 3. Skills
// ---------------------------------------------------------------------------

/// A declared external capability invoked by `SKILL_CALL` nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillResource {
    pub id: String,
    #[serde(rename = "type")]
    pub skill_type: String,
    pub description: String,
    pub config: SkillConfig,
    pub contract: SkillContract,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillConfig {
    pub endpoint: String,
    pub method: String,
    /// Per-call timeout in milliseconds.
    pub timeout: u64,
    pub max_retries: u32,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillContract {
    pub request: BTreeMap<String, Value>,
    pub response: ResponseContract,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseContract {
    pub strict_mode: bool,
    pub schema: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// 4. Dictionary
// ---------------------------------------------------------------------------

/// Typed declaration of an asset's inputs and output artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dictionary {
    pub inputs: Vec<Parameter>,
    pub artifacts: Vec<ArtifactSpec>,
}

/// A named input parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub required: bool,
}

/// A named output slot filled by a `TERMINUS` node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub description: String,
    pub schema: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// 5. Topology
// ---------------------------------------------------------------------------

/// The execution graph: an entry node plus an unordered node list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub start_at: String,
    pub nodes: Vec<Node>,
}

/// Kinds of topology node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    SkillCall,
    AiTask,
    Hitl,
    LogicGate,
    Terminus,
}

impl NodeType {
    /// Parse the YAML spelling (`SKILL_CALL`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SKILL_CALL" => Some(NodeType::SkillCall),
            "AI_TASK" => Some(NodeType::AiTask),
            "HITL" => Some(NodeType::Hitl),
            "LOGIC_GATE" => Some(NodeType::LogicGate),
            "TERMINUS" => Some(NodeType::Terminus),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::SkillCall => "SKILL_CALL",
            NodeType::AiTask => "AI_TASK",
            NodeType::Hitl => "HITL",
            NodeType::LogicGate => "LOGIC_GATE",
            NodeType::Terminus => "TERMINUS",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single step of the topology.
///
/// On disk a node is `{id, type, config, on_success, on_failure, rules}` with
/// an untyped `config` bag. In memory the bag is decoded into a
/// [`NodeConfig`] variant chosen by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    pub id: String,
    pub config: NodeConfig,
    pub on_success: String,
    pub on_failure: String,
    /// Ordered branch rules; only meaningful on `LOGIC_GATE` nodes.
    pub rules: Vec<LogicRule>,
}

impl Node {
    /// The YAML `type` string of this node.
    pub fn type_name(&self) -> &str {
        self.config.type_name()
    }

    /// Every outgoing edge target, including rule targets for logic gates.
    pub fn outgoing_targets(&self) -> Vec<&str> {
        let mut targets = vec![self.on_success.as_str(), self.on_failure.as_str()];
        if matches!(self.config, NodeConfig::LogicGate(_)) {
            targets.extend(self.rules.iter().map(|r| r.next.as_str()));
        }
        targets
    }
}

/// An ordered `{condition, next}` branch on a logic gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicRule {
    pub condition: String,
    pub next: String,
}

/// Per-type node configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    SkillCall(SkillCallConfig),
    AiTask(AiTaskConfig),
    Hitl(HitlConfig),
    LogicGate(LogicGateConfig),
    Terminus(TerminusConfig),
    /// A node type this runtime does not recognise; the bag is kept verbatim.
    Unknown {
        node_type: String,
        config: BTreeMap<String, Value>,
    },
}

impl NodeConfig {
    pub fn node_type(&self) -> Option<NodeType> {
        match self {
            NodeConfig::SkillCall(_) => Some(NodeType::SkillCall),
            NodeConfig::AiTask(_) => Some(NodeType::AiTask),
            NodeConfig::Hitl(_) => Some(NodeType::Hitl),
            NodeConfig::LogicGate(_) => Some(NodeType::LogicGate),
            NodeConfig::Terminus(_) => Some(NodeType::Terminus),
            NodeConfig::Unknown { .. } => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            NodeConfig::Unknown { node_type, .. } => node_type,
            other => other.node_type().map(|t| t.as_str()).unwrap_or_default(),
        }
    }

    /// Re-encode the configuration as the untyped on-disk bag.
    pub fn to_bag(&self) -> Map<String, Value> {
        let encoded = match self {
            NodeConfig::SkillCall(c) => serde_json::to_value(c),
            NodeConfig::AiTask(c) => serde_json::to_value(c),
            NodeConfig::Hitl(c) => serde_json::to_value(c),
            NodeConfig::LogicGate(c) => serde_json::to_value(c),
            NodeConfig::Terminus(c) => serde_json::to_value(c),
            NodeConfig::Unknown { config, .. } => serde_json::to_value(config),
        };
        match encoded {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// `SKILL_CALL`: invoke a declared skill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillCallConfig {
    #[serde(default)]
    pub skill_ref: String,
    /// Request payload; string values may contain `{{ domain.key }}` references.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `AI_TASK`: render a prompt and hand it to the reasoning provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiTaskConfig {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `HITL`: block until an operator acknowledges the instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitlConfig {
    #[serde(default)]
    pub instruction: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `LOGIC_GATE`: branching lives in the node's `rules`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicGateConfig {
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `TERMINUS`: write a rendered value into an artifact slot and stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminusConfig {
    #[serde(default)]
    pub artifact_ref: String,
    #[serde(default)]
    pub data_source: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// On-disk node shape.
#[doc(hidden)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    on_success: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    on_failure: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    rules: Vec<LogicRule>,
}

/// A node's `config` bag did not match the shape its `type` requires.
#[derive(Debug, thiserror::Error)]
#[error("node '{node}' has an invalid {node_type} config: {message}")]
pub struct NodeConfigError {
    pub node: String,
    pub node_type: String,
    pub message: String,
}

impl TryFrom<RawNode> for Node {
    type Error = NodeConfigError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let bag = Value::Object(raw.config.clone());
        let decode_err = |e: serde_json::Error| NodeConfigError {
            node: raw.id.clone(),
            node_type: raw.node_type.clone(),
            message: e.to_string(),
        };

        let config = match NodeType::parse(&raw.node_type) {
            Some(NodeType::SkillCall) => {
                NodeConfig::SkillCall(serde_json::from_value(bag).map_err(decode_err)?)
            }
            Some(NodeType::AiTask) => {
                NodeConfig::AiTask(serde_json::from_value(bag).map_err(decode_err)?)
            }
            Some(NodeType::Hitl) => NodeConfig::Hitl(serde_json::from_value(bag).map_err(decode_err)?),
            Some(NodeType::LogicGate) => {
                NodeConfig::LogicGate(serde_json::from_value(bag).map_err(decode_err)?)
            }
            Some(NodeType::Terminus) => {
                NodeConfig::Terminus(serde_json::from_value(bag).map_err(decode_err)?)
            }
            None => NodeConfig::Unknown {
                node_type: raw.node_type.clone(),
                config: raw.config.clone().into_iter().collect(),
            },
        };

        Ok(Node {
            id: raw.id,
            config,
            on_success: raw.on_success,
            on_failure: raw.on_failure,
            rules: raw.rules,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        RawNode {
            node_type: node.type_name().to_string(),
            config: node.config.to_bag(),
            id: node.id,
            on_success: node.on_success,
            on_failure: node.on_failure,
            rules: node.rules,
        }
    }
}

// ---------------------------------------------------------------------------
// 6. Commerce
// ---------------------------------------------------------------------------

/// Commercial terms. Carried through unchanged; never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commerce {
    pub pricing: Pricing,
    pub royalty: Royalty,
    pub settlement: Settlement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub mode: PricingMode,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingMode {
    #[default]
    Free,
    PayPerUse,
    Subscription,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Royalty {
    pub creator_share: f64,
    pub platform_share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settlement {
    pub trigger: SettlementTrigger,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementTrigger {
    #[default]
    Instant,
    BatchMonthly,
}

// ---------------------------------------------------------------------------
// 7. Security
// ---------------------------------------------------------------------------

/// Content fingerprint and signature. Written only by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub hash_algo: String,
    /// Hex-encoded Ed25519 signature over the content hash.
    pub signature: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
