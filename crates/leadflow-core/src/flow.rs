// Leadflow Core - Flow records and documents
//
// A flow is authored and stored by the dashboard's visual editor. The engine
// reads it as an opaque, versioned document:
//
//   { nodes: [{ id, type, data }], edges: [{ id, source, target, sourceHandle }] }
//
// and turns it into an immutable `Flow` snapshot before any traversal starts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LeadflowError, LeadflowResult};
use crate::graph::{Graph, Node, TriggerRule};

/// Flow as persisted by the authoring tool
///
/// Example:
/// ```yaml
/// id: welcome
/// tenantId: acme
/// name: Welcome message
/// enabled: true
/// graph:
///   nodes:
///     - id: start
///       type: trigger
///       data:
///         keyword: oi
///     - id: greet
///       type: message
///       data:
///         text: "Olá! Como posso ajudar?"
///   edges:
///     - id: e1
///       source: start
///       target: greet
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecord {
    pub id: String,

    /// Owning tenant
    pub tenant_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub graph: FlowDocument,
}

fn default_enabled() -> bool {
    true
}

/// Graph document (nodes + edges) in the authoring tool's shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDocument {
    #[serde(default)]
    pub nodes: Vec<RawNode>,

    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

/// Untyped node; editor-only fields such as `position` are ignored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub source: String,

    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

/// Immutable flow snapshot used for matching and execution
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub enabled: bool,
    pub graph: Graph,
}

impl Flow {
    /// Validate a record and build its graph
    pub fn from_record(record: &FlowRecord) -> LeadflowResult<Self> {
        if record.id.trim().is_empty() {
            return Err(LeadflowError::config("flow id is required"));
        }
        if record.tenant_id.trim().is_empty() {
            return Err(LeadflowError::config(format!(
                "flow '{}' has no tenant",
                record.id
            )));
        }

        let graph = Graph::from_document(&record.graph).map_err(|e| match e {
            LeadflowError::Config(msg) => {
                LeadflowError::config(format!("flow '{}': {}", record.id, msg))
            }
            other => other,
        })?;

        Ok(Self {
            id: record.id.clone(),
            tenant_id: record.tenant_id.clone(),
            name: record.name.clone(),
            enabled: record.enabled,
            graph,
        })
    }

    pub fn from_json(content: &str) -> LeadflowResult<Self> {
        let record: FlowRecord = serde_json::from_str(content)
            .map_err(|e| LeadflowError::config(format!("Failed to parse flow JSON: {}", e)))?;
        Self::from_record(&record)
    }

    pub fn from_yaml(content: &str) -> LeadflowResult<Self> {
        let record: FlowRecord = serde_yaml::from_str(content)
            .map_err(|e| LeadflowError::config(format!("Failed to parse flow YAML: {}", e)))?;
        Self::from_record(&record)
    }

    /// Load a flow file; `.json` is parsed as JSON, anything else as YAML
    pub fn from_file(path: impl AsRef<Path>) -> LeadflowResult<Self> {
        let record = read_record(path.as_ref())?;
        Self::from_record(&record)
    }

    /// Trigger nodes and their rules
    pub fn triggers(&self) -> impl Iterator<Item = (&Node, &TriggerRule)> {
        self.graph.triggers()
    }
}

/// Read a flow record without validating its graph
pub fn read_record(path: &Path) -> LeadflowResult<FlowRecord> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LeadflowError::config(format!("Failed to read flow file {}: {}", path.display(), e))
    })?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&content).map_err(|e| {
            LeadflowError::config(format!("Failed to parse flow file {}: {}", path.display(), e))
        })
    } else {
        serde_yaml::from_str(&content).map_err(|e| {
            LeadflowError::config(format!("Failed to parse flow file {}: {}", path.display(), e))
        })
    }
}
