// Leadflow Core - Typed automation graph
//
// A Graph is the validated, immutable form of a FlowDocument. Node kinds are
// decoded from the authoring tool's untyped `type`/`data` pairs into tagged
// variants; kinds the engine does not know load as `Unknown` so that newer
// documents keep working against an older engine.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LeadflowError, LeadflowResult};
use crate::flow::{FlowDocument, RawEdge, RawNode};

/// Branch selector produced by a Condition node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchLabel {
    True,
    False,
}

impl BranchLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
        }
    }
}

impl From<bool> for BranchLabel {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl FromStr for BranchLabel {
    type Err = LeadflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" => Ok(Self::True),
            "false" => Ok(Self::False),
            other => Err(LeadflowError::config(format!(
                "invalid branch label '{}', expected 'true' or 'false'",
                other
            ))),
        }
    }
}

impl fmt::Display for BranchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule deciding whether a Trigger node fires for an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerRule {
    /// Case-insensitive substring match against the inbound text
    Keyword { keyword: String },
    /// Fires on a lead's first contact
    NewLead,
    /// Rule kind this engine does not understand; never fires
    Unknown { rule: String },
}

/// Predicate over a lead attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSpec {
    pub field: String,
    pub equals: String,
}

/// Mutation requested by an Action node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    AddTag { tag: String },
    /// Action kind this engine does not understand; skipped at run time
    Unknown { action: String },
}

/// Kind-specific node configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Trigger(TriggerRule),
    Message { text: String },
    Condition(ConditionSpec),
    Action(ActionKind),
    Unknown { kind: String },
}

impl NodeKind {
    /// Short name used in logs and run reports
    pub fn name(&self) -> &str {
        match self {
            Self::Trigger(_) => "trigger",
            Self::Message { .. } => "message",
            Self::Condition(_) => "condition",
            Self::Action(_) => "action",
            Self::Unknown { kind } => kind.as_str(),
        }
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, Self::Condition(_))
    }
}

/// A typed step in a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

/// Directed link between two nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    /// Only set on edges leaving a Condition node
    pub branch: Option<BranchLabel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerData {
    #[serde(default)]
    trigger_type: Option<String>,
    #[serde(default)]
    keyword: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageData {
    #[serde(default, alias = "message", alias = "content")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConditionData {
    #[serde(default)]
    field: Option<String>,
    #[serde(default, alias = "value")]
    equals: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionData {
    #[serde(default)]
    action_type: Option<String>,
    #[serde(default, alias = "value")]
    tag: Option<String>,
}

fn decode_data<T: DeserializeOwned + Default>(node_id: &str, data: &Value) -> LeadflowResult<T> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data.clone())
        .map_err(|e| LeadflowError::config(format!("node '{}' has invalid data: {}", node_id, e)))
}

fn value_to_plain_string(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

impl Node {
    /// Decode an authored node into its typed form
    pub fn from_raw(raw: &RawNode) -> LeadflowResult<Self> {
        let id = raw.id.clone();
        if id.trim().is_empty() {
            return Err(LeadflowError::config("node id must not be empty"));
        }

        let kind = match raw.node_type.trim().to_lowercase().as_str() {
            "trigger" => {
                let data: TriggerData = decode_data(&id, &raw.data)?;
                let rule = match data.trigger_type.as_deref().map(str::to_lowercase) {
                    None => TriggerRule::Keyword {
                        keyword: data.keyword.unwrap_or_default(),
                    },
                    Some(t) if t == "keyword" => TriggerRule::Keyword {
                        keyword: data.keyword.unwrap_or_default(),
                    },
                    Some(t) if t == "new_lead" || t == "newlead" => TriggerRule::NewLead,
                    Some(t) => TriggerRule::Unknown { rule: t },
                };
                NodeKind::Trigger(rule)
            }
            "message" => {
                let data: MessageData = decode_data(&id, &raw.data)?;
                let text = data.text.ok_or_else(|| {
                    LeadflowError::config(format!("message node '{}' requires 'text'", id))
                })?;
                NodeKind::Message { text }
            }
            "condition" => {
                let data: ConditionData = decode_data(&id, &raw.data)?;
                let field = data
                    .field
                    .filter(|f| !f.trim().is_empty())
                    .ok_or_else(|| {
                        LeadflowError::config(format!("condition node '{}' requires 'field'", id))
                    })?;
                NodeKind::Condition(ConditionSpec {
                    field,
                    equals: value_to_plain_string(data.equals),
                })
            }
            "action" => {
                let data: ActionData = decode_data(&id, &raw.data)?;
                let action_type = data
                    .action_type
                    .map(|a| a.to_lowercase())
                    .unwrap_or_else(|| "add_tag".to_string());
                let action = if action_type == "add_tag" {
                    let tag = data.tag.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
                        LeadflowError::config(format!("add_tag action '{}' requires 'tag'", id))
                    })?;
                    ActionKind::AddTag { tag }
                } else {
                    ActionKind::Unknown {
                        action: action_type,
                    }
                };
                NodeKind::Action(action)
            }
            _ => NodeKind::Unknown {
                kind: raw.node_type.clone(),
            },
        };

        Ok(Self { id, kind })
    }

    pub fn trigger_rule(&self) -> Option<&TriggerRule> {
        match &self.kind {
            NodeKind::Trigger(rule) => Some(rule),
            _ => None,
        }
    }
}

/// Validated, immutable automation graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    outgoing: HashMap<String, Vec<Edge>>,
    edge_count: usize,
}

impl Graph {
    /// Build a graph, rejecting duplicate ids, dangling edges and malformed node data
    pub fn from_document(doc: &FlowDocument) -> LeadflowResult<Self> {
        let mut nodes = Vec::with_capacity(doc.nodes.len());
        let mut index = HashMap::with_capacity(doc.nodes.len());

        for raw in &doc.nodes {
            let node = Node::from_raw(raw)?;
            if index.insert(node.id.clone(), nodes.len()).is_some() {
                return Err(LeadflowError::config(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
            nodes.push(node);
        }

        let mut graph = Self {
            nodes,
            index,
            outgoing: HashMap::new(),
            edge_count: 0,
        };

        let mut seen_edge_ids = HashSet::new();
        for raw in &doc.edges {
            if let Some(ref edge_id) = raw.id {
                if !seen_edge_ids.insert(edge_id.as_str()) {
                    return Err(LeadflowError::config(format!(
                        "duplicate edge id '{}'",
                        edge_id
                    )));
                }
            }
            let edge = graph.resolve_edge(raw)?;
            graph
                .outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(edge);
            graph.edge_count += 1;
        }

        Ok(graph)
    }

    fn resolve_edge(&self, raw: &RawEdge) -> LeadflowResult<Edge> {
        let source = self.node(&raw.source).ok_or_else(|| {
            LeadflowError::config(format!(
                "edge {} references unknown source node '{}'",
                raw.id.as_deref().unwrap_or("<unnamed>"),
                raw.source
            ))
        })?;
        if !self.contains(&raw.target) {
            return Err(LeadflowError::config(format!(
                "edge {} references unknown target node '{}'",
                raw.id.as_deref().unwrap_or("<unnamed>"),
                raw.target
            )));
        }

        // Handles on non-condition sources are layout detail of the editor
        let branch = if source.kind.is_condition() {
            match raw.source_handle.as_deref().filter(|h| !h.trim().is_empty()) {
                Some(handle) => Some(handle.parse::<BranchLabel>().map_err(|_| {
                    LeadflowError::config(format!(
                        "edge from condition '{}' has invalid branch handle '{}'",
                        source.id, handle
                    ))
                })?),
                None => None,
            }
        } else {
            None
        };

        Ok(Edge {
            id: raw.id.clone(),
            source: raw.source.clone(),
            target: raw.target.clone(),
            branch,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Outgoing edges of a node, in authored order
    pub fn outgoing(&self, id: &str) -> &[Edge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Trigger nodes in authored order
    pub fn triggers(&self) -> impl Iterator<Item = (&Node, &TriggerRule)> {
        self.nodes
            .iter()
            .filter_map(|n| n.trigger_rule().map(|rule| (n, rule)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> FlowDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_decode_node_kinds() {
        let graph = Graph::from_document(&doc(
            r#"{
                "nodes": [
                    {"id": "t", "type": "trigger", "data": {"keyword": "promo"}},
                    {"id": "c", "type": "condition", "data": {"field": "status", "equals": "novo"}},
                    {"id": "m", "type": "message", "data": {"text": "Bem-vindo!"}},
                    {"id": "a", "type": "action", "data": {"actionType": "add_tag", "tag": "recorrente"}},
                    {"id": "x", "type": "aiReply", "data": {"prompt": "hi"}}
                ],
                "edges": []
            }"#,
        ))
        .unwrap();

        assert_eq!(
            graph.node("t").unwrap().kind,
            NodeKind::Trigger(TriggerRule::Keyword {
                keyword: "promo".into()
            })
        );
        assert_eq!(
            graph.node("c").unwrap().kind,
            NodeKind::Condition(ConditionSpec {
                field: "status".into(),
                equals: "novo".into()
            })
        );
        assert_eq!(
            graph.node("a").unwrap().kind,
            NodeKind::Action(ActionKind::AddTag {
                tag: "recorrente".into()
            })
        );
        assert_eq!(graph.node("x").unwrap().kind.name(), "aiReply");
        assert_eq!(graph.triggers().count(), 1);
    }

    #[test]
    fn test_condition_edges_carry_branches() {
        let graph = Graph::from_document(&doc(
            r#"{
                "nodes": [
                    {"id": "c", "type": "condition", "data": {"field": "status", "equals": "novo"}},
                    {"id": "yes", "type": "message", "data": {"text": "a"}},
                    {"id": "no", "type": "message", "data": {"text": "b"}}
                ],
                "edges": [
                    {"id": "e1", "source": "c", "target": "yes", "sourceHandle": "true"},
                    {"id": "e2", "source": "c", "target": "no", "sourceHandle": "false"},
                    {"id": "e3", "source": "yes", "target": "no", "sourceHandle": "bottom"}
                ]
            }"#,
        ))
        .unwrap();

        let branches: Vec<_> = graph.outgoing("c").iter().map(|e| e.branch).collect();
        assert_eq!(branches, vec![Some(BranchLabel::True), Some(BranchLabel::False)]);
        assert_eq!(graph.outgoing("yes")[0].branch, None);
        assert!(graph.outgoing("no").is_empty());
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_dangling_edge_is_config_error() {
        let err = Graph::from_document(&doc(
            r#"{
                "nodes": [{"id": "t", "type": "trigger", "data": {"keyword": "oi"}}],
                "edges": [{"id": "e1", "source": "t", "target": "ghost"}]
            }"#,
        ))
        .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_duplicate_node_id_is_config_error() {
        let err = Graph::from_document(&doc(
            r#"{
                "nodes": [
                    {"id": "m", "type": "message", "data": {"text": "a"}},
                    {"id": "m", "type": "message", "data": {"text": "b"}}
                ]
            }"#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("duplicate node id 'm'"));
    }

    #[test]
    fn test_missing_required_data() {
        for json in [
            r#"{"nodes": [{"id": "m", "type": "message"}]}"#,
            r#"{"nodes": [{"id": "c", "type": "condition", "data": {"equals": "x"}}]}"#,
            r#"{"nodes": [{"id": "a", "type": "action", "data": {"actionType": "add_tag"}}]}"#,
        ] {
            assert!(Graph::from_document(&doc(json)).unwrap_err().is_config());
        }
    }

    #[test]
    fn test_unknown_action_and_trigger_kinds_load() {
        let graph = Graph::from_document(&doc(
            r#"{
                "nodes": [
                    {"id": "t", "type": "Trigger", "data": {"triggerType": "webhook"}},
                    {"id": "n", "type": "trigger", "data": {"triggerType": "new_lead"}},
                    {"id": "a", "type": "action", "data": {"actionType": "remove_tag", "tag": "x"}}
                ]
            }"#,
        ))
        .unwrap();

        assert_eq!(
            graph.node("t").unwrap().trigger_rule(),
            Some(&TriggerRule::Unknown {
                rule: "webhook".into()
            })
        );
        assert_eq!(graph.node("n").unwrap().trigger_rule(), Some(&TriggerRule::NewLead));
        assert_eq!(
            graph.node("a").unwrap().kind,
            NodeKind::Action(ActionKind::Unknown {
                action: "remove_tag".into()
            })
        );
    }

    #[test]
    fn test_invalid_condition_handle() {
        let err = Graph::from_document(&doc(
            r#"{
                "nodes": [
                    {"id": "c", "type": "condition", "data": {"field": "status"}},
                    {"id": "m", "type": "message", "data": {"text": "a"}}
                ],
                "edges": [{"source": "c", "target": "m", "sourceHandle": "maybe"}]
            }"#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_non_string_equals_is_stringified() {
        let graph = Graph::from_document(&doc(
            r#"{"nodes": [{"id": "c", "type": "condition", "data": {"field": "score", "value": 10}}]}"#,
        ))
        .unwrap();
        assert_eq!(
            graph.node("c").unwrap().kind,
            NodeKind::Condition(ConditionSpec {
                field: "score".into(),
                equals: "10".into()
            })
        );
    }

    #[test]
    fn test_unknown_kinds_keep_their_names() {
        let graph = Graph::from_document(&doc(
            r#"{
                "nodes": [
                    {"id": "x", "type": "aiReply", "data": {}},
                    {"id": "t", "type": "trigger", "data": {"triggerType": "webhook"}},
                    {"id": "a", "type": "action", "data": {"actionType": "remove_tag"}}
                ]
            }"#,
        ))
        .unwrap();

        match &graph.node("x").unwrap().kind {
            NodeKind::Unknown { kind } => assert_eq!(kind, "aiReply"),
            other => panic!("unexpected kind {other:?}"),
        }
        match graph.node("t").unwrap().trigger_rule() {
            Some(TriggerRule::Unknown { rule }) => assert_eq!(rule, "webhook"),
            other => panic!("unexpected rule {other:?}"),
        }
        assert_eq!(graph.node("a").unwrap().kind.name(), "action");
        assert_eq!(
            serde_json::to_value(BranchLabel::False).unwrap(),
            serde_json::json!("false")
        );
    }
}
