//! Read-only view of the editor's flow graph.
//!
//! Only the parts the session inspects are typed; everything else is kept
//! verbatim so the graph can be forwarded to the peer unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node graph owned by the surrounding editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Viewport and any other editor state.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowGraph {
    /// Whether any edge targets `field` on node `node_id`.
    #[must_use]
    pub fn has_incoming(&self, node_id: &str, field: &str) -> bool {
        self.edges
            .iter()
            .filter_map(Edge::target_selector)
            .any(|(f, n)| f == field && n == node_id)
    }
}

/// One node of the flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NodeData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    /// Node type name, empty if the node carries no data.
    #[must_use]
    pub fn node_type(&self) -> &str {
        self.data.as_ref().map_or("", |d| d.node_type.as_str())
    }

    /// Template fields in declaration order.
    ///
    /// `None` when the node has no template or the template declares no
    /// fields. Non-object template entries (such as `_type`) are skipped.
    #[must_use]
    pub fn template_fields(&self) -> Option<Vec<(&str, TemplateField)>> {
        let template = self.data.as_ref()?.node.as_ref()?.template.as_ref()?;

        let fields: Vec<_> = template
            .iter()
            .filter(|(_, v)| v.is_object())
            .filter_map(|(k, v)| {
                TemplateField::deserialize(v)
                    .ok()
                    .map(|field| (k.as_str(), field))
            })
            .collect();

        if fields.is_empty() { None } else { Some(fields) }
    }
}

/// Node payload as written by the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Component description inside a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The parts of a template field the validator reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TemplateField {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub show: bool,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl TemplateField {
    /// No usable value: missing, null, `""`, `false` or zero.
    /// Lists and maps count as set even when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Bool(b)) => !b,
            Some(Value::Number(n)) => n.as_f64() == Some(0.0),
            Some(Value::Array(_) | Value::Object(_)) => false,
        }
    }
}

/// Directed connection between two node handles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "targetHandle", default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    /// `(field, node_id)` addressed by the target handle.
    ///
    /// Handles are `|`-separated: `<type>|<field>|<node id>[|...]`.
    #[must_use]
    pub fn target_selector(&self) -> Option<(&str, &str)> {
        let mut parts = self.target_handle.as_deref()?.split('|');
        let field = parts.nth(1)?;
        let node = parts.next()?;
        Some((field, node))
    }
}

/// Source of the current flow graph.
///
/// Implemented by the editor; the session only ever reads through it.
pub trait GraphSource: Send + Sync {
    /// Current graph, including any state to forward to the peer.
    fn graph(&self) -> FlowGraph;
}

impl GraphSource for FlowGraph {
    fn graph(&self) -> FlowGraph {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> FlowGraph {
        serde_json::from_value(json!({
            "nodes": [{
                "id": "llm-1",
                "position": {"x": 1, "y": 2},
                "data": {
                    "type": "OpenAI",
                    "node": {
                        "template": {
                            "model_name": {"required": true, "show": true, "value": "gpt"},
                            "api_key": {"required": true, "show": true, "value": ""},
                            "_type": "OpenAI"
                        }
                    }
                }
            }],
            "edges": [{"id": "e1", "targetHandle": "BaseLLM|llm|chain-1"}],
            "viewport": {"zoom": 1}
        }))
        .unwrap()
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let graph = sample();
        let value = serde_json::to_value(&graph).unwrap();

        assert_eq!(value["viewport"]["zoom"], 1);
        assert_eq!(value["nodes"][0]["position"]["y"], 2);
        assert_eq!(value["nodes"][0]["data"]["type"], "OpenAI");
        assert_eq!(value["edges"][0]["id"], "e1");
    }

    #[test]
    fn test_template_fields_keep_order_and_skip_scalars() {
        let graph = sample();
        let fields = graph.nodes[0].template_fields().unwrap();
        let names: Vec<_> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, vec!["model_name", "api_key"]);
        assert!(fields[1].1.is_empty());
        assert!(!fields[0].1.is_empty());
    }

    #[test]
    fn test_missing_template_yields_none() {
        let node: Node = serde_json::from_value(json!({"id": "n", "data": {"type": "X"}})).unwrap();
        assert!(node.template_fields().is_none());

        let node: Node = serde_json::from_value(
            json!({"id": "n", "data": {"type": "X", "node": {"template": {"_type": "X"}}}}),
        )
        .unwrap();
        assert!(node.template_fields().is_none());
    }

    #[test]
    fn test_edge_target_selector() {
        let graph = sample();
        assert_eq!(graph.edges[0].target_selector(), Some(("llm", "chain-1")));
        assert!(graph.has_incoming("chain-1", "llm"));
        assert!(!graph.has_incoming("llm-1", "llm"));

        let bare = Edge {
            target_handle: Some("nohandle".into()),
            ..Edge::default()
        };
        assert_eq!(bare.target_selector(), None);
    }

    #[test]
    fn test_falsy_scalars_are_empty_and_collections_are_set() {
        let field = |value: Value| TemplateField {
            value: Some(value),
            ..TemplateField::default()
        };
        assert!(TemplateField::default().is_empty());
        assert!(field(Value::Null).is_empty());
        assert!(field(json!("")).is_empty());
        assert!(field(json!(false)).is_empty());
        assert!(field(json!(0)).is_empty());
        assert!(field(json!(0.0)).is_empty());

        assert!(!field(json!(true)).is_empty());
        assert!(!field(json!(3)).is_empty());
        assert!(!field(json!("x")).is_empty());
        assert!(!field(json!([])).is_empty());
        assert!(!field(json!({})).is_empty());
    }
}
