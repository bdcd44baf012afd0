//! Pre-send checks over the flow graph.

use crate::{
    FlowGraph, Node,
    notify::{Alert, NODE_ISSUE_NOTICE, Notifier},
};

/// Collect blocking defects for every node, in node then field order.
///
/// A node without an inspectable template yields an advisory through
/// `notifier` instead of defects.
#[must_use]
pub fn validate_nodes(graph: &FlowGraph, notifier: &dyn Notifier) -> Vec<String> {
    graph
        .nodes
        .iter()
        .flat_map(|node| validate_node(graph, node, notifier))
        .collect()
}

fn validate_node(graph: &FlowGraph, node: &Node, notifier: &dyn Notifier) -> Vec<String> {
    let Some(fields) = node.template_fields() else {
        tracing::warn!(node = %node.id, node_type = %node.node_type(), "node has no template");
        notifier.notify(Alert::notice(NODE_ISSUE_NOTICE));
        return Vec::new();
    };

    fields
        .into_iter()
        .filter(|(key, field)| {
            field.required && field.show && field.is_empty() && !graph.has_incoming(&node.id, key)
        })
        .map(|(key, field)| {
            let label = field
                .display_name
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| snake_to_normal_case(field.name.as_deref().unwrap_or(key)));
            format!("{} is missing {label}.", node.node_type())
        })
        .collect()
}

/// `api_key_path` -> `Api key path`.
#[must_use]
pub fn snake_to_normal_case(s: &str) -> String {
    s.split('_')
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 {
                return lower;
            }
            let mut chars = lower.chars();
            chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        })
        .collect::<Vec<String>>()
        .join(" ")
}
