use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::container::descriptor::TypeKey;
use crate::container::registry::NodeId;
use crate::container::resolver::Resolver;
use crate::error::DiResult;

/// A key as it appears in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySnapshot {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl KeySnapshot {
    fn new(key: &TypeKey, optional: bool) -> Self {
        Self {
            key: key.to_string(),
            group: key.group().map(str::to_string),
            optional,
        }
    }
}

/// One registered constructor
#[derive(Debug, Clone, Serialize)]
pub struct ConstructorSnapshot {
    pub id: String,
    pub name: String,
    /// Name of the scope the constructor was registered in
    pub scope: String,
    pub params: Vec<KeySnapshot>,
    pub results: Vec<KeySnapshot>,
    /// Whether the constructor has already been invoked
    pub built: bool,
}

/// A producer-to-consumer edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeSnapshot {
    pub from: String,
    pub to: String,
    pub key: String,
}

/// The provider graph visible from one scope
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub scope: String,
    pub verified_acyclic: bool,
    pub constructors: Vec<ConstructorSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

fn node_label(id: NodeId) -> String {
    format!("{}:{}", id.scope, id.index)
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl GraphSnapshot {
    pub(crate) fn capture(scope: String, resolver: &Resolver<'_>) -> Self {
        let nodes = resolver.live_nodes();

        let constructors = nodes
            .iter()
            .map(|node| ConstructorSnapshot {
                id: node_label(node.id),
                name: node.name.clone(),
                scope: node.owner.clone(),
                params: node
                    .params
                    .iter()
                    .map(|param| KeySnapshot::new(&param.key, param.optional))
                    .collect(),
                results: node
                    .results
                    .iter()
                    .map(|key| KeySnapshot::new(key, false))
                    .collect(),
                built: resolver.is_built(&node.id),
            })
            .collect();

        let mut edges = Vec::new();
        for node in &nodes {
            for param in &node.params {
                for producer in resolver.producers(param) {
                    edges.push(EdgeSnapshot {
                        from: node_label(producer.id),
                        to: node_label(node.id),
                        key: param.key.to_string(),
                    });
                }
            }
        }

        Self {
            scope,
            verified_acyclic: resolver.is_verified(),
            constructors,
            edges,
        }
    }

    pub fn to_json(&self) -> DiResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as Graphviz DOT: constructors are boxes, keys are ellipses
    /// and grouped keys are clustered by group
    pub fn to_dot(&self) -> String {
        let mut keys: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        for constructor in &self.constructors {
            for key in constructor.params.iter().chain(&constructor.results) {
                keys.insert(&key.key, key.group.as_deref());
            }
        }

        let mut dot = String::new();
        let _ = writeln!(dot, "digraph Providers {{");
        let _ = writeln!(dot, "  rankdir=LR;");
        let _ = writeln!(dot, "  label=\"scope: {}\";", escape(&self.scope));

        for constructor in &self.constructors {
            let style = if constructor.built { ", style=filled" } else { "" };
            let _ = writeln!(
                dot,
                "  \"c:{}\" [shape=box, label=\"{}\\n({})\"{}];",
                constructor.id,
                escape(&constructor.name),
                escape(&constructor.scope),
                style
            );
        }

        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (key, group) in &keys {
            match group {
                Some(group) => groups.entry(group).or_default().push(key),
                None => {
                    let _ = writeln!(dot, "  \"k:{0}\" [shape=ellipse, label=\"{0}\"];", escape(key));
                }
            }
        }
        for (index, (group, members)) in groups.iter().enumerate() {
            let _ = writeln!(dot, "  subgraph cluster_{} {{", index);
            let _ = writeln!(dot, "    label=\"group: {}\";", escape(group));
            for key in members {
                let _ = writeln!(dot, "    \"k:{0}\" [shape=ellipse, label=\"{0}\"];", escape(key));
            }
            let _ = writeln!(dot, "  }}");
        }

        for constructor in &self.constructors {
            for result in &constructor.results {
                let _ = writeln!(dot, "  \"c:{}\" -> \"k:{}\";", constructor.id, escape(&result.key));
            }
            for param in &constructor.params {
                let style = if param.optional { " [style=dashed]" } else { "" };
                let _ = writeln!(
                    dot,
                    "  \"k:{}\" -> \"c:{}\"{};",
                    escape(&param.key),
                    constructor.id,
                    style
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}
