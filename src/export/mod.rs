//! Read-only writers for the finished graph.

mod cypher;
mod dot;
mod graphml;
mod json;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::graph::{ApiGraph, Edge, EdgeKind, MatchType, Node};

pub use cypher::{to_cypher, write_cypher};
pub use dot::{to_dot, write_dot};
pub use graphml::{to_graphml, write_graphml};
pub use json::{to_json, write_json};

/// Output formats selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Graphml,
    Dot,
    Neo4j,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Graphml => "graphml",
            ExportFormat::Dot => "dot",
            ExportFormat::Neo4j => "cypher",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Json => "json",
            ExportFormat::Graphml => "graphml",
            ExportFormat::Dot => "dot",
            ExportFormat::Neo4j => "neo4j",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "graphml" => Ok(ExportFormat::Graphml),
            "dot" => Ok(ExportFormat::Dot),
            "neo4j" | "cypher" => Ok(ExportFormat::Neo4j),
            other => Err(format!(
                "unknown export format '{}' (expected json, graphml, dot or neo4j)",
                other
            )),
        }
    }
}

/// Write `graph` to `path` in `format`.
pub fn export(graph: &ApiGraph, format: ExportFormat, path: &Path) -> Result<()> {
    match format {
        ExportFormat::Json => write_json(graph, path)?,
        ExportFormat::Graphml => write_graphml(graph, path)?,
        ExportFormat::Dot => write_dot(graph, path)?,
        ExportFormat::Neo4j => write_cypher(graph, path)?,
    }
    log::info!("Exported graph to {}: {}", format, path.display());
    Ok(())
}

/// A flat attribute value shared by every writer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Attr {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Structured sample value; flat formats render it as compact JSON.
    Json(JsonValue),
}

impl Attr {
    pub(crate) fn to_json(&self) -> JsonValue {
        match self {
            Attr::Str(s) => JsonValue::from(s.as_str()),
            Attr::Int(i) => JsonValue::from(*i),
            Attr::Float(f) => JsonValue::from(*f),
            Attr::Bool(b) => JsonValue::from(*b),
            Attr::Json(v) => v.clone(),
        }
    }

    /// Plain text rendering for DOT labels and GraphML data.
    pub(crate) fn text(&self) -> String {
        match self {
            Attr::Str(s) => s.clone(),
            Attr::Int(i) => i.to_string(),
            Attr::Float(f) => format!("{:?}", f),
            Attr::Bool(b) => b.to_string(),
            Attr::Json(v) => v.to_string(),
        }
    }
}

type Attrs = Vec<(&'static str, Attr)>;

fn push_opt(attrs: &mut Attrs, key: &'static str, value: &Option<String>) {
    if let Some(v) = value {
        attrs.push((key, Attr::Str(v.clone())));
    }
}

/// Node attributes, `node_type` first.
pub(crate) fn node_attrs(node: &Node) -> Attrs {
    let mut attrs = vec![("node_type", Attr::Str(node.type_name().to_string()))];
    match node {
        Node::Tool(t) => {
            attrs.push(("tool_name", Attr::Str(t.tool_name.clone())));
            attrs.push(("source_collection", Attr::Str(t.source_collection.clone())));
            push_opt(&mut attrs, "endpoint", &t.endpoint);
            push_opt(&mut attrs, "example_invocation", &t.example_invocation);
            if let Some(code) = t.status_code {
                attrs.push(("status_code", Attr::Int(i64::from(code))));
            }
            if let Some(success) = t.success {
                attrs.push(("success", Attr::Bool(success)));
            }
            push_opt(&mut attrs, "timestamp", &t.timestamp);
        }
        Node::Parameter(p) => {
            attrs.push(("path", Attr::Str(p.id())));
            attrs.push(("data_type", Attr::Str(p.type_label())));
            if let Some(sample) = &p.sample {
                attrs.push(("sample", Attr::Json(sample.clone())));
            }
        }
    }
    attrs
}

/// Edge attributes, `edge_type` first.
pub(crate) fn edge_attrs(edge: &Edge) -> Attrs {
    let mut attrs = vec![("edge_type", Attr::Str(edge.kind.name().to_string()))];
    match &edge.kind {
        EdgeKind::RequiresInput { data_type } | EdgeKind::ProducesOutput { data_type } => {
            attrs.push(("data_type", Attr::Str(data_type.to_string())));
        }
        EdgeKind::PotentialFlow(f) => {
            attrs.push(("output_path", Attr::Str(f.output_path.to_string())));
            attrs.push(("input_path", Attr::Str(f.input_path.to_string())));
            attrs.push(("matching_param", Attr::Str(f.matching_param())));
            attrs.push(("confidence", Attr::Float(f.confidence)));
            attrs.push(("match_type", Attr::Str(f.match_type.to_string())));
        }
        EdgeKind::SemanticFlow(f) => {
            attrs.push(("output_path", Attr::Str(f.output_path.to_string())));
            attrs.push(("input_path", Attr::Str(f.input_path.to_string())));
            attrs.push(("confidence", Attr::Float(f.confidence)));
            attrs.push(("match_type", Attr::Str(MatchType::Semantic.to_string())));
            attrs.push(("reasoning", Attr::Str(f.reasoning.clone())));
        }
    }
    attrs
}

/// External node ids, indexed by `NodeId`.
///
/// Tools keep their `collection.tool` id and parameters their path. When a
/// parameter path equals some tool id the parameter gets a `param:` prefix.
pub(crate) fn export_ids(graph: &ApiGraph) -> Vec<String> {
    let tool_ids: HashSet<String> = graph
        .nodes()
        .filter_map(|(_, n)| match n {
            Node::Tool(t) => Some(t.id.clone()),
            Node::Parameter(_) => None,
        })
        .collect();

    graph
        .nodes()
        .map(|(_, node)| match node {
            Node::Tool(t) => t.id.clone(),
            Node::Parameter(p) => {
                let id = p.id();
                if tool_ids.contains(&id) {
                    format!("param:{}", id)
                } else {
                    id
                }
            }
        })
        .collect()
}
