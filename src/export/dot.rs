use std::fmt::Write as _;
use std::path::Path;

use super::{edge_attrs, export_ids, node_attrs};
use crate::error::Result;
use crate::graph::{ApiGraph, EdgeKind, Node};

/// Quote a DOT identifier.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn attr_list(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, quote(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Graphviz DOT text.
pub fn to_dot(graph: &ApiGraph) -> String {
    let ids = export_ids(graph);
    let mut out = String::from("digraph apigraph {\n    rankdir=LR;\n");

    for (id, node) in graph.nodes() {
        let (label, shape) = match node {
            Node::Tool(t) => (t.id.clone(), "box"),
            Node::Parameter(p) => (p.id(), "ellipse"),
        };
        let mut pairs = vec![("label", label), ("shape", shape.to_string())];
        pairs.extend(node_attrs(node).into_iter().map(|(k, v)| (k, v.text())));
        let _ = writeln!(out, "    {} [{}];", quote(&ids[id.0]), attr_list(&pairs));
    }

    for edge in graph.edges() {
        let style = match &edge.kind {
            EdgeKind::RequiresInput { .. } | EdgeKind::ProducesOutput { .. } => "solid",
            EdgeKind::PotentialFlow(_) => "bold",
            EdgeKind::SemanticFlow(_) => "dashed",
        };
        let label = match &edge.kind {
            EdgeKind::PotentialFlow(f) => format!("{} ({:.2})", f.matching_param(), f.confidence),
            EdgeKind::SemanticFlow(f) => format!("{}~{} ({:.2})", f.output_path, f.input_path, f.confidence),
            kind => kind.name().to_string(),
        };
        let mut pairs = vec![("label", label), ("style", style.to_string())];
        pairs.extend(edge_attrs(edge).into_iter().map(|(k, v)| (k, v.text())));
        let _ = writeln!(
            out,
            "    {} -> {} [{}];",
            quote(&ids[edge.source.0]),
            quote(&ids[edge.target.0]),
            attr_list(&pairs)
        );
    }

    out.push_str("}\n");
    out
}

pub fn write_dot(graph: &ApiGraph, path: &Path) -> Result<()> {
    std::fs::write(path, to_dot(graph))?;
    Ok(())
}
