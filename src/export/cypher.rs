use std::path::Path;

use super::{edge_attrs, export_ids, node_attrs, Attr};
use crate::error::Result;
use crate::graph::{ApiGraph, Node};

/// Single-quoted Cypher string literal.
fn literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn value(attr: &Attr) -> String {
    match attr {
        Attr::Str(s) => literal(s),
        Attr::Int(i) => i.to_string(),
        Attr::Float(f) if f.is_finite() => format!("{:?}", f),
        Attr::Float(_) => "null".to_string(),
        Attr::Bool(b) => b.to_string(),
        Attr::Json(v) => literal(&v.to_string()),
    }
}

fn properties(pairs: &[(&'static str, Attr)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}: {}", k, value(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn label(node: &Node) -> &'static str {
    match node {
        Node::Tool(_) => "Tool",
        Node::Parameter(_) => "Parameter",
    }
}

/// Neo4j Cypher script: one `CREATE` per node, one `MATCH ... CREATE` per edge.
///
/// Nodes carry their export id as the `id` property; relationships match on
/// label plus `id`, so the script can be run statement by statement.
pub fn to_cypher(graph: &ApiGraph) -> String {
    let ids = export_ids(graph);
    let mut statements = vec!["// Create nodes".to_string()];

    for (id, node) in graph.nodes() {
        let mut pairs = vec![("id", Attr::Str(ids[id.0].clone()))];
        pairs.extend(node_attrs(node).into_iter().filter(|(k, _)| *k != "node_type"));
        statements.push(format!("CREATE (:{} {{{}}});", label(node), properties(&pairs)));
    }

    statements.push(String::new());
    statements.push("// Create relationships".to_string());

    for edge in graph.edges() {
        let (Some(source), Some(target)) = (graph.node(edge.source), graph.node(edge.target)) else {
            continue;
        };
        let rel_type = edge.kind.name().to_uppercase();
        let pairs: Vec<_> = edge_attrs(edge).into_iter().filter(|(k, _)| *k != "edge_type").collect();
        let props = if pairs.is_empty() {
            String::new()
        } else {
            format!(" {{{}}}", properties(&pairs))
        };
        statements.push(format!(
            "MATCH (a:{} {{id: {}}}), (b:{} {{id: {}}}) CREATE (a)-[:{}{}]->(b);",
            label(source),
            literal(&ids[edge.source.0]),
            label(target),
            literal(&ids[edge.target.0]),
            rel_type,
            props
        ));
    }

    let mut script = statements.join("\n");
    script.push('\n');
    script
}

pub fn write_cypher(graph: &ApiGraph, path: &Path) -> Result<()> {
    std::fs::write(path, to_cypher(graph))?;
    Ok(())
}
