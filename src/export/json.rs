use std::path::Path;

use serde_json::{json, Map, Value as JsonValue};

use super::{edge_attrs, export_ids, node_attrs};
use crate::error::Result;
use crate::graph::ApiGraph;

/// Node-link JSON: `{directed, multigraph, generated_at, nodes, links}`.
pub fn to_json(graph: &ApiGraph) -> JsonValue {
    let ids = export_ids(graph);

    let nodes: Vec<JsonValue> = graph
        .nodes()
        .map(|(id, node)| {
            let mut obj = Map::new();
            obj.insert("id".to_string(), JsonValue::from(ids[id.0].as_str()));
            for (key, value) in node_attrs(node) {
                obj.insert(key.to_string(), value.to_json());
            }
            JsonValue::Object(obj)
        })
        .collect();

    let links: Vec<JsonValue> = graph
        .edges()
        .iter()
        .map(|edge| {
            let mut obj = Map::new();
            obj.insert("source".to_string(), JsonValue::from(ids[edge.source.0].as_str()));
            obj.insert("target".to_string(), JsonValue::from(ids[edge.target.0].as_str()));
            for (key, value) in edge_attrs(edge) {
                obj.insert(key.to_string(), value.to_json());
            }
            JsonValue::Object(obj)
        })
        .collect();

    json!({
        "directed": true,
        "multigraph": true,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "nodes": nodes,
        "links": links,
    })
}

pub fn write_json(graph: &ApiGraph, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(&to_json(graph))?;
    std::fs::write(path, text)?;
    Ok(())
}
