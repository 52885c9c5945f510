use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{edge_attrs, export_ids, node_attrs, Attr};
use crate::error::{ApigraphError, Result};
use crate::graph::ApiGraph;

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

fn xml_err<E: std::fmt::Display>(e: E) -> ApigraphError {
    ApigraphError::Export(format!("GraphML write failed: {}", e))
}

fn attr_type(value: &Attr) -> &'static str {
    match value {
        Attr::Str(_) | Attr::Json(_) => "string",
        Attr::Int(_) => "long",
        Attr::Float(_) => "double",
        Attr::Bool(_) => "boolean",
    }
}

/// Attribute keys in first-seen order for one domain (`node` or `edge`).
struct KeySet {
    domain: &'static str,
    keys: Vec<(&'static str, &'static str)>,
}

impl KeySet {
    fn new(domain: &'static str) -> Self {
        Self {
            domain,
            keys: Vec::new(),
        }
    }

    fn observe(&mut self, name: &'static str, value: &Attr) {
        if !self.keys.iter().any(|(k, _)| *k == name) {
            self.keys.push((name, attr_type(value)));
        }
    }

    fn key_id(&self, name: &str) -> String {
        format!("{}_{}", &self.domain[..1], name)
    }
}

fn write_keys(writer: &mut Writer<Vec<u8>>, keys: &KeySet) -> Result<()> {
    for (name, ty) in &keys.keys {
        let id = keys.key_id(name);
        let elem = BytesStart::new("key").with_attributes([
            ("id", id.as_str()),
            ("for", keys.domain),
            ("attr.name", *name),
            ("attr.type", *ty),
        ]);
        writer.write_event(Event::Empty(elem)).map_err(xml_err)?;
    }
    Ok(())
}

fn write_data(writer: &mut Writer<Vec<u8>>, keys: &KeySet, attrs: &[(&'static str, Attr)]) -> Result<()> {
    for (name, value) in attrs {
        let id = keys.key_id(name);
        let text = value.text();
        writer
            .write_event(Event::Start(BytesStart::new("data").with_attributes([("key", id.as_str())])))
            .map_err(xml_err)?;
        writer.write_event(Event::Text(BytesText::new(&text))).map_err(xml_err)?;
        writer.write_event(Event::End(BytesEnd::new("data"))).map_err(xml_err)?;
    }
    Ok(())
}

/// GraphML document text.
pub fn to_graphml(graph: &ApiGraph) -> Result<String> {
    let ids = export_ids(graph);
    let nodes: Vec<_> = graph.nodes().map(|(id, node)| (id, node_attrs(node))).collect();
    let edges: Vec<_> = graph.edges().iter().map(|edge| (edge, edge_attrs(edge))).collect();

    let mut node_keys = KeySet::new("node");
    for (_, attrs) in &nodes {
        for (name, value) in attrs {
            node_keys.observe(name, value);
        }
    }
    let mut edge_keys = KeySet::new("edge");
    for (_, attrs) in &edges {
        for (name, value) in attrs {
            edge_keys.observe(name, value);
        }
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("graphml").with_attributes([("xmlns", GRAPHML_NS)])))
        .map_err(xml_err)?;
    write_keys(&mut writer, &node_keys)?;
    write_keys(&mut writer, &edge_keys)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("graph").with_attributes([("id", "apigraph"), ("edgedefault", "directed")]),
        ))
        .map_err(xml_err)?;

    for (id, attrs) in &nodes {
        writer
            .write_event(Event::Start(BytesStart::new("node").with_attributes([("id", ids[id.0].as_str())])))
            .map_err(xml_err)?;
        write_data(&mut writer, &node_keys, attrs)?;
        writer.write_event(Event::End(BytesEnd::new("node"))).map_err(xml_err)?;
    }

    for (i, (edge, attrs)) in edges.iter().enumerate() {
        let edge_id = format!("e{}", i);
        let elem = BytesStart::new("edge").with_attributes([
            ("id", edge_id.as_str()),
            ("source", ids[edge.source.0].as_str()),
            ("target", ids[edge.target.0].as_str()),
        ]);
        writer.write_event(Event::Start(elem)).map_err(xml_err)?;
        write_data(&mut writer, &edge_keys, attrs)?;
        writer.write_event(Event::End(BytesEnd::new("edge"))).map_err(xml_err)?;
    }

    writer.write_event(Event::End(BytesEnd::new("graph"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("graphml"))).map_err(xml_err)?;

    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

pub fn write_graphml(graph: &ApiGraph, path: &Path) -> Result<()> {
    std::fs::write(path, to_graphml(graph)?)?;
    Ok(())
}
