//! Arena-backed multigraph of tool and parameter nodes.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{DataType, ParameterPath};
use crate::error::{ApigraphError, Result};

/// Index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

/// Index of an edge in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EdgeId(pub usize);

/// An API operation observed in one source collection.
#[derive(Debug, Clone, Serialize)]
pub struct ToolNode {
    /// `source_collection + "." + tool_name`
    pub id: String,
    pub tool_name: String,
    pub source_collection: String,
    pub endpoint: Option<String>,
    pub example_invocation: Option<String>,
    pub status_code: Option<u16>,
    pub success: Option<bool>,
    pub timestamp: Option<String>,
}

impl ToolNode {
    pub fn tool_id(source_collection: &str, tool_name: &str) -> String {
        format!("{}.{}", source_collection, tool_name)
    }
}

/// A parameter path shared by every tool that references it.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterNode {
    pub path: ParameterPath,
    /// Every type the path has been observed with.
    pub data_types: BTreeSet<DataType>,
    /// First sample seen.
    pub sample: Option<JsonValue>,
}

impl ParameterNode {
    pub fn id(&self) -> String {
        self.path.to_string()
    }

    /// Observed types joined with `|` (e.g. `integer|string`).
    pub fn type_label(&self) -> String {
        self.data_types
            .iter()
            .map(DataType::as_str)
            .collect::<Vec<_>>()
            .join("|")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum Node {
    Tool(ToolNode),
    Parameter(ParameterNode),
}

impl Node {
    pub fn id(&self) -> String {
        match self {
            Node::Tool(t) => t.id.clone(),
            Node::Parameter(p) => p.id(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Tool(_) => "tool",
            Node::Parameter(_) => "parameter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Semantic,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Exact => write!(f, "exact"),
            MatchType::Fuzzy => write!(f, "fuzzy"),
            MatchType::Semantic => write!(f, "semantic"),
        }
    }
}

/// Name-based producer -> consumer link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PotentialFlow {
    pub output_path: ParameterPath,
    pub input_path: ParameterPath,
    pub confidence: f64,
    pub match_type: MatchType,
}

impl PotentialFlow {
    /// The shared path for exact matches, `output~input` for fuzzy ones.
    pub fn matching_param(&self) -> String {
        if self.output_path == self.input_path {
            self.output_path.to_string()
        } else {
            format!("{}~{}", self.output_path, self.input_path)
        }
    }
}

/// Model-judged producer -> consumer link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticFlow {
    pub output_path: ParameterPath,
    pub input_path: ParameterPath,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "edge_type", rename_all = "snake_case")]
pub enum EdgeKind {
    RequiresInput { data_type: DataType },
    ProducesOutput { data_type: DataType },
    PotentialFlow(PotentialFlow),
    SemanticFlow(SemanticFlow),
}

impl EdgeKind {
    pub fn name(&self) -> &'static str {
        match self {
            EdgeKind::RequiresInput { .. } => "requires_input",
            EdgeKind::ProducesOutput { .. } => "produces_output",
            EdgeKind::PotentialFlow(_) => "potential_flow",
            EdgeKind::SemanticFlow(_) => "semantic_flow",
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, EdgeKind::RequiresInput { .. } | EdgeKind::ProducesOutput { .. })
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            EdgeKind::PotentialFlow(f) => Some(f.confidence),
            EdgeKind::SemanticFlow(f) => Some(f.confidence),
            _ => None,
        }
    }

    /// What distinguishes two parallel edges between the same endpoints.
    fn identity(&self) -> (&'static str, String, String) {
        match self {
            EdgeKind::RequiresInput { .. } | EdgeKind::ProducesOutput { .. } => {
                (self.name(), String::new(), String::new())
            }
            EdgeKind::PotentialFlow(f) => (self.name(), f.output_path.to_string(), f.input_path.to_string()),
            EdgeKind::SemanticFlow(f) => (self.name(), f.output_path.to_string(), f.input_path.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// Summary counts for logging and reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub tool_nodes: usize,
    pub parameter_nodes: usize,
    pub io_edges: usize,
    pub flow_edges: usize,
    pub semantic_edges: usize,
    pub density: f64,
}

/// Directed multigraph of tools and parameters.
///
/// Nodes live in one arena; tool ids and parameter paths are indexed
/// separately so a tool id can never alias a parameter path.
#[derive(Debug, Default)]
pub struct ApiGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    tool_index: HashMap<String, NodeId>,
    param_index: HashMap<String, NodeId>,
    edge_index: HashMap<(NodeId, NodeId, (&'static str, String, String)), EdgeId>,
}

impl ApiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool node, or return the existing one with the same id.
    ///
    /// The flag is `true` when the node was created.
    pub fn upsert_tool(&mut self, tool: ToolNode) -> (NodeId, bool) {
        if let Some(&id) = self.tool_index.get(&tool.id) {
            return (id, false);
        }
        let id = NodeId(self.nodes.len());
        log::debug!("Added tool node: {}", tool.id);
        self.tool_index.insert(tool.id.clone(), id);
        self.nodes.push(Node::Tool(tool));
        (id, true)
    }

    /// Fetch-or-create the single node for `path`.
    ///
    /// The first sample wins; types accumulate across occurrences.
    pub fn upsert_parameter(&mut self, path: &ParameterPath, data_type: DataType, sample: &JsonValue) -> NodeId {
        let key = path.to_string();
        if let Some(&id) = self.param_index.get(&key) {
            if let Node::Parameter(param) = &mut self.nodes[id.0] {
                param.data_types.insert(data_type);
            }
            return id;
        }

        let id = NodeId(self.nodes.len());
        log::debug!("Added parameter node: {} ({})", key, data_type);
        self.param_index.insert(key, id);
        self.nodes.push(Node::Parameter(ParameterNode {
            path: path.clone(),
            data_types: BTreeSet::from([data_type]),
            sample: Some(sample.clone()),
        }));
        id
    }

    /// Add a directed edge, enforcing endpoint kinds.
    ///
    /// Input/output edges must run tool -> parameter, flow edges tool -> tool.
    /// Re-adding an edge with the same endpoints and identity returns the
    /// existing one; parallel edges with different metadata are kept.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, kind: EdgeKind) -> Result<EdgeId> {
        let source_node = self.node(source).ok_or_else(|| ApigraphError::Graph(format!("unknown source node {}", source.0)))?;
        let target_node = self.node(target).ok_or_else(|| ApigraphError::Graph(format!("unknown target node {}", target.0)))?;

        let valid = match (&kind, source_node, target_node) {
            (k, Node::Tool(_), Node::Parameter(_)) if k.is_io() => true,
            (EdgeKind::PotentialFlow(_) | EdgeKind::SemanticFlow(_), Node::Tool(_), Node::Tool(_)) => source != target,
            _ => false,
        };
        if !valid {
            return Err(ApigraphError::Graph(format!(
                "{} edge not allowed from {} '{}' to {} '{}'",
                kind.name(),
                source_node.type_name(),
                source_node.id(),
                target_node.type_name(),
                target_node.id()
            )));
        }

        if let Some(confidence) = kind.confidence() {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ApigraphError::Graph(format!("confidence {} outside [0, 1]", confidence)));
            }
        }

        let key = (source, target, kind.identity());
        if let Some(&existing) = self.edge_index.get(&key) {
            return Ok(existing);
        }

        let id = EdgeId(self.edges.len());
        log::debug!("Added {} edge: {} -> {}", kind.name(), source_node.id(), target_node.id());
        self.edge_index.insert(key, id);
        self.edges.push(Edge { source, target, kind });
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn tool(&self, id: NodeId) -> Option<&ToolNode> {
        match self.nodes.get(id.0) {
            Some(Node::Tool(t)) => Some(t),
            _ => None,
        }
    }

    pub fn parameter(&self, id: NodeId) -> Option<&ParameterNode> {
        match self.nodes.get(id.0) {
            Some(Node::Parameter(p)) => Some(p),
            _ => None,
        }
    }

    pub fn tool_by_id(&self, id: &str) -> Option<NodeId> {
        self.tool_index.get(id).copied()
    }

    pub fn parameter_by_path(&self, path: &str) -> Option<NodeId> {
        self.param_index.get(path).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// (tool, parameter) pairs of every `produces_output` edge.
    pub fn output_pairs(&self) -> Vec<(NodeId, NodeId)> {
        self.io_pairs(|k| matches!(k, EdgeKind::ProducesOutput { .. }))
    }

    /// (tool, parameter) pairs of every `requires_input` edge.
    pub fn input_pairs(&self) -> Vec<(NodeId, NodeId)> {
        self.io_pairs(|k| matches!(k, EdgeKind::RequiresInput { .. }))
    }

    fn io_pairs(&self, keep: impl Fn(&EdgeKind) -> bool) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<_> = self
            .edges
            .iter()
            .filter(|e| keep(&e.kind))
            .map(|e| (e.source, e.target))
            .collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for node in &self.nodes {
            match node {
                Node::Tool(_) => stats.tool_nodes += 1,
                Node::Parameter(_) => stats.parameter_nodes += 1,
            }
        }
        for edge in &self.edges {
            match edge.kind {
                EdgeKind::RequiresInput { .. } | EdgeKind::ProducesOutput { .. } => stats.io_edges += 1,
                EdgeKind::PotentialFlow(_) => stats.flow_edges += 1,
                EdgeKind::SemanticFlow(_) => stats.semantic_edges += 1,
            }
        }
        let n = self.nodes.len() as f64;
        if n >= 2.0 {
            stats.density = self.edges.len() as f64 / (n * (n - 1.0));
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(collection: &str, name: &str) -> ToolNode {
        ToolNode {
            id: ToolNode::tool_id(collection, name),
            tool_name: name.to_string(),
            source_collection: collection.to_string(),
            endpoint: None,
            example_invocation: None,
            status_code: None,
            success: None,
            timestamp: None,
        }
    }

    fn exact(path: &str) -> EdgeKind {
        EdgeKind::PotentialFlow(PotentialFlow {
            output_path: ParameterPath::parse(path),
            input_path: ParameterPath::parse(path),
            confidence: 1.0,
            match_type: MatchType::Exact,
        })
    }

    #[test]
    fn test_upsert_tool_reuses_existing() {
        let mut graph = ApiGraph::new();
        let (a, created) = graph.upsert_tool(tool("fms", "shipit"));
        assert!(created);
        let (b, created) = graph.upsert_tool(tool("fms", "shipit"));
        assert!(!created);
        assert_eq!(a, b);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.tool(a).unwrap().id, "fms.shipit");
    }

    #[test]
    fn test_parameter_shared_and_types_accumulate() {
        let mut graph = ApiGraph::new();
        let path = ParameterPath::parse("order.id");
        let a = graph.upsert_parameter(&path, DataType::String, &json!("A1"));
        let b = graph.upsert_parameter(&path, DataType::Integer, &json!(42));
        assert_eq!(a, b);
        let param = graph.parameter(a).unwrap();
        assert_eq!(param.sample, Some(json!("A1")));
        assert_eq!(param.type_label(), "string|integer");
        assert_eq!(graph.parameter_by_path("order.id"), Some(a));
    }

    #[test]
    fn test_tool_id_does_not_alias_parameter_path() {
        let mut graph = ApiGraph::new();
        let (t, _) = graph.upsert_tool(tool("order", "id"));
        let p = graph.upsert_parameter(&ParameterPath::parse("order.id"), DataType::String, &json!("x"));
        assert_ne!(t, p);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_io_edge_direction_enforced() {
        let mut graph = ApiGraph::new();
        let (t, _) = graph.upsert_tool(tool("a", "x"));
        let p = graph.upsert_parameter(&ParameterPath::parse("id"), DataType::String, &json!("1"));
        let kind = EdgeKind::RequiresInput { data_type: DataType::String };
        assert!(graph.add_edge(t, p, kind.clone()).is_ok());
        assert!(matches!(graph.add_edge(p, t, kind.clone()), Err(ApigraphError::Graph(_))));
        assert!(graph.add_edge(p, p, kind).is_err());
    }

    #[test]
    fn test_flow_edges_require_distinct_tools() {
        let mut graph = ApiGraph::new();
        let (a, _) = graph.upsert_tool(tool("a", "x"));
        let (b, _) = graph.upsert_tool(tool("b", "y"));
        assert!(graph.add_edge(a, b, exact("id")).is_ok());
        assert!(graph.add_edge(a, a, exact("id")).is_err());
    }

    #[test]
    fn test_duplicate_edge_is_reused_but_parallel_edges_kept() {
        let mut graph = ApiGraph::new();
        let (a, _) = graph.upsert_tool(tool("a", "x"));
        let (b, _) = graph.upsert_tool(tool("b", "y"));
        let first = graph.add_edge(a, b, exact("id")).unwrap();
        let again = graph.add_edge(a, b, exact("id")).unwrap();
        assert_eq!(first, again);
        graph.add_edge(a, b, exact("wbn")).unwrap();
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let mut graph = ApiGraph::new();
        let (a, _) = graph.upsert_tool(tool("a", "x"));
        let (b, _) = graph.upsert_tool(tool("b", "y"));
        let kind = EdgeKind::SemanticFlow(SemanticFlow {
            output_path: ParameterPath::parse("order_id"),
            input_path: ParameterPath::parse("order_number"),
            confidence: 1.4,
            reasoning: "same order".to_string(),
        });
        assert!(graph.add_edge(a, b, kind).is_err());
    }

    #[test]
    fn test_stats() {
        let mut graph = ApiGraph::new();
        assert_eq!(graph.stats(), GraphStats::default());
        let (a, _) = graph.upsert_tool(tool("a", "x"));
        let (b, _) = graph.upsert_tool(tool("b", "y"));
        let p = graph.upsert_parameter(&ParameterPath::parse("id"), DataType::String, &json!("1"));
        graph.add_edge(a, p, EdgeKind::ProducesOutput { data_type: DataType::String }).unwrap();
        graph.add_edge(b, p, EdgeKind::RequiresInput { data_type: DataType::String }).unwrap();
        graph.add_edge(a, b, exact("id")).unwrap();
        let stats = graph.stats();
        assert_eq!(stats.tool_nodes, 2);
        assert_eq!(stats.parameter_nodes, 1);
        assert_eq!(stats.io_edges, 2);
        assert_eq!(stats.flow_edges, 1);
        assert!((stats.density - 0.5).abs() < 1e-9);
        assert_eq!(graph.output_pairs(), vec![(a, p)]);
        assert_eq!(graph.input_pairs(), vec![(b, p)]);
    }
}
