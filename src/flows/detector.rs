//! Exact and fuzzy producer -> consumer detection.

use std::collections::{BTreeMap, HashMap};

use super::similarity::{normalized_leaf, normalized_similarity};
use crate::graph::{ApiGraph, EdgeKind, MatchType, NodeId, PotentialFlow};

/// Switches for [`detect_flows`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlowOptions {
    pub fuzzy_enabled: bool,
    /// Minimum similarity for a fuzzy edge (0.0 to 1.0).
    pub fuzzy_threshold: f64,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            fuzzy_enabled: true,
            fuzzy_threshold: 0.8,
        }
    }
}

impl FlowOptions {
    pub fn with_threshold(fuzzy_threshold: f64) -> Self {
        Self {
            fuzzy_threshold,
            ..Self::default()
        }
    }

    pub fn exact_only() -> Self {
        Self {
            fuzzy_enabled: false,
            ..Self::default()
        }
    }
}

/// Number of `potential_flow` edges added per match type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowSummary {
    pub exact: usize,
    pub fuzzy: usize,
}

impl FlowSummary {
    pub fn total(&self) -> usize {
        self.exact + self.fuzzy
    }
}

/// A detected flow, not yet in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFlow {
    pub producer: NodeId,
    pub consumer: NodeId,
    pub flow: PotentialFlow,
}

/// Group `(tool, parameter)` pairs by parameter.
fn tools_by_parameter(pairs: Vec<(NodeId, NodeId)>) -> BTreeMap<NodeId, Vec<NodeId>> {
    let mut grouped: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for (tool, param) in pairs {
        grouped.entry(param).or_default().push(tool);
    }
    grouped
}

/// Find every exact and (optionally) fuzzy flow without touching the graph.
///
/// All qualifying pairs are returned; a tool is never linked to itself.
pub fn find_flows(graph: &ApiGraph, options: &FlowOptions) -> Vec<DetectedFlow> {
    let producers = tools_by_parameter(graph.output_pairs());
    let consumers = tools_by_parameter(graph.input_pairs());
    if producers.is_empty() || consumers.is_empty() {
        return Vec::new();
    }

    let mut flows = Vec::new();
    let mut push_pairs = |out_param: NodeId, in_param: NodeId, confidence: f64, match_type: MatchType| {
        let (Some(out_node), Some(in_node)) = (graph.parameter(out_param), graph.parameter(in_param)) else {
            return;
        };
        for &producer in &producers[&out_param] {
            for &consumer in &consumers[&in_param] {
                if producer == consumer {
                    continue;
                }
                flows.push(DetectedFlow {
                    producer,
                    consumer,
                    flow: PotentialFlow {
                        output_path: out_node.path.clone(),
                        input_path: in_node.path.clone(),
                        confidence,
                        match_type,
                    },
                });
            }
        }
    };

    for param in producers.keys() {
        if consumers.contains_key(param) {
            push_pairs(*param, *param, 1.0, MatchType::Exact);
        }
    }

    if options.fuzzy_enabled {
        let normalized: HashMap<NodeId, String> = producers
            .keys()
            .chain(consumers.keys())
            .filter_map(|id| graph.parameter(*id).map(|p| (*id, normalized_leaf(&p.path))))
            .collect();

        for out_param in producers.keys() {
            for in_param in consumers.keys() {
                if out_param == in_param {
                    continue;
                }
                let score = normalized_similarity(&normalized[out_param], &normalized[in_param]);
                if score >= options.fuzzy_threshold {
                    push_pairs(*out_param, *in_param, score, MatchType::Fuzzy);
                }
            }
        }
    }

    flows
}

/// Detect flows and add them to the graph as `potential_flow` edges.
///
/// An empty graph, or one without inputs or outputs, yields no edges.
pub fn detect_flows(graph: &mut ApiGraph, options: &FlowOptions) -> FlowSummary {
    log::info!("Detecting potential flows between APIs");
    let flows = find_flows(graph, options);

    let mut summary = FlowSummary::default();
    for detected in flows {
        let match_type = detected.flow.match_type;
        let before = graph.edge_count();
        match graph.add_edge(detected.producer, detected.consumer, EdgeKind::PotentialFlow(detected.flow)) {
            Ok(_) if graph.edge_count() == before => {}
            Ok(_) => match match_type {
                MatchType::Exact => summary.exact += 1,
                _ => summary.fuzzy += 1,
            },
            Err(e) => log::warn!("Dropping flow edge: {}", e),
        }
    }

    log::info!(
        "Added {} potential_flow edges ({} exact, {} fuzzy)",
        summary.total(),
        summary.exact,
        summary.fuzzy
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, Edge};
    use crate::ingest::ApiRecord;

    fn flow_edges(graph: &ApiGraph) -> Vec<&Edge> {
        graph
            .edges()
            .iter()
            .filter(|e| matches!(e.kind, EdgeKind::PotentialFlow(_)))
            .collect()
    }

    fn potential(edge: &Edge) -> &PotentialFlow {
        match &edge.kind {
            EdgeKind::PotentialFlow(f) => f,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_exact_match_single_edge() {
        let mut graph = build_graph(&[
            ApiRecord::new("fms", "shipit", "", r#"{"wbn": "W1"}"#),
            ApiRecord::new("hq", "track", r#"{"wbn": "W1"}"#, ""),
        ]);
        let summary = detect_flows(&mut graph, &FlowOptions::default());
        assert_eq!(summary, FlowSummary { exact: 1, fuzzy: 0 });

        let edges = flow_edges(&graph);
        assert_eq!(edges.len(), 1);
        assert_eq!(graph.tool(edges[0].source).unwrap().id, "fms.shipit");
        assert_eq!(graph.tool(edges[0].target).unwrap().id, "hq.track");
        let flow = potential(edges[0]);
        assert_eq!(flow.confidence, 1.0);
        assert_eq!(flow.match_type, MatchType::Exact);
        assert_eq!(flow.matching_param(), "wbn");
    }

    #[test]
    fn test_fuzzy_match_respects_threshold() {
        let records = vec![
            ApiRecord::new("fms", "shipit", "", r#"{"waybill_number": "W1"}"#),
            ApiRecord::new("hq", "track", r#"{"waybillNumber": "W1"}"#, ""),
        ];

        let mut graph = build_graph(&records);
        let summary = detect_flows(&mut graph, &FlowOptions::with_threshold(0.8));
        assert_eq!(summary, FlowSummary { exact: 0, fuzzy: 1 });
        let flow = potential(flow_edges(&graph)[0]);
        assert_eq!(flow.match_type, MatchType::Fuzzy);
        assert!(flow.confidence >= 0.8 && flow.confidence < 1.0);
        assert_eq!(flow.matching_param(), "waybill_number~waybillNumber");

        let mut strict = build_graph(&records);
        let summary = detect_flows(&mut strict, &FlowOptions::with_threshold(0.99));
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_fuzzy_disabled() {
        let mut graph = build_graph(&[
            ApiRecord::new("fms", "shipit", "", r#"{"waybill_number": "W1"}"#),
            ApiRecord::new("hq", "track", r#"{"waybillNumber": "W1"}"#, ""),
        ]);
        assert_eq!(detect_flows(&mut graph, &FlowOptions::exact_only()).total(), 0);
    }

    #[test]
    fn test_no_self_links() {
        let mut graph = build_graph(&[ApiRecord::new("crm", "update", r#"{"id": 1}"#, r#"{"id": 1}"#)]);
        assert_eq!(detect_flows(&mut graph, &FlowOptions::default()).total(), 0);
    }

    #[test]
    fn test_one_output_many_inputs_all_emitted() {
        let mut graph = build_graph(&[
            ApiRecord::new("fms", "create", "", r#"{"order_id": 1}"#),
            ApiRecord::new("hq", "track", r#"{"order_id": 1}"#, ""),
            ApiRecord::new("billing", "invoice", r#"{"order_id": 1}"#, ""),
            ApiRecord::new("billing", "refund", r#"{"orderId": 1}"#, ""),
        ]);
        let summary = detect_flows(&mut graph, &FlowOptions::default());
        assert_eq!(summary.exact, 2);
        assert_eq!(summary.fuzzy, 1);
    }

    #[test]
    fn test_flow_endpoints_have_matching_io_edges() {
        let mut graph = build_graph(&[
            ApiRecord::new("fms", "shipit", r#"{"orderId": 1}"#, r#"{"wbn": "W1", "order": {"id": 1}}"#),
            ApiRecord::new("hq", "track", r#"{"wbn": "W1", "order_id": 2}"#, r#"{"wbn": "W1"}"#),
        ]);
        detect_flows(&mut graph, &FlowOptions::default());
        let outputs = graph.output_pairs();
        let inputs = graph.input_pairs();
        for edge in flow_edges(&graph) {
            let flow = potential(edge);
            let out_param = graph.parameter_by_path(&flow.output_path.to_string()).unwrap();
            let in_param = graph.parameter_by_path(&flow.input_path.to_string()).unwrap();
            assert!(outputs.contains(&(edge.source, out_param)));
            assert!(inputs.contains(&(edge.target, in_param)));
            match flow.match_type {
                MatchType::Exact => assert_eq!(flow.confidence, 1.0),
                _ => assert!(flow.confidence >= 0.8 && flow.confidence < 1.0),
            }
        }
    }

    #[test]
    fn test_empty_graph_no_edges() {
        let mut graph = ApiGraph::new();
        assert_eq!(detect_flows(&mut graph, &FlowOptions::default()).total(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_detect_twice_is_idempotent() {
        let mut graph = build_graph(&[
            ApiRecord::new("fms", "shipit", "", r#"{"wbn": "W1"}"#),
            ApiRecord::new("hq", "track", r#"{"wbn": "W1"}"#, ""),
        ]);
        detect_flows(&mut graph, &FlowOptions::default());
        let edges = graph.edge_count();
        let again = detect_flows(&mut graph, &FlowOptions::default());
        assert_eq!(again.total(), 0);
        assert_eq!(graph.edge_count(), edges);
    }
}
