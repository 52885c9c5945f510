//! Candidate pair collection and request batching.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::service::{MatchBatch, ParamRole, ParameterInfo};
use crate::graph::{ApiGraph, EdgeKind, NodeId};

/// Ordered (output path, input path) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathPair {
    pub output: String,
    pub input: String,
}

impl PathPair {
    pub fn new(output: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            input: input.into(),
        }
    }
}

/// Which tools produce and consume each parameter path.
#[derive(Debug, Default)]
pub struct ParameterUsage {
    pub producers: BTreeMap<String, Vec<NodeId>>,
    pub consumers: BTreeMap<String, Vec<NodeId>>,
}

impl ParameterUsage {
    pub fn from_graph(graph: &ApiGraph) -> Self {
        let mut usage = Self::default();
        for (tool, param) in graph.output_pairs() {
            if let Some(p) = graph.parameter(param) {
                usage.producers.entry(p.id()).or_default().push(tool);
            }
        }
        for (tool, param) in graph.input_pairs() {
            if let Some(p) = graph.parameter(param) {
                usage.consumers.entry(p.id()).or_default().push(tool);
            }
        }
        usage
    }
}

/// A pair worth asking about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePair {
    pub pair: PathPair,
    /// Some producer and consumer come from different collections.
    pub cross_collection: bool,
}

/// Every (output, input) path pair that could yield a semantic edge.
///
/// Identical paths and pairs already linked by a name-based flow are left
/// out, as are pairs whose only producer/consumer combination is one tool.
/// Cross-collection pairs come first, each group in path order.
pub fn candidate_pairs(graph: &ApiGraph, usage: &ParameterUsage) -> Vec<CandidatePair> {
    let already_linked: HashSet<PathPair> = graph
        .edges()
        .iter()
        .filter_map(|e| match &e.kind {
            EdgeKind::PotentialFlow(f) => Some(PathPair::new(f.output_path.to_string(), f.input_path.to_string())),
            _ => None,
        })
        .collect();

    let collection = |id: NodeId| graph.tool(id).map(|t| t.source_collection.as_str()).unwrap_or("");

    let mut candidates = Vec::new();
    for (output, producers) in &usage.producers {
        for (input, consumers) in &usage.consumers {
            if output == input {
                continue;
            }
            let pair = PathPair::new(output.clone(), input.clone());
            if already_linked.contains(&pair) {
                continue;
            }

            let mut any_pair = false;
            let mut cross_collection = false;
            for &p in producers {
                for &c in consumers {
                    if p == c {
                        continue;
                    }
                    any_pair = true;
                    cross_collection |= collection(p) != collection(c);
                }
            }
            if any_pair {
                candidates.push(CandidatePair { pair, cross_collection });
            }
        }
    }

    // stable: keeps path order inside each group
    candidates.sort_by_key(|c| !c.cross_collection);
    candidates
}

/// A request plus the pairs its answer settles.
#[derive(Debug, Clone)]
pub struct PlannedBatch {
    pub request: MatchBatch,
    pub pairs: BTreeSet<PathPair>,
}

fn parameter_info(graph: &ApiGraph, usage: &ParameterUsage, name: &str, role: ParamRole) -> ParameterInfo {
    let tools = match role {
        ParamRole::Output => usage.producers.get(name),
        ParamRole::Input => usage.consumers.get(name),
    };
    let tool_id = tools
        .and_then(|t| t.first())
        .and_then(|id| graph.tool(*id))
        .map(|t| t.id.clone())
        .unwrap_or_default();
    let param = graph.parameter_by_path(name).and_then(|id| graph.parameter(id));

    ParameterInfo {
        name: name.to_string(),
        data_type: param.map(|p| p.type_label()).unwrap_or_default(),
        sample_value: param.and_then(|p| p.sample.clone()),
        tool_id,
        role,
    }
}

/// Group pending pairs into requests of at most `max_items` parameters.
///
/// Pairs are taken in order and added to the open batch while its distinct
/// output + input count fits. A closed batch settles every pending pair in
/// its outputs x inputs product, not only the ones that opened it.
pub fn plan_batches(
    graph: &ApiGraph,
    usage: &ParameterUsage,
    pending: &[CandidatePair],
    max_items: usize,
) -> Vec<PlannedBatch> {
    let max_items = max_items.max(2);
    let pending_set: HashSet<&PathPair> = pending.iter().map(|c| &c.pair).collect();
    let mut settled: HashSet<PathPair> = HashSet::new();
    let mut batches = Vec::new();

    let mut outputs: Vec<String> = Vec::new();
    let mut inputs: Vec<String> = Vec::new();

    let mut close = |outputs: &mut Vec<String>, inputs: &mut Vec<String>, settled: &mut HashSet<PathPair>| {
        if outputs.is_empty() {
            return;
        }
        let mut pairs = BTreeSet::new();
        for o in outputs.iter() {
            for i in inputs.iter() {
                let pair = PathPair::new(o.clone(), i.clone());
                if pending_set.contains(&pair) && !settled.contains(&pair) {
                    settled.insert(pair.clone());
                    pairs.insert(pair);
                }
            }
        }
        let request = MatchBatch {
            outputs: outputs.drain(..).map(|o| parameter_info(graph, usage, &o, ParamRole::Output)).collect(),
            inputs: inputs.drain(..).map(|i| parameter_info(graph, usage, &i, ParamRole::Input)).collect(),
        };
        batches.push(PlannedBatch { request, pairs });
    };

    for candidate in pending {
        let pair = &candidate.pair;
        if settled.contains(pair) {
            continue;
        }
        let new_output = !outputs.contains(&pair.output);
        let new_input = !inputs.contains(&pair.input);
        let grown = outputs.len() + inputs.len() + new_output as usize + new_input as usize;
        if grown > max_items {
            close(&mut outputs, &mut inputs, &mut settled);
            // the closed batch may have settled this pair already
            if settled.contains(pair) {
                continue;
            }
        }
        if !outputs.contains(&pair.output) {
            outputs.push(pair.output.clone());
        }
        if !inputs.contains(&pair.input) {
            inputs.push(pair.input.clone());
        }
    }
    close(&mut outputs, &mut inputs, &mut settled);

    batches
}
