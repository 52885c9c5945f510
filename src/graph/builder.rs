//! Graph construction from API records.

use super::flatten::try_flatten_payload;
use super::{ApiGraph, EdgeKind, FlatParam, NodeId, ToolNode};
use crate::ingest::ApiRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Input,
    Output,
}

/// Populates an [`ApiGraph`] from a sequence of records.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: ApiGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record: its tool node plus input/output parameter edges.
    ///
    /// Returns `None` when the record was skipped for lacking a tool name.
    /// A malformed payload only drops that payload's edges.
    pub fn add_record(&mut self, record: &ApiRecord) -> Option<NodeId> {
        let tool_name = record.tool_name.trim();
        if tool_name.is_empty() {
            log::warn!(
                "Skipping record with empty tool_name from collection '{}'",
                record.source_collection
            );
            return None;
        }

        let (tool_id, created) = self.graph.upsert_tool(ToolNode {
            id: ToolNode::tool_id(&record.source_collection, tool_name),
            tool_name: tool_name.to_string(),
            source_collection: record.source_collection.clone(),
            endpoint: record.api_endpoint.clone(),
            example_invocation: record.example_invocation.clone(),
            status_code: record.status_code,
            success: record.success,
            timestamp: record.timestamp.clone(),
        });
        if !created {
            log::warn!(
                "Tool {}.{} seen more than once; reusing existing node",
                record.source_collection,
                tool_name
            );
        }

        self.add_payload(tool_id, record, Role::Input);
        self.add_payload(tool_id, record, Role::Output);
        Some(tool_id)
    }

    fn add_payload(&mut self, tool_id: NodeId, record: &ApiRecord, role: Role) {
        let text = match role {
            Role::Input => record.input_payload.as_deref(),
            Role::Output => record.output_payload.as_deref(),
        };

        let params: Vec<FlatParam> = match try_flatten_payload(text) {
            Ok(params) => params,
            Err(e) => {
                log::warn!(
                    "Malformed {} payload for {}.{}: {}",
                    if role == Role::Input { "input" } else { "output" },
                    record.source_collection,
                    record.tool_name,
                    e
                );
                return;
            }
        };

        for param in params {
            let param_id = self.graph.upsert_parameter(&param.path, param.data_type, &param.sample);
            let kind = match role {
                Role::Input => EdgeKind::RequiresInput { data_type: param.data_type },
                Role::Output => EdgeKind::ProducesOutput { data_type: param.data_type },
            };
            if let Err(e) = self.graph.add_edge(tool_id, param_id, kind) {
                log::error!("Failed to link {} to {}: {}", record.tool_name, param.path, e);
            }
        }
    }

    /// Add every record in order and hand back the graph.
    pub fn build(mut self, records: &[ApiRecord]) -> ApiGraph {
        log::info!("Building graph from {} API records", records.len());
        for record in records {
            self.add_record(record);
        }
        log::info!(
            "Graph built: {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        self.graph
    }
}

/// Build a fresh graph from `records`.
pub fn build_graph(records: &[ApiRecord]) -> ApiGraph {
    GraphBuilder::new().build(records)
}
