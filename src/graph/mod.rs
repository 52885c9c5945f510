//! Tool/parameter graph: key flattening, the arena graph model and the
//! record-driven builder.
//!
//! Tools (`collection.tool_name`) point at the parameter paths they consume
//! (`requires_input`) and produce (`produces_output`). Flow edges between
//! tools are added later by [`crate::flows`] and [`crate::semantic`].

mod builder;
mod flatten;
mod model;
mod path;

pub use builder::{build_graph, GraphBuilder};
pub use flatten::{flatten, flatten_payload, try_flatten_payload, DataType, FlatParam};
pub use model::{
    ApiGraph, Edge, EdgeId, EdgeKind, GraphStats, MatchType, Node, NodeId, ParameterNode, PotentialFlow,
    SemanticFlow, ToolNode,
};
pub use path::ParameterPath;
