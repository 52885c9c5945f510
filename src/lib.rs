pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod flows;
pub mod graph;
pub mod ingest;
pub mod semantic;

pub use config::Config;
pub use error::{ApigraphError, Result};
pub use export::{export, ExportFormat};
pub use flows::{detect_flows, FlowOptions, FlowSummary};
pub use graph::{build_graph, ApiGraph, GraphStats};
pub use ingest::ApiRecord;
pub use semantic::{augment, SemanticOptions, SemanticReport, SemanticService};
