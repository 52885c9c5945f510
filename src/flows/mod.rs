//! Name-based flow detection between tools.

mod detector;
pub mod similarity;

pub use detector::{detect_flows, find_flows, DetectedFlow, FlowOptions, FlowSummary};
