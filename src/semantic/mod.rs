//! LLM-assisted detection of flows whose parameter names differ.

mod batch;
mod matcher;
pub mod openai;
mod service;

pub use batch::{candidate_pairs, plan_batches, CandidatePair, ParameterUsage, PathPair, PlannedBatch};
pub use matcher::{augment, SemanticOptions, SemanticReport};
pub use openai::OpenAiSemanticService;
pub use service::{MatchBatch, MatchCandidate, ParamRole, ParameterInfo, SemanticService};
