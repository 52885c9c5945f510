//! The narrow interface to whatever judges semantic parameter matches.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamRole {
    Input,
    Output,
}

/// What the service gets to see about one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterInfo {
    /// Full parameter path.
    pub name: String,
    /// Observed types, e.g. `string` or `integer|string`.
    pub data_type: String,
    pub sample_value: Option<JsonValue>,
    /// A representative tool using the parameter in this role.
    pub tool_id: String,
    pub role: ParamRole,
}

/// One bounded request: output-side and input-side parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchBatch {
    pub outputs: Vec<ParameterInfo>,
    pub inputs: Vec<ParameterInfo>,
}

impl MatchBatch {
    /// Item count (both sides).
    pub fn len(&self) -> usize {
        self.outputs.len() + self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.inputs.is_empty()
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|p| p.name == name)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|p| p.name == name)
    }
}

/// A match proposed by the service. Untrusted until validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub output_param: String,
    pub input_param: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Judges which outputs in a batch feed which inputs.
///
/// Errors are classified by variant: `ServiceUnavailable` is retried,
/// `ServiceRejected` on the first request disables semantic matching for the
/// run, anything else skips the batch.
#[async_trait]
pub trait SemanticService: Send + Sync {
    async fn submit(&self, batch: &MatchBatch) -> Result<Vec<MatchCandidate>>;
}
