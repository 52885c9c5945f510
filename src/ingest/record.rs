use serde::{Deserialize, Serialize};

/// One recorded API call, as handed over by ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiRecord {
    pub tool_name: String,
    /// Collection the record came from (CSV file stem).
    pub source_collection: String,
    pub api_endpoint: Option<String>,
    /// Raw JSON text; may be empty or malformed.
    pub input_payload: Option<String>,
    /// Raw JSON text; may be empty or malformed.
    pub output_payload: Option<String>,
    pub status_code: Option<u16>,
    pub success: Option<bool>,
    /// Example invocation (e.g. a curl command).
    pub example_invocation: Option<String>,
    pub timestamp: Option<String>,
}

impl ApiRecord {
    /// Convenience constructor for the required fields.
    pub fn new(
        source_collection: impl Into<String>,
        tool_name: impl Into<String>,
        input_payload: impl Into<String>,
        output_payload: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            source_collection: source_collection.into(),
            input_payload: Some(input_payload.into()),
            output_payload: Some(output_payload.into()),
            ..Default::default()
        }
    }
}
