use crate::config::SemanticConfig;
use crate::error::{ApigraphError, Result};
use crate::semantic::service::{MatchBatch, MatchCandidate, ParameterInfo, SemanticService};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::Write as _;
use std::time::Duration;
use url::Url;

const SYSTEM_PROMPT: &str = "You match API parameters that carry the same data. Answer with JSON only.";

/// Request structure for the chat completions API
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response structure from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Semantic matcher backed by an OpenAI-compatible chat completions endpoint.
///
/// One [`MatchBatch`] becomes one request. Retries, caching and concurrency
/// are handled by the caller; this type only maps failures onto
/// `ServiceUnavailable` (retry) and `ServiceRejected` (stop).
pub struct OpenAiSemanticService {
    client: Client,
    api_key: String,
    model: String,
    endpoint: Url,
}

impl OpenAiSemanticService {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_key: String, model: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ApigraphError::Config(format!("Invalid semantic base_url '{}': {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("chat/completions")
            .map_err(|e| ApigraphError::Config(format!("Invalid semantic base_url '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApigraphError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint,
        })
    }

    /// Build the service from configuration.
    ///
    /// Returns `Ok(None)` when the API key variable is unset or empty so the
    /// caller can carry on without semantic matching.
    pub fn from_config(config: &SemanticConfig) -> Result<Option<Self>> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                log::warn!(
                    "Environment variable {} not set; semantic matching unavailable",
                    config.api_key_env
                );
                return Ok(None);
            }
        };
        Self::new(
            api_key,
            config.model.clone(),
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
        .map(Some)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn describe(param: &ParameterInfo, out: &mut String) {
    let _ = write!(out, "- {} ({})", param.name, param.data_type);
    if let Some(sample) = &param.sample_value {
        let mut sample = sample.to_string();
        if sample.chars().count() > 60 {
            sample = sample.chars().take(57).collect::<String>() + "...";
        }
        let _ = write!(out, " e.g. {}", sample);
    }
    if !param.tool_id.is_empty() {
        let _ = write!(out, " [{}]", param.tool_id);
    }
    out.push('\n');
}

/// Render the user prompt for one batch.
pub fn build_prompt(batch: &MatchBatch) -> String {
    let mut prompt = String::from(
        "Identify which OUTPUT parameters (produced by one API) carry THE SAME DATA as \
INPUT parameters (consumed by another API).

Rules:
1. Only match parameters that hold exactly the same field or value
2. Abbreviations count (\"id\" = \"identifier\", \"wbn\" = \"waybill number\")
3. Synonyms count (\"customer_name\" = \"client_name\")
4. Naming conventions do not matter (\"user_id\" = \"userId\")
5. Do not match fields that are merely related
6. Only use parameter names exactly as listed below

OUTPUT parameters:
",
    );
    for param in &batch.outputs {
        describe(param, &mut prompt);
    }
    prompt.push_str("\nINPUT parameters:\n");
    for param in &batch.inputs {
        describe(param, &mut prompt);
    }
    prompt.push_str(
        "
Return a JSON object of the form:
{\"matches\": [{\"output_param\": \"order_id\", \"input_param\": \"order_number\", \
\"confidence\": 0.95, \"reasoning\": \"both identify the order\"}]}
Confidence is between 0 and 1. Return {\"matches\": []} if nothing matches.
",
    );
    prompt
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the model's reply: `{"matches": [...]}` or a bare array.
///
/// Items that do not deserialize are skipped with a warning; a reply that is
/// not JSON at all is an error.
pub fn parse_response(text: &str) -> Result<Vec<MatchCandidate>> {
    let value: JsonValue = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ApigraphError::ServiceResponse(format!("Reply is not JSON: {}", e)))?;

    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut map) => match map.remove("matches") {
            Some(JsonValue::Array(items)) => items,
            _ => {
                return Err(ApigraphError::ServiceResponse(
                    "Reply object has no \"matches\" array".to_string(),
                ))
            }
        },
        other => {
            return Err(ApigraphError::ServiceResponse(format!(
                "Unexpected reply shape: {}",
                other
            )))
        }
    };

    let mut matches = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<MatchCandidate>(item) {
            Ok(candidate) => matches.push(candidate),
            Err(e) => log::warn!("Skipping invalid match: {}", e),
        }
    }
    Ok(matches)
}

/// Map an unsuccessful HTTP status onto the retry/stop distinction.
pub fn classify_status(status: StatusCode, body: &str) -> ApigraphError {
    let message = format!("OpenAI API error {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        ApigraphError::ServiceUnavailable(message)
    } else {
        ApigraphError::ServiceRejected(message)
    }
}

#[async_trait]
impl SemanticService for OpenAiSemanticService {
    async fn submit(&self, batch: &MatchBatch) -> Result<Vec<MatchCandidate>> {
        if batch.outputs.is_empty() || batch.inputs.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_prompt(batch);
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApigraphError::ServiceUnavailable(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(classify_status(status, &body));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApigraphError::ServiceResponse(format!("Failed to parse response: {}", e)))?;
        log::debug!(
            "Semantic request with {} parameters took {:?}",
            batch.len(),
            start.elapsed()
        );

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ApigraphError::ServiceResponse("Empty response from OpenAI API".to_string()))?;
        parse_response(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::service::ParamRole;
    use serde_json::json;

    fn param(name: &str, role: ParamRole) -> ParameterInfo {
        ParameterInfo {
            name: name.to_string(),
            data_type: "string".to_string(),
            sample_value: Some(json!("W123")),
            tool_id: "fms.shipit".to_string(),
            role,
        }
    }

    #[test]
    fn test_endpoint_join() {
        for base in ["https://api.openai.com/v1", "https://api.openai.com/v1/"] {
            let service =
                OpenAiSemanticService::new("k".to_string(), "m".to_string(), base, Duration::from_secs(5)).unwrap();
            assert_eq!(service.endpoint().as_str(), "https://api.openai.com/v1/chat/completions");
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let result = OpenAiSemanticService::new("k".to_string(), "m".to_string(), "not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(ApigraphError::Config(_))));
    }

    #[test]
    fn test_prompt_lists_both_sides() {
        let batch = MatchBatch {
            outputs: vec![param("wbn", ParamRole::Output)],
            inputs: vec![param("tracking_ref", ParamRole::Input)],
        };
        let prompt = build_prompt(&batch);
        let outputs_at = prompt.find("OUTPUT parameters:").unwrap();
        let inputs_at = prompt.find("INPUT parameters:").unwrap();
        let wbn_at = prompt.find("- wbn (string) e.g. \"W123\" [fms.shipit]").unwrap();
        let ref_at = prompt.find("- tracking_ref (string)").unwrap();
        assert!(outputs_at < wbn_at && wbn_at < inputs_at && inputs_at < ref_at);
    }

    #[test]
    fn test_parse_matches_object() {
        let text = r#"{"matches": [
            {"output_param": "wbn", "input_param": "tracking_ref", "confidence": 0.9, "reasoning": "waybill"},
            {"output_param": "x"}
        ]}"#;
        let matches = parse_response(text).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].input_param, "tracking_ref");
    }

    #[test]
    fn test_parse_bare_array_and_fenced() {
        let text = "```json\n[{\"output_param\": \"a\", \"input_param\": \"b\", \"confidence\": 0.8}]\n```";
        let matches = parse_response(text).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].reasoning, "");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_response("sorry, no"), Err(ApigraphError::ServiceResponse(_))));
        assert!(matches!(parse_response(r#"{"result": []}"#), Err(ApigraphError::ServiceResponse(_))));
        assert!(parse_response(r#"{"matches": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, "").is_transient());
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key"),
            ApigraphError::ServiceRejected(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, ""),
            ApigraphError::ServiceRejected(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_side_skips_request() {
        let service = OpenAiSemanticService::new(
            "k".to_string(),
            "m".to_string(),
            "http://127.0.0.1:9",
            Duration::from_secs(1),
        )
        .unwrap();
        let batch = MatchBatch {
            outputs: vec![param("wbn", ParamRole::Output)],
            inputs: vec![],
        };
        assert!(service.submit(&batch).await.unwrap().is_empty());
    }
}
