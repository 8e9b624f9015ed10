//! Gemini `generateContent` client.
//!
//! Action requests travel as `functionCall` parts and action results as
//! `functionResponse` parts; snapshots are sent as `inlineData`.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::LlmError;
use super::{
    ConversationTurn, FunctionDeclaration, InferenceBackend, InferenceRequest, InferenceResponse,
    Part, Role, TokenUsage,
};
use crate::actions::{ActionArgs, ActionCall};
use crate::config::InferenceConfig;
use crate::surface::Snapshot;
use crate::util::preview;

/// Gemini API client. Makes exactly one HTTP request per call.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for the configured model.
    pub fn new(config: &InferenceConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::network_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.api_url.trim_end_matches('/'),
                config.model
            ),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Create an LlmError from HTTP response status and body.
    fn create_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        // Prefer the service's own message when the body is a JSON error
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| preview(body, 500).to_string());

        LlmError::from_status(status.as_u16(), message)
    }
}

#[async_trait]
impl InferenceBackend for GeminiClient {
    async fn generate(&self, request: InferenceRequest<'_>) -> Result<InferenceResponse, LlmError> {
        let body = GeminiRequest::build(request);

        tracing::debug!(
            model = %self.model,
            turns = request.contents.len(),
            "Sending request to inference service"
        );

        let response = match self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(LlmError::network_error(format!("Request timeout: {}", e)));
                } else if e.is_connect() {
                    return Err(LlmError::network_error(format!("Connection failed: {}", e)));
                } else {
                    return Err(LlmError::network_error(format!("Request failed: {}", e)));
                }
            }
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let error = Self::create_error(status, &text);
            tracing::error!("Inference request failed: {}", error);
            return Err(error);
        }

        parse_response(&text)
    }
}

// ==================== Wire format ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    tools: Vec<GeminiTool>,
}

impl GeminiRequest {
    fn build(request: InferenceRequest<'_>) -> Self {
        Self {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(request.system_instruction)],
            },
            contents: request.contents.iter().map(GeminiContent::from_turn).collect(),
            tools: vec![GeminiTool {
                function_declarations: request.actions.to_vec(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn from_turn(turn: &ConversationTurn) -> Self {
        Self {
            role: Some(turn.role.as_str().to_string()),
            parts: turn.parts.iter().map(GeminiPart::from_part).collect(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    /// Set on reasoning parts, which are never treated as answers
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn from_part(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self::text(text),
            Part::Image(snapshot) => Self {
                inline_data: Some(InlineData {
                    mime_type: snapshot.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&snapshot.data),
                }),
                ..Default::default()
            },
            Part::ActionRequest(call) => Self {
                function_call: Some(FunctionCall {
                    name: call.name.clone(),
                    args: call
                        .args
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                }),
                ..Default::default()
            },
            Part::ActionResult(result) => Self {
                function_response: Some(FunctionResponse {
                    name: result.intent_name().to_string(),
                    response: serde_json::json!({ "status": result.status() }),
                }),
                ..Default::default()
            },
        }
    }

    /// Convert a response part. Parts with no payload we understand are dropped.
    fn into_part(self) -> Option<Part> {
        if self.thought == Some(true) {
            return None;
        }
        if let Some(call) = self.function_call {
            return Some(Part::ActionRequest(ActionCall {
                name: call.name,
                args: stringify_args(call.args),
            }));
        }
        if let Some(text) = self.text {
            return Some(Part::Text(text));
        }
        if let Some(inline) = self.inline_data {
            let data = base64::engine::general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .ok()?;
            return Some(Part::Image(Snapshot {
                mime_type: inline.mime_type,
                data,
            }));
        }
        None
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

/// Flatten JSON arguments to strings: strings verbatim, everything else as JSON text.
fn stringify_args(args: serde_json::Map<String, Value>) -> ActionArgs {
    args.into_iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn parse_response(body: &str) -> Result<InferenceResponse, LlmError> {
    let parsed: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::parse_error(format!(
            "Failed to parse response: {}, body: {}",
            e,
            preview(body, 2000)
        ))
    })?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::parse_error("No candidates in response".to_string()))?;

    let parts = candidate
        .content
        .unwrap_or_default()
        .parts
        .into_iter()
        .filter_map(GeminiPart::into_part)
        .collect();

    Ok(InferenceResponse {
        turn: ConversationTurn {
            role: Role::Model,
            parts,
        },
        finish_reason: candidate.finish_reason,
        usage: parsed
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionResult;

    #[test]
    fn request_uses_gemini_part_shapes() {
        let contents = vec![
            ConversationTurn::user(vec![
                Part::text("Open settings"),
                Part::Image(Snapshot::jpeg(vec![1, 2, 3])),
            ]),
            ConversationTurn::model(vec![Part::ActionRequest(
                ActionCall::new("click_at").with_arg("x", "500").with_arg("y", "120"),
            )]),
            ConversationTurn::user(vec![
                Part::ActionResult(ActionResult::failure("click_at")),
                Part::Image(Snapshot::jpeg(vec![4])),
            ]),
        ];
        let declarations = vec![FunctionDeclaration {
            name: "click_at".to_string(),
            description: "tap".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }];

        let body = serde_json::to_value(GeminiRequest::build(InferenceRequest {
            system_instruction: "You drive a phone.",
            contents: &contents,
            actions: &declarations,
        }))
        .unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You drive a phone.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Open settings");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["name"], "click_at");
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["args"]["x"], "500");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"]["status"],
            "failed"
        );
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "click_at");
    }

    #[test]
    fn parses_function_call_response() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"functionCall": {"name": "click_at", "args": {"x": 500, "y": 250}}},
                        {"text": "Tapping the search field"}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 30, "totalTokenCount": 1230}
        }"#;

        let response = parse_response(body).unwrap();
        assert_eq!(response.turn.role, Role::Model);
        assert_eq!(response.turn.parts.len(), 2);
        let call = response.turn.parts[0].as_action_request().unwrap();
        assert_eq!(call.name, "click_at");
        assert_eq!(call.args.get("x").map(String::as_str), Some("500"));
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.usage, Some(TokenUsage::new(1200, 30)));
    }

    #[test]
    fn thought_parts_are_dropped() {
        let body = r#"{"candidates": [{"content": {"parts": [
            {"text": "thinking about it", "thought": true},
            {"text": "Done"}
        ]}}]}"#;

        let response = parse_response(body).unwrap();
        assert_eq!(response.turn.parts, vec![Part::text("Done")]);
    }

    #[test]
    fn missing_content_yields_empty_turn() {
        let body = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response = parse_response(body).unwrap();
        assert!(response.turn.parts.is_empty());
        assert_eq!(response.finish_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn no_candidates_is_parse_error() {
        let err = parse_response(r#"{"candidates": []}"#).unwrap_err();
        assert_eq!(err.kind, crate::llm::LlmErrorKind::ParseError);
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = r#"{"error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}}"#;
        let err = GeminiClient::create_error(reqwest::StatusCode::FORBIDDEN, body);
        assert_eq!(err.kind, crate::llm::LlmErrorKind::Unauthorized);
        assert_eq!(err.message, "API key not valid");
    }
}
