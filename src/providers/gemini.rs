//! Google Gemini provider
//!
//! Streams `models/{model}:streamGenerateContent?alt=sse` and turns each
//! SSE chunk into [`GenFragment`]s. Conversation turns map onto Gemini
//! `contents`: model tool calls become `functionCall` parts and tool results
//! become `functionResponse` parts in a user-role content.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::types::{
    normalize_arguments, ChatOptions, FragmentStream, GenFragment, LLMProvider,
    FRAGMENT_CHANNEL_CAPACITY,
};
use super::parse_provider_error;
use crate::config::DEFAULT_GEMINI_API_BASE;
use crate::error::{PilotError, ProviderError, Result};
use crate::session::{Part, Role, Turn};
use crate::tools::{sanitize_schema, ToolDefinition};

/// Gemini streaming provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    system_instruction: Option<String>,
    options: ChatOptions,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            model: model.to_string(),
            system_instruction: None,
            options: ChatOptions::default(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.api_base, self.model
        )
    }

    fn build_request(&self, history: &[Turn], tools: &[ToolDefinition]) -> GeminiRequest {
        let system_instruction = self.system_instruction.as_ref().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text { text: text.clone() }],
        });

        let generation_config =
            if self.options.max_tokens.is_some() || self.options.temperature.is_some() {
                Some(GenerationConfig {
                    max_output_tokens: self.options.max_tokens,
                    temperature: self.options.temperature,
                })
            } else {
                None
            };

        GeminiRequest {
            contents: convert_turns(history),
            system_instruction,
            tools: convert_tools(tools),
            generation_config,
        }
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn generate(&self, history: &[Turn], tools: &[ToolDefinition]) -> Result<FragmentStream> {
        let request = self.build_request(history, tools);
        debug!(
            model = %self.model,
            turns = history.len(),
            tools = tools.len(),
            "Gemini streamGenerateContent"
        );

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                PilotError::from(if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::ServerError(format!("request failed: {}", e))
                })
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map(|e| format!("Gemini API error: {}", e.error.message))
                .unwrap_or_else(|_| format!("Gemini API error: {}", body));
            return Err(parse_provider_error(status, &message).into());
        }

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = SseLineBuffer::default();
            tokio::pin!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::Stream(format!("stream read error: {}", e))))
                            .await;
                        return;
                    }
                };

                for data in buffer.push(&chunk) {
                    for item in parse_chunk(&data) {
                        let failed = item.is_err();
                        // Receiver gone: the run was cancelled or finished.
                        if tx.send(item).await.is_err() || failed {
                            return;
                        }
                    }
                }
            }

            if let Some(data) = buffer.finish() {
                for item in parse_chunk(&data) {
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Request conversion
// ============================================================================

fn convert_turns(history: &[Turn]) -> Vec<GeminiContent> {
    history
        .iter()
        .filter_map(|turn| {
            let role = match turn.role {
                Role::User | Role::ToolResult => "user",
                Role::Model => "model",
            };
            let parts: Vec<GeminiPart> = turn
                .parts
                .iter()
                .filter_map(|part| match part {
                    Part::Text { text } if text.is_empty() => None,
                    Part::Text { text } => Some(GeminiPart::Text { text: text.clone() }),
                    Part::ToolCallRequest {
                        name,
                        arguments,
                        signature,
                    } => Some(GeminiPart::FunctionCall {
                        function_call: FunctionCall {
                            name: name.clone(),
                            args: Value::Object(arguments.clone()),
                        },
                        thought_signature: signature.clone(),
                    }),
                    Part::ToolCallResult { name, result } => Some(GeminiPart::FunctionResponse {
                        function_response: FunctionResponse {
                            name: name.clone(),
                            response: json!({ "result": result }),
                        },
                    }),
                })
                .collect();
            (!parts.is_empty()).then(|| GeminiContent {
                role: Some(role.to_string()),
                parts,
            })
        })
        .collect()
}

/// Build Gemini function declarations. Schemas are sanitized and reduced to
/// an `OBJECT` with `properties` and `required`.
fn convert_tools(tools: &[ToolDefinition]) -> Option<Vec<GeminiTool>> {
    if tools.is_empty() {
        return None;
    }
    let function_declarations = tools
        .iter()
        .map(|tool| {
            let schema = sanitize_schema(&tool.parameters);
            let properties = schema
                .get("properties")
                .and_then(Value::as_object)
                .filter(|p| !p.is_empty())
                .cloned();
            let parameters = properties.map(|properties| {
                let required = schema.get("required").cloned().unwrap_or_else(|| json!([]));
                json!({
                    "type": "OBJECT",
                    "properties": properties,
                    "required": required,
                })
            });
            FunctionDeclaration {
                name: tool.name.clone(),
                description: if tool.description.is_empty() {
                    "A tool".to_string()
                } else {
                    tool.description.clone()
                },
                parameters,
            }
        })
        .collect();
    Some(vec![GeminiTool {
        function_declarations,
    }])
}

// ============================================================================
// Response parsing
// ============================================================================

/// Splits a byte stream into SSE `data:` payloads.
///
/// Buffers raw bytes so a multi-byte character split across network chunks
/// is decoded only once its line is complete.
#[derive(Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// Feed bytes, returning the data payloads of every completed line.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(data) = sse_data(&String::from_utf8_lossy(&line)) {
                out.push(data);
            }
        }
        out
    }

    /// Payload of a trailing line with no newline, if any.
    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        sse_data(&String::from_utf8_lossy(&rest))
    }
}

fn sse_data(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();
    (!data.is_empty() && data != "[DONE]").then(|| data.to_string())
}

/// Turn one SSE JSON payload into fragments.
fn parse_chunk(data: &str) -> Vec<std::result::Result<GenFragment, ProviderError>> {
    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Skipping unparseable Gemini chunk");
            return Vec::new();
        }
    };

    if let Some(err) = chunk.error {
        return vec![Err(ProviderError::Stream(format!(
            "Gemini API error: {}",
            err.message
        )))];
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return vec![Err(ProviderError::InvalidRequest(format!(
            "prompt blocked: {}",
            reason
        )))];
    }

    chunk
        .candidates
        .into_iter()
        .take(1)
        .filter_map(|c| c.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| match part {
            WirePart::FunctionCall {
                function_call,
                thought_signature,
            } => Some(normalize_arguments(function_call.args).map(|arguments| {
                GenFragment::tool_call(function_call.name, arguments)
                    .with_signature(thought_signature)
            })),
            WirePart::Text { text } if text.is_empty() => None,
            WirePart::Text { text } => Some(Ok(GenFragment::Text(text))),
            WirePart::Other(_) => None,
        })
        .collect()
}

// ============================================================================
// Gemini API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
        #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponse,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePart {
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
        #[serde(rename = "thoughtSignature", default)]
        thought_signature: Option<String>,
    },
    Text {
        text: String,
    },
    Other(serde::de::IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_stream_url() {
        let p = GeminiProvider::new("key", "gemini-flash-latest").with_api_base("http://local/");
        assert_eq!(
            p.stream_url(),
            "http://local/v1beta/models/gemini-flash-latest:streamGenerateContent?alt=sse"
        );
        assert_eq!(p.name(), "gemini");
        assert_eq!(p.model(), "gemini-flash-latest");
    }

    #[test]
    fn test_convert_turns_roles_and_parts() {
        let history = vec![
            Turn::user("list pods"),
            Turn::model(vec![Part::tool_call_request(
                "list_pods",
                args(&[("namespace", json!("default"))]),
            )]),
            Turn::tool_results(vec![Part::tool_call_result("list_pods", "pod-a Running")]),
            Turn::model_text(""),
        ];
        let contents = serde_json::to_value(convert_turns(&history)).unwrap();
        assert_eq!(
            contents,
            json!([
                {"role": "user", "parts": [{"text": "list pods"}]},
                {"role": "model", "parts": [{"functionCall": {"name": "list_pods", "args": {"namespace": "default"}}}]},
                {"role": "user", "parts": [{"functionResponse": {"name": "list_pods", "response": {"result": "pod-a Running"}}}]}
            ])
        );
    }

    #[test]
    fn test_convert_tools_sanitizes_schema() {
        let tools = vec![
            ToolDefinition::new(
                "list_pods",
                "List pods",
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {"namespace": {"type": "string", "anyOf": [{"type": "string"}]}},
                    "required": ["namespace"]
                }),
            ),
            ToolDefinition::new("cluster_info", "", json!({"type": "object", "properties": {}})),
        ];
        let value = serde_json::to_value(convert_tools(&tools)).unwrap();
        assert_eq!(
            value,
            json!([{
                "functionDeclarations": [
                    {
                        "name": "list_pods",
                        "description": "List pods",
                        "parameters": {
                            "type": "OBJECT",
                            "properties": {"namespace": {"type": "string"}},
                            "required": ["namespace"]
                        }
                    },
                    {"name": "cluster_info", "description": "A tool"}
                ]
            }])
        );
        assert!(convert_tools(&[]).is_none());
    }

    #[test]
    fn test_build_request_includes_system_and_config() {
        let p = GeminiProvider::new("k", "m")
            .with_system_instruction("be brief")
            .with_options(ChatOptions::new().with_max_tokens(256));
        let req = serde_json::to_value(p.build_request(&[Turn::user("hi")], &[])).unwrap();
        assert_eq!(req["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(req["generationConfig"]["maxOutputTokens"], 256);
        assert!(req.get("tools").is_none());
    }

    #[test]
    fn test_sse_line_buffer_handles_split_chunks() {
        let mut buf = SseLineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\n\ndata: [DONE]\n"), vec!["{\"a\":1}".to_string()]);
        assert!(buf.push(b"event: x\ndata: {\"b\":2}").is_empty());
        assert_eq!(buf.finish(), Some("{\"b\":2}".to_string()));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_parse_chunk_text_and_function_call() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[
            {"text":"Checking"},
            {"functionCall":{"name":"list_pods","args":{"namespace":"default"}},"thoughtSignature":"abc"}
        ]}}]}"#;
        let fragments: Vec<GenFragment> = parse_chunk(data).into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(
            fragments,
            vec![
                GenFragment::text("Checking"),
                GenFragment::tool_call("list_pods", args(&[("namespace", json!("default"))]))
                    .with_signature(Some("abc".into())),
            ]
        );
    }

    #[test]
    fn test_signature_echoed_beside_function_call() {
        let history = vec![
            Turn::user("list pods"),
            Turn::model(vec![Part::ToolCallRequest {
                name: "list_pods".into(),
                arguments: Map::new(),
                signature: Some("abc".into()),
            }]),
        ];
        let contents = serde_json::to_value(convert_turns(&history)).unwrap();
        assert_eq!(
            contents[1]["parts"][0],
            json!({"functionCall": {"name": "list_pods", "args": {}}, "thoughtSignature": "abc"})
        );
    }

    #[test]
    fn test_parse_chunk_function_call_without_args() {
        let data = r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"cluster_info"}}]}}]}"#;
        let fragments = parse_chunk(data);
        assert_eq!(
            fragments[0].as_ref().unwrap(),
            &GenFragment::tool_call("cluster_info", Map::new())
        );
    }

    #[test]
    fn test_parse_chunk_skips_unknown_parts() {
        let data = r#"{"candidates":[{"content":{"parts":[
            {"executableCode":{"language":"PYTHON","code":"print(1)"}},
            {"text":"done"}
        ]}}]}"#;
        let fragments: Vec<GenFragment> = parse_chunk(data).into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(fragments, vec![GenFragment::text("done")]);
    }

    #[test]
    fn test_parse_chunk_errors() {
        let err = parse_chunk(r#"{"error":{"code":500,"message":"boom"}}"#);
        assert!(matches!(err[0], Err(ProviderError::Stream(_))));

        let blocked = parse_chunk(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert!(matches!(blocked[0], Err(ProviderError::InvalidRequest(_))));

        assert!(parse_chunk("not json").is_empty());
        assert!(parse_chunk(r#"{"candidates":[{"finishReason":"STOP"}]}"#).is_empty());
    }
}
