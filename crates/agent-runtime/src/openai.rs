//! OpenAI-compatible LLM Provider
//!
//! Talks to any `/chat/completions` endpoint with native function calling
//! (OpenAI, Gemini's OpenAI-compatible surface, vLLM, LiteLLM gateways, ...).

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
        TokenUsage,
    },
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    /// Bearer key (optional for local gateways)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: std::env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn build_request(
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> ChatRequest {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &options.system_prompt {
            wire.push(WireMessage::text("system", system));
        }
        wire.extend(messages.iter().map(WireMessage::from));

        ChatRequest {
            model: options.model.clone(),
            messages: wire,
            tools: tools.iter().map(WireTool::from).collect(),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stop: options.stop_sequences.clone(),
        }
    }

    fn convert_response(response: ChatResponse, model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Parse("completion has no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(WireToolCall::into_tool_call)
            .collect();

        let finish_reason = choice.finish_reason.as_deref().map(|r| match r {
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolUse,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        });

        Ok(Completion {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            model: response.model.unwrap_or_else(|| model.to_string()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason,
        })
    }
}

/// Map an HTTP failure onto the agent taxonomy
fn status_error(status: StatusCode, body: &str) -> AgentError {
    let detail = format!("HTTP {status}: {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        s if s.is_server_error() => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

fn transport_error(err: &reqwest::Error) -> AgentError {
    if err.is_timeout() || err.is_connect() {
        AgentError::ProviderUnavailable(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "OpenAI-compatible".into(),
            version: None,
            models,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("OpenAI-compatible health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(messages, tools, options);

        let response = self
            .request(self.http.post(self.url("chat/completions")))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Self::convert_response(parsed, &options.model)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .request(self.http.get(self.url("models")))
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                name: m.id.clone(),
                id: m.id,
                context_length: None,
            })
            .collect())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        match message {
            Message::System { content } => Self::text("system", content),
            Message::User { content } => Self::text("user", content),
            Message::Assistant {
                content,
                tool_calls,
            } => Self {
                role: "assistant",
                content: content.clone(),
                tool_calls: tool_calls.iter().map(WireToolCall::from).collect(),
                tool_call_id: None,
                name: None,
            },
            Message::Tool {
                tool_call_id,
                name,
                content,
            } => Self {
                role: "tool",
                content: Some(content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(tool_call_id.clone()),
                name: Some(name.clone()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolSchema> for WireTool {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.parameters_json_schema(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object
    #[serde(default)]
    arguments: String,
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: serde_json::to_string(&call.arguments).unwrap_or_else(|_| "{}".into()),
            },
        }
    }
}

impl WireToolCall {
    /// Decode the argument string; anything that isn't a JSON object is kept
    /// under `input` so the tool can still make sense of it.
    fn into_tool_call(self) -> ToolCall {
        let raw = self.function.arguments.trim();
        let arguments = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            Ok(serde_json::Value::Null) => Default::default(),
            _ if raw.is_empty() => Default::default(),
            Ok(other) => [("input".to_string(), other)].into_iter().collect(),
            Err(_) => [("input".to_string(), serde_json::Value::String(raw.to_string()))]
                .into_iter()
                .collect(),
        };

        ToolCall {
            id: self.id,
            name: self.function.name,
            arguments,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
struct WireModel {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tool::ParameterSchema;

    #[test]
    fn test_request_shape() {
        let messages = vec![
            Message::user("find a charger"),
            Message::assistant_with_tools(
                None,
                vec![ToolCall::new("call_1", "searchProduct").with_arg("query", "charger")],
            ),
            Message::tool("call_1", "searchProduct", "[]"),
        ];
        let tools = vec![ToolSchema {
            name: "searchProduct".into(),
            description: "Search the catalog".into(),
            parameters: vec![ParameterSchema::required("query", "string", "Query")],
            category: None,
            has_side_effects: false,
        }];
        let options = GenerationOptions {
            system_prompt: Some("You are a shop assistant.".into()),
            ..GenerationOptions::default()
        };

        let body = serde_json::to_value(OpenAiProvider::build_request(&messages, &tools, &options))
            .unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "searchProduct");
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["parameters"]["required"][0], "query");
    }

    #[test]
    fn test_response_with_tool_calls() {
        let raw = serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function",
                         "function": {"name": "searchProduct", "arguments": "{\"query\":\"mouse\"}"}},
                        {"id": "b", "type": "function",
                         "function": {"name": "addProductToCart", "arguments": "p-42"}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let response: ChatResponse = serde_json::from_value(raw).unwrap();
        let completion = OpenAiProvider::convert_response(response, "fallback").unwrap();

        assert!(completion.content.is_none());
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(completion.tool_calls[0].str_arg("query"), Some("mouse"));
        // non-JSON arguments survive as `input`
        assert_eq!(completion.tool_calls[1].str_arg("input"), Some("p-42"));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            AgentError::RateLimited(_)
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            AgentError::Auth(_)
        ));
    }
}
