//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference. Tools are
//! described in the system prompt and requested by the model with fenced
//! `tool` blocks, which are parsed back into [`ToolCall`]s.

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
        TokenUsage,
    },
    tool::{ToolCall, ToolSchema, render_tool_prompt},
};
use async_trait::async_trait;
use std::fmt::Write as _;
use ollama_rs::{
    Ollama,
    generation::{
        chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    },
    models::ModelOptions as OllamaOptions,
};

const TOOL_FENCE: &str = "```tool";
const FENCE_END: &str = "```";

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(11434);

        Self { host, port }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(&config.host, config.port),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Self {
        Self::from_config(OllamaConfig::default())
    }

    /// Convert the transcript to Ollama chat messages
    fn convert_messages(
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Vec<ChatMessage> {
        let mut system = options.system_prompt.clone().unwrap_or_default();
        if !tools.is_empty() {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(&render_tool_prompt(tools));
        }

        let mut converted = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            converted.push(ChatMessage::new(MessageRole::System, system));
        }

        converted.extend(messages.iter().map(|m| match m {
            Message::System { content } => ChatMessage::new(MessageRole::System, content.clone()),
            Message::User { content } => ChatMessage::new(MessageRole::User, content.clone()),
            Message::Assistant {
                content,
                tool_calls,
            } => ChatMessage::new(
                MessageRole::Assistant,
                render_assistant(content.as_deref(), tool_calls),
            ),
            // Tools appear as user context
            Message::Tool {
                tool_call_id,
                name,
                content,
            } => ChatMessage::new(
                MessageRole::User,
                format!("[Tool '{name}' returned for call {tool_call_id}]\n{content}"),
            ),
        }));

        converted
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        let (text, tool_calls) = parse_tool_calls(&response.message.content);
        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolUse
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let usage = response.final_data.as_ref().map(|d| TokenUsage {
            prompt_tokens: d.prompt_eval_count as u32,
            completion_tokens: d.eval_count as u32,
            total_tokens: (d.prompt_eval_count + d.eval_count) as u32,
        });

        Completion {
            content: Some(text).filter(|t| !t.is_empty()),
            tool_calls,
            model: model.to_string(),
            usage,
            finish_reason: Some(finish_reason),
        }
    }

    /// Build Ollama generation options
    #[allow(clippy::cast_possible_wrap)]
    fn build_options(opts: &GenerationOptions) -> OllamaOptions {
        OllamaOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(opts.max_tokens as i32)
    }
}

/// Re-render an assistant turn so the model sees the tool blocks it emitted
fn render_assistant(content: Option<&str>, tool_calls: &[ToolCall]) -> String {
    let mut rendered = content.unwrap_or_default().to_string();
    for call in tool_calls {
        let block = serde_json::json!({
            "tool": call.name,
            "arguments": call.arguments,
        });
        if !rendered.is_empty() {
            rendered.push('\n');
        }
        let _ = write!(rendered, "{TOOL_FENCE}\n{block}\n{FENCE_END}");
    }
    rendered
}

/// Split a response into its prose and every fenced `tool` block it contains.
///
/// Falls back to a single inline JSON object with a `"tool"` key when the
/// model forgot the fence.
fn parse_tool_calls(content: &str) -> (String, Vec<ToolCall>) {
    let mut calls = Vec::new();
    let mut text = String::new();
    let mut rest = content;

    while let Some(start) = rest.find(TOOL_FENCE) {
        text.push_str(&rest[..start]);
        let after_marker = &rest[start + TOOL_FENCE.len()..];
        let Some(end) = after_marker.find(FENCE_END) else {
            rest = after_marker;
            break;
        };

        let json_str = after_marker[..end].trim();
        match serde_json::from_str::<ToolCall>(json_str) {
            Ok(call) => calls.push(call),
            Err(e) => tracing::warn!(error = %e, "Ignoring malformed tool block"),
        }
        rest = &after_marker[end + FENCE_END.len()..];
    }
    text.push_str(rest);

    if calls.is_empty() {
        if let Some(call) = parse_inline_tool_call(content) {
            return (String::new(), vec![with_id(call)]);
        }
    }

    (text.trim().to_string(), calls.into_iter().map(with_id).collect())
}

/// Try to parse inline JSON tool call
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

fn with_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_empty() {
        call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
    }
    call
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "Ollama".into(),
            version: None,
            models,
            supports_tools: false,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
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
        let ollama_messages = Self::convert_messages(messages, tools, options);
        let ollama_options = Self::build_options(options);

        let request =
            ChatMessageRequest::new(options.model.clone(), ollama_messages).options(ollama_options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                context_length: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tool::ParameterSchema;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::user("find chargers"),
            Message::assistant_with_tools(
                None,
                vec![ToolCall::new("c1", "searchProduct").with_arg("query", "charger")],
            ),
            Message::tool("c1", "searchProduct", "[]"),
        ];
        let tools = vec![ToolSchema {
            name: "searchProduct".into(),
            description: "Search".into(),
            parameters: vec![ParameterSchema::required("query", "string", "Query")],
            category: None,
            has_side_effects: false,
        }];
        let options = GenerationOptions {
            system_prompt: Some("Be helpful.".into()),
            ..GenerationOptions::default()
        };

        let converted = OllamaProvider::convert_messages(&messages, &tools, &options);
        assert_eq!(converted.len(), 4);
        assert!(converted[0].content.contains("### searchProduct"));
        assert!(converted[2].content.contains(TOOL_FENCE));
        assert!(converted[3].content.contains("call c1"));
    }

    #[test]
    fn test_parse_multiple_tool_blocks() {
        let content = r#"Let me look that up.
```tool
{"tool": "searchProduct", "arguments": {"query": "charger"}}
```
```tool
{"tool": "searchProduct", "arguments": {"query": "cable"}}
```"#;

        let (text, calls) = parse_tool_calls(content);
        assert_eq!(text, "Let me look that up.");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].str_arg("query"), Some("cable"));
        assert!(calls.iter().all(|c| !c.id.is_empty()));
    }

    #[test]
    fn test_parse_inline_tool_call() {
        let content = r#"{"tool": "addProductToCart", "arguments": {"productId": "p1"}}"#;
        let (_, calls) = parse_tool_calls(content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "addProductToCart");
    }

    #[test]
    fn test_plain_text_has_no_calls() {
        let (text, calls) = parse_tool_calls("We have three chargers in stock.");
        assert!(calls.is_empty());
        assert_eq!(text, "We have three chargers in stock.");
    }
}
