//! Transcript Messages
//!
//! The message model shared by the planner, the tool executor and every
//! provider. A [`Transcript`] is append-only for the duration of one run.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::tool::ToolCall;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Planner instructions
    System,
    /// User input
    User,
    /// Assistant (LLM or fast path) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single transcript entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Output of exactly one tool call, correlated by `tool_call_id`
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a text-only assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message that requests tool calls
    pub const fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content,
            tool_calls,
        }
    }

    /// Create a tool result message
    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    pub const fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// Text content, if the message carries any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } | Self::Tool { content, .. } => {
                Some(content)
            }
            Self::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Tool calls requested by an assistant message (empty for other roles)
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub const fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    /// Estimate token count (rough approximation)
    #[allow(clippy::cast_possible_truncation)]
    pub fn estimate_tokens(&self) -> u32 {
        let calls: usize = self
            .tool_calls()
            .iter()
            .map(|c| c.name.len() + serde_json::to_string(&c.arguments).map_or(0, |s| s.len()))
            .sum();
        // ~4 characters per token, +4 for role overhead
        ((self.text().map_or(0, str::len) + calls) / 4) as u32 + 4
    }
}

/// Ordered history of one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,

    /// Maximum context length (in estimated tokens)
    #[serde(default = "default_max_context")]
    max_context_tokens: u32,
}

const fn default_max_context() -> u32 {
    8192
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            max_context_tokens: default_max_context(),
        }
    }

    /// Fresh transcript seeded with a single user message
    pub fn from_user(text: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(Message::user(text));
        transcript
    }

    pub const fn with_max_context_tokens(mut self, max: u32) -> Self {
        self.max_context_tokens = max;
        self
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append several messages, preserving their order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent user message
    pub fn latest_user(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role() == Role::User)
    }

    /// Text of the last assistant message
    pub fn final_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .and_then(Message::text)
    }

    /// Every orchestration step reacts to a non-assistant message.
    pub fn ensure_awaiting_reply(&self) -> Result<()> {
        match self.messages.last() {
            None => Err(AgentError::Session("transcript is empty".into())),
            Some(m) if m.is_assistant() => Err(AgentError::Session(
                "transcript already ends with an assistant message".into(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Drop everything after the first `len` messages
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Estimate total tokens in the transcript
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(Message::estimate_tokens).sum()
    }

    /// Drop the oldest whole exchanges until the transcript fits.
    ///
    /// An exchange starts at a user message and runs up to the next one, so
    /// tool results are never separated from the assistant turn that
    /// requested them. System messages and the latest exchange are kept.
    pub fn truncate_to_fit(&mut self) {
        while self.estimate_tokens() > self.max_context_tokens {
            let Some(start) = self.messages.iter().position(|m| m.role() != Role::System) else {
                break;
            };
            let end = self.messages[start + 1..]
                .iter()
                .position(|m| m.role() == Role::User)
                .map(|offset| start + 1 + offset);
            match end {
                Some(end) => {
                    self.messages.drain(start..end);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.text(), Some("Hello"));
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn test_transcript() {
        let mut transcript = Transcript::from_user("Hi");
        assert!(transcript.ensure_awaiting_reply().is_ok());

        transcript.push(Message::assistant("Hello!"));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.final_reply(), Some("Hello!"));
        assert!(transcript.ensure_awaiting_reply().is_err());
    }

    #[test]
    fn test_tagged_serialization() {
        let msg = Message::tool("call_1", "searchProduct", "[]");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_truncate_keeps_tool_results_with_their_request() {
        let mut transcript = Transcript::new().with_max_context_tokens(40);
        transcript.push(Message::system("rules"));
        transcript.push(Message::user("x".repeat(80)));
        transcript.push(Message::assistant_with_tools(
            None,
            vec![ToolCall::new("c1", "searchProduct")],
        ));
        transcript.push(Message::tool("c1", "searchProduct", "y".repeat(80)));
        transcript.push(Message::user("latest"));

        transcript.truncate_to_fit();

        let roles: Vec<Role> = transcript.messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
        assert_eq!(transcript.latest_user().and_then(Message::text), Some("latest"));
    }

    #[test]
    fn test_default_transcript_keeps_short_history() {
        let mut transcript = Transcript::default();
        transcript.push(Message::user("hello"));
        transcript.push(Message::assistant("hi"));
        transcript.push(Message::user("find a charger"));

        transcript.truncate_to_fit();

        assert_eq!(transcript.messages().len(), 3);
    }
}
