//! Conversational Planner
//!
//! One model turn: hand the transcript and the tool catalog to the provider,
//! append the answer as an assistant message, report what it asked for.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::message::{Message, Transcript};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolSchema};

/// What the model decided on this turn
#[derive(Clone, Debug, Default)]
pub struct PlanOutcome {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl PlanOutcome {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

pub struct ConversationalPlanner {
    provider: Arc<dyn LlmProvider>,
    tools: Vec<ToolSchema>,
    options: GenerationOptions,
    timeout: Duration,
}

impl ConversationalPlanner {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Vec<ToolSchema>,
        options: GenerationOptions,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            tools,
            options,
            timeout,
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn tools(&self) -> &[ToolSchema] {
        &self.tools
    }

    /// Run one model turn and append its answer to `transcript`.
    ///
    /// Provider failures, timeouts and cancellation propagate; nothing is
    /// appended in that case.
    pub async fn plan(&self, transcript: &mut Transcript, ctx: &RunContext) -> Result<PlanOutcome> {
        let deadline = ctx.timeout().unwrap_or(self.timeout);
        let started = Instant::now();

        let call = self
            .provider
            .complete(transcript.messages(), &self.tools, &self.options);

        let completion = tokio::select! {
            biased;
            () = ctx.cancellation_token().cancelled() => return Err(AgentError::Cancelled),
            result = tokio::time::timeout(deadline, call) => match result {
                Ok(completion) => completion?,
                Err(_) => {
                    return Err(AgentError::Timeout {
                        operation: "model call".into(),
                        elapsed: started.elapsed(),
                    });
                }
            },
        };

        let text = completion
            .content
            .filter(|t| !t.trim().is_empty());
        let tool_calls = assign_call_ids(completion.tool_calls);

        tracing::debug!(
            model = %completion.model,
            tool_calls = tool_calls.len(),
            has_text = text.is_some(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Planner turn complete"
        );

        transcript.push(Message::assistant_with_tools(text.clone(), tool_calls.clone()));

        Ok(PlanOutcome { text, tool_calls })
    }
}

/// Give every call an id that is unique within the turn
fn assign_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.is_empty() || !seen.insert(call.id.clone()) {
                call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                seen.insert(call.id.clone());
            }
            call
        })
        .collect()
}
