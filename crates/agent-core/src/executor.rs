//! Tool Executor
//!
//! Runs one batch of model-requested tool calls concurrently and turns the
//! outcomes into tool-result messages, in request order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// Argument keys the model may never supply; the run context owns them.
const RESERVED_ARGUMENTS: &[&str] = &["token"];

/// What to do when the model names a tool that is not registered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownToolPolicy {
    /// Abort the whole batch before any tool runs
    #[default]
    FailBatch,
    /// Answer that call with a structured failure and run the rest
    ReportToModel,
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    policy: UnknownToolPolicy,
    timeout: Duration,
}

impl ToolExecutor {
    pub const fn new(registry: Arc<ToolRegistry>, policy: UnknownToolPolicy, timeout: Duration) -> Self {
        Self {
            registry,
            policy,
            timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute a batch, returning one tool-result message per call.
    ///
    /// Result order always matches `calls`, whatever order the tools finish in.
    pub async fn execute(&self, calls: &[ToolCall], ctx: &RunContext) -> Result<Vec<Message>> {
        if self.policy == UnknownToolPolicy::FailBatch {
            if let Some(unknown) = calls.iter().find(|c| !self.registry.contains(&c.name)) {
                tracing::warn!(tool = %unknown.name, call_id = %unknown.id, "Model requested unknown tool");
                return Err(AgentError::ToolNotFound(unknown.name.clone()));
            }
        }

        let batch = join_all(calls.iter().map(|call| self.run_one(call, ctx)));

        tokio::select! {
            biased;
            () = ctx.cancellation_token().cancelled() => Err(AgentError::Cancelled),
            results = batch => Ok(results),
        }
    }

    async fn run_one(&self, call: &ToolCall, ctx: &RunContext) -> Message {
        let call = sanitize(call);
        let deadline = ctx.timeout().unwrap_or(self.timeout);
        let started = Instant::now();

        let result = match tokio::time::timeout(deadline, self.registry.execute(&call, ctx)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ToolResult::failure(&call.name, e.to_string()),
            Err(_) => ToolResult::failure(
                &call.name,
                format!("{} timed out after {}s", call.name, deadline.as_secs()),
            ),
        };

        tracing::info!(
            tool = %call.name,
            call_id = %call.id,
            success = result.success,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Tool call finished"
        );

        result.with_id(&call.id).into_message(&call.id)
    }
}

fn sanitize(call: &ToolCall) -> ToolCall {
    let mut call = call.clone();
    for key in RESERVED_ARGUMENTS {
        if call.arguments.remove(*key).is_some() {
            tracing::debug!(tool = %call.name, key, "Dropped model-supplied reserved argument");
        }
    }
    call
}
