//! Run Context
//!
//! Request-scoped configuration threaded through one orchestration run.
//! The caller's credential lives here, out of reach of model-supplied
//! tool arguments.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Per-invocation configuration, created by the caller and never mutated by the core
#[derive(Clone, Default)]
pub struct RunContext {
    token: Option<String>,
    max_turns: Option<usize>,
    call_timeout: Option<Duration>,
    cancellation: CancellationToken,
    metadata: HashMap<String, serde_json::Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context authenticated with the caller's bearer token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Cap on planner turns for this run (overrides the agent default)
    #[must_use]
    pub const fn max_turns(mut self, max: usize) -> Self {
        self.max_turns = Some(max);
        self
    }

    /// Deadline applied to each model call and each tool call
    #[must_use]
    pub const fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Tie the run to an externally owned cancellation token
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub const fn turn_limit(&self) -> Option<usize> {
        self.max_turns
    }

    pub const fn timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn get_metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("max_turns", &self.max_turns)
            .field("call_timeout", &self.call_timeout)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("metadata", &self.metadata)
            .finish()
    }
}
