//! Scripted LLM provider (for tests, no model required)
//!
//! Replays a fixed sequence of turns and records every request it sees, so
//! tests can assert how often the planner called the model and with what.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo};
use crate::tool::ToolSchema;

/// One scripted model turn
#[derive(Clone, Debug)]
pub enum ScriptedTurn {
    Reply(Completion),
    Fail(String),
}

/// Provider that answers from a script
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    repeat: Option<Completion>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Replies with the given completions in order
    pub fn replies(completions: impl IntoIterator<Item = Completion>) -> Self {
        Self::new(completions.into_iter().map(ScriptedTurn::Reply))
    }

    /// Answers every call with the same completion
    pub fn repeating(completion: Completion) -> Self {
        Self {
            repeat: Some(completion),
            ..Self::default()
        }
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Transcripts passed to each `complete` call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        Ok(ProviderInfo {
            name: "Scripted".into(),
            version: None,
            models: self.list_models().await?,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let next = self
            .turns
            .lock()
            .map_err(|_| AgentError::Provider("script lock poisoned".into()))?
            .pop_front();

        let turn = match (next, &self.repeat) {
            (Some(turn), _) => turn,
            (None, Some(repeat)) => ScriptedTurn::Reply(repeat.clone()),
            (None, None) => return Err(AgentError::Provider("script exhausted".into())),
        };

        match turn {
            ScriptedTurn::Reply(mut completion) => {
                completion.model.clone_from(&options.model);
                Ok(completion)
            }
            ScriptedTurn::Fail(reason) => Err(AgentError::ProviderUnavailable(reason)),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "scripted".into(),
            name: "scripted".into(),
            context_length: None,
        }])
    }
}
