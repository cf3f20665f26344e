//! Agent Orchestrator
//!
//! State machine that routes a user message either through a deterministic
//! fast path or through the plan/execute loop:
//!
//! ```text
//!   Start ──matches──▶ FastPath ──────────────────────────▶ Done
//!     │
//!     └──────────────▶ Planning ──no tool calls──────────▶ Done
//!                        ▲   │
//!                        │   └──tool calls──▶ ExecutingTools
//!                        └────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::executor::{ToolExecutor, UnknownToolPolicy};
use crate::message::{Message, Transcript};
use crate::planner::ConversationalPlanner;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{Tool, ToolCall, ToolRegistry};

/// Deterministic shortcut that answers a recognised intent without the model
#[async_trait]
pub trait FastPath: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether this message should bypass the planner
    fn matches(&self, message: &Message) -> bool;

    /// Produce the final assistant message
    async fn run(&self, message: &Message, ctx: &RunContext) -> Result<Message>;
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt handed to the planner
    pub system_prompt: String,

    /// Planner turns allowed per run unless the run context says otherwise
    pub max_turns: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Handling of tool names missing from the registry
    pub unknown_tool_policy: UnknownToolPolicy,

    /// Deadline for one model call
    pub model_timeout: Duration,

    /// Deadline for one tool call
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_turns: 8,
            generation: GenerationOptions::default(),
            unknown_tool_policy: UnknownToolPolicy::default(),
            model_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(15),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Use the available tools when they help answer the user, then reply concisely.";

/// Reply used when the model ends a run without any text
const EMPTY_REPLY: &str = "I'm not sure how to help with that. Could you rephrase?";

/// Orchestration states
#[derive(Clone, Debug, PartialEq)]
pub enum AgentState {
    Start,
    FastPath,
    Planning,
    ExecutingTools(Vec<ToolCall>),
    Done,
}

/// Summary of one finished run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Text of the last assistant message
    pub reply: String,
    /// Model invocations made
    pub planner_turns: usize,
    /// Tool batches executed
    pub tool_batches: usize,
    /// Whether the fast path answered
    pub fast_path: bool,
}

/// The orchestrator
pub struct Agent {
    planner: ConversationalPlanner,
    executor: ToolExecutor,
    fast_path: Option<Arc<dyn FastPath>>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        fast_path: Option<Arc<dyn FastPath>>,
        config: AgentConfig,
    ) -> Self {
        let mut generation = config.generation.clone();
        generation.system_prompt = Some(config.system_prompt.clone());

        let planner = ConversationalPlanner::new(
            provider,
            tools.schemas(),
            generation,
            config.model_timeout,
        );
        let executor = ToolExecutor::new(tools, config.unknown_tool_policy, config.tool_timeout);

        Self {
            planner,
            executor,
            fast_path,
            config,
        }
    }

    /// Answer a single message on a fresh transcript.
    ///
    /// Never fails: fatal errors are logged and degraded to a user-safe reply.
    pub async fn invoke(&self, text: &str, ctx: &RunContext) -> String {
        let mut transcript = Transcript::new();
        self.reply(&mut transcript, text, ctx).await
    }

    /// Append `text` to an existing transcript and answer it.
    ///
    /// On failure the transcript is rolled back to the new user message
    /// followed by the fallback reply, so it never keeps a half-finished
    /// tool exchange.
    pub async fn reply(&self, transcript: &mut Transcript, text: &str, ctx: &RunContext) -> String {
        let checkpoint = transcript.len();
        transcript.push(Message::user(text));

        match self.run(transcript, ctx).await {
            Ok(report) => report.reply,
            Err(e) => {
                let transport = ctx.get_metadata("transport");
                if matches!(e, AgentError::Cancelled) {
                    tracing::info!(?transport, "Agent run cancelled");
                } else {
                    tracing::error!(
                        error = %e,
                        retryable = e.is_retryable(),
                        ?transport,
                        "Agent run failed"
                    );
                }
                let fallback = e.user_message();
                transcript.truncate(checkpoint + 1);
                transcript.push(Message::assistant(fallback.clone()));
                fallback
            }
        }
    }

    /// Drive the state machine until `Done`.
    ///
    /// The transcript must end with a non-assistant message.
    pub async fn run(&self, transcript: &mut Transcript, ctx: &RunContext) -> Result<RunReport> {
        let max_turns = ctx.turn_limit().unwrap_or(self.config.max_turns);
        let mut report = RunReport {
            reply: String::new(),
            planner_turns: 0,
            tool_batches: 0,
            fast_path: false,
        };
        let mut state = AgentState::Start;

        loop {
            if ctx.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            state = match state {
                AgentState::Start => {
                    transcript.ensure_awaiting_reply()?;
                    let shortcut = self
                        .fast_path
                        .as_ref()
                        .zip(transcript.last())
                        .is_some_and(|(fast_path, latest)| fast_path.matches(latest));
                    if shortcut {
                        AgentState::FastPath
                    } else {
                        AgentState::Planning
                    }
                }

                AgentState::FastPath => {
                    let (Some(fast_path), Some(latest)) = (&self.fast_path, transcript.last().cloned())
                    else {
                        return Err(AgentError::Other("fast path selected without a handler".into()));
                    };
                    tracing::info!(fast_path = fast_path.name(), "Answering without the model");
                    let answer = fast_path.run(&latest, ctx).await?;
                    transcript.push(answer);
                    report.fast_path = true;
                    AgentState::Done
                }

                AgentState::Planning => {
                    transcript.ensure_awaiting_reply()?;
                    if report.planner_turns >= max_turns {
                        tracing::warn!(max_turns, "Planner turn limit reached");
                        return Err(AgentError::MaxIterations(max_turns));
                    }
                    report.planner_turns += 1;
                    tracing::debug!(turn = report.planner_turns, "Planning");

                    let outcome = self.planner.plan(transcript, ctx).await?;
                    if outcome.wants_tools() {
                        AgentState::ExecutingTools(outcome.tool_calls)
                    } else {
                        AgentState::Done
                    }
                }

                AgentState::ExecutingTools(calls) => {
                    tracing::debug!(calls = calls.len(), "Executing tool batch");
                    let results = self.executor.execute(&calls, ctx).await?;
                    transcript.extend(results);
                    report.tool_batches += 1;
                    AgentState::Planning
                }

                AgentState::Done => {
                    report.reply = transcript
                        .final_reply()
                        .unwrap_or(EMPTY_REPLY)
                        .to_string();
                    return Ok(report);
                }
            };
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        self.planner.provider()
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    fast_path: Option<Arc<dyn FastPath>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            fast_path: None,
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn fast_path(mut self, fast_path: Arc<dyn FastPath>) -> Self {
        self.fast_path = Some(fast_path);
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    #[must_use]
    pub const fn max_turns(mut self, max: usize) -> Self {
        self.config.max_turns = max;
        self
    }

    #[must_use]
    pub const fn unknown_tool_policy(mut self, policy: UnknownToolPolicy) -> Self {
        self.config.unknown_tool_policy = policy;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(
            provider,
            Arc::new(self.tools),
            self.fast_path,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedProvider, ScriptedTurn};
    use crate::provider::Completion;
    use crate::tool::{ParameterSchema, ToolResult, ToolSchema};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LookupTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for LookupTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "lookup".into(),
                description: "Look something up".into(),
                parameters: vec![ParameterSchema::required("query", "string", "Query")],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, call: &ToolCall, _ctx: &RunContext) -> Result<ToolResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::success("lookup", format!("found {}", call.str_arg("query").unwrap_or(""))))
        }
    }

    struct GreetingShortcut;

    #[async_trait]
    impl FastPath for GreetingShortcut {
        fn name(&self) -> &str {
            "greeting"
        }

        fn matches(&self, message: &Message) -> bool {
            message.text() == Some("hi")
        }

        async fn run(&self, _message: &Message, _ctx: &RunContext) -> Result<Message> {
            Ok(Message::assistant("hello!"))
        }
    }

    fn lookup_call(id: &str) -> ToolCall {
        ToolCall::new(id, "lookup").with_arg("query", "chargers")
    }

    fn agent(provider: Arc<ScriptedProvider>, tool_calls: Arc<AtomicUsize>) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tool(LookupTool { calls: tool_calls })
            .fast_path(Arc::new(GreetingShortcut))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_tool_then_answer_takes_two_turns() {
        let provider = Arc::new(ScriptedProvider::replies([
            Completion::tools(vec![lookup_call("c1")]),
            Completion::text("We have 3 chargers."),
        ]));
        let tool_calls = Arc::new(AtomicUsize::new(0));
        let agent = agent(provider.clone(), tool_calls.clone());

        let mut transcript = Transcript::from_user("what chargers do you have");
        let report = agent.run(&mut transcript, &RunContext::new()).await.unwrap();

        assert_eq!(report.reply, "We have 3 chargers.");
        assert_eq!(report.planner_turns, 2);
        assert_eq!(report.tool_batches, 1);
        assert_eq!(provider.calls(), 2);
        assert_eq!(tool_calls.load(Ordering::SeqCst), 1);

        // user, assistant(tool call), tool result, assistant(answer)
        assert_eq!(transcript.len(), 4);
        let second_request = &provider.requests()[1];
        assert!(matches!(
            second_request.last(),
            Some(Message::Tool { tool_call_id, .. }) if tool_call_id == "c1"
        ));
    }

    #[tokio::test]
    async fn test_fast_path_skips_model() {
        let provider = Arc::new(ScriptedProvider::replies([]));
        let agent = agent(provider.clone(), Arc::new(AtomicUsize::new(0)));

        let mut transcript = Transcript::from_user("hi");
        let report = agent.run(&mut transcript, &RunContext::new()).await.unwrap();

        assert!(report.fast_path);
        assert_eq!(report.reply, "hello!");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_turn_limit_stops_endless_tool_requests() {
        let provider = Arc::new(ScriptedProvider::repeating(Completion::tools(vec![lookup_call(
            "again",
        )])));
        let agent = agent(provider.clone(), Arc::new(AtomicUsize::new(0)));

        let mut transcript = Transcript::from_user("loop forever");
        let err = agent
            .run(&mut transcript, &RunContext::new().max_turns(3))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::MaxIterations(3)));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_invoke_degrades_fatal_errors() {
        let provider = Arc::new(ScriptedProvider::new([ScriptedTurn::Fail("boom".into())]));
        let agent = agent(provider, Arc::new(AtomicUsize::new(0)));

        let reply = agent.invoke("anything", &RunContext::new()).await;
        assert_eq!(reply, AgentError::ProviderUnavailable(String::new()).user_message());
    }

    #[tokio::test]
    async fn test_unknown_tool_rolls_back_transcript() {
        let provider = Arc::new(ScriptedProvider::replies([Completion::tools(vec![
            ToolCall::new("c1", "teleport"),
        ])]));
        let agent = agent(provider, Arc::new(AtomicUsize::new(0)));

        let mut transcript = Transcript::new();
        let reply = agent
            .reply(&mut transcript, "beam me up", &RunContext::new())
            .await;

        assert_eq!(reply, AgentError::ToolNotFound(String::new()).user_message());
        assert_eq!(transcript.len(), 2);
        assert!(transcript.messages().iter().all(|m| m.tool_calls().is_empty()));
    }

    #[tokio::test]
    async fn test_run_rejects_transcript_ending_with_assistant() {
        let agent = agent(
            Arc::new(ScriptedProvider::replies([])),
            Arc::new(AtomicUsize::new(0)),
        );
        let mut transcript = Transcript::from_user("hello");
        transcript.push(Message::assistant("hi there"));

        let err = agent.run(&mut transcript, &RunContext::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::Session(_)));
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(
            AgentBuilder::new().build(),
            Err(AgentError::Config(_))
        ));
    }
}
