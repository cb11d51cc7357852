//! Core agent loop
//!
//! A turn alternates between planning (one model call) and acting (running
//! the tools that call asked for) until the model answers without requesting
//! tools:
//!
//! ```text
//! user input -> PLANNING --tool calls--> ACTING --> PLANNING ...
//!                   \--no tool calls--> DONE
//! ```
//!
//! The turn works on a copy of the session's conversation. The session is
//! only updated once the turn reaches DONE, so a provider failure, an
//! unregistered tool or the iteration limit leaves it exactly as it was.

use crate::agent::executor::{Executor, SilentObserver, TurnObserver};
use crate::agent::planner::Planner;
use crate::agent::Session;
use crate::config::AgentConfig;
use crate::error::{Result, StepwiseError};
use crate::prompts::build_system_prompt;
use crate::providers::{Message, Provider, Role, TokenUsage};
use crate::tools::Toolbox;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Position of a turn in the plan/act cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the next model response
    Planning,
    /// Running the tool requests of the last assistant message
    Acting,
    /// The last assistant message is the answer
    Done,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Planning => write!(f, "PLANNING"),
            LoopState::Acting => write!(f, "ACTING"),
            LoopState::Done => write!(f, "DONE"),
        }
    }
}

/// Decide where a turn goes after a planning step
///
/// ACTING when the most recent message is an assistant message with at least
/// one tool request, DONE otherwise.
///
/// # Examples
///
/// ```
/// use stepwise::agent::{route, LoopState};
/// use stepwise::providers::{Message, ToolCall};
///
/// assert_eq!(route(Some(&Message::assistant("Hi"))), LoopState::Done);
///
/// let call = ToolCall::new("c1", "get_weather", r#"{"city":"Paris"}"#);
/// let msg = Message::assistant_with_tools(vec![call]);
/// assert_eq!(route(Some(&msg)), LoopState::Acting);
/// ```
pub fn route(last: Option<&Message>) -> LoopState {
    match last {
        Some(message) if !message.requested_tools().is_empty() => LoopState::Acting,
        _ => LoopState::Done,
    }
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Content of the final assistant message, empty if it had none
    pub answer: String,
    /// Number of model calls made during the turn
    pub planner_calls: usize,
    /// Number of tool requests executed during the turn
    pub tool_calls: usize,
    /// Usage reported by the provider for this turn
    pub usage: TokenUsage,
}

/// Plan-and-act agent
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use stepwise::agent::{Agent, Session};
/// use stepwise::config::Config;
/// use stepwise::providers::create_provider;
/// use stepwise::tools::Toolbox;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::default();
/// let provider = create_provider(&config.provider.provider_type, &config.provider)?;
/// let toolbox = Toolbox::from_config(&config.agent.tools)?;
/// let agent = Agent::new(Arc::from(provider), toolbox, &config.agent)?;
///
/// let mut session = Session::new();
/// let outcome = agent.run_turn(&mut session, "What's the weather in Paris?").await?;
/// println!("{}", outcome.answer);
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    planner: Planner,
    executor: Executor,
    max_turns: usize,
}

impl Agent {
    /// Create an agent
    ///
    /// The system prompt comes from `config.system_prompt`, falling back to
    /// the built-in prompt for a toolbox with or without tools.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::Config` if `max_turns` is zero
    pub fn new(provider: Arc<dyn Provider>, toolbox: Toolbox, config: &AgentConfig) -> Result<Self> {
        if config.max_turns == 0 {
            return Err(StepwiseError::Config("max_turns must be greater than 0".to_string()).into());
        }

        let system_prompt = build_system_prompt(config, !toolbox.is_empty());
        Ok(Self {
            planner: Planner::new(provider, system_prompt),
            executor: Executor::new(toolbox),
            max_turns: config.max_turns,
        })
    }

    /// Model identifier of the provider
    pub fn model_name(&self) -> &str {
        self.planner.model_name()
    }

    /// Whether any tool is offered to the model
    pub fn has_tools(&self) -> bool {
        self.executor.has_tools()
    }

    /// Run one turn without progress reporting
    ///
    /// # Errors
    ///
    /// See [`Agent::run_turn_with_observer`]
    pub async fn run_turn(&self, session: &mut Session, input: &str) -> Result<TurnOutcome> {
        self.run_turn_with_observer(session, input, &SilentObserver)
            .await
    }

    /// Run one turn: append the user input, then plan and act until done
    ///
    /// On success the session holds the user message, every assistant
    /// message and every tool observation of the turn, in order.
    ///
    /// # Errors
    ///
    /// Returns the provider error, `StepwiseError::UnknownTool`,
    /// `StepwiseError::InvalidToolArguments` or
    /// `StepwiseError::MaxIterationsExceeded`. The session is unchanged on
    /// any error.
    pub async fn run_turn_with_observer(
        &self,
        session: &mut Session,
        input: &str,
        observer: &dyn TurnObserver,
    ) -> Result<TurnOutcome> {
        let start_time = Instant::now();
        debug!(session = %session.id, "Starting turn");

        let mut conversation = session.conversation.clone();
        conversation.add_user_message(input);

        let tool_definitions = self.executor.definitions();
        let mut usage = TokenUsage::default();
        let mut planner_calls = 0;
        let mut tool_calls = 0;
        let mut state = LoopState::Planning;

        loop {
            debug!(%state, planner_calls, "Loop step");
            match state {
                LoopState::Planning => {
                    if planner_calls >= self.max_turns {
                        warn!("Maximum iterations ({}) exceeded", self.max_turns);
                        return Err(StepwiseError::MaxIterationsExceeded {
                            limit: self.max_turns,
                            message: format!(
                                "Agent exceeded maximum iteration limit of {}",
                                self.max_turns
                            ),
                        }
                        .into());
                    }
                    planner_calls += 1;

                    let response = self
                        .planner
                        .plan(conversation.messages(), &tool_definitions)
                        .await?;
                    if let Some(reported) = response.usage {
                        usage = TokenUsage::new(
                            usage.prompt_tokens + reported.prompt_tokens,
                            usage.completion_tokens + reported.completion_tokens,
                        );
                        conversation.record_usage(&reported);
                    }

                    conversation.push(response.message);
                    state = route(conversation.last());
                }
                LoopState::Acting => {
                    let calls = conversation
                        .last()
                        .map(|m| m.requested_tools().to_vec())
                        .unwrap_or_default();
                    tool_calls += calls.len();

                    for observation in self.executor.act(&calls, observer).await? {
                        conversation.push(observation);
                    }
                    state = LoopState::Planning;
                }
                LoopState::Done => break,
            }
        }

        let answer = conversation
            .last()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.text().to_string())
            .unwrap_or_default();

        session.conversation = conversation;

        info!(
            "Turn completed in {} planner calls, {} tool calls, {} ms",
            planner_calls,
            tool_calls,
            start_time.elapsed().as_millis()
        );

        Ok(TurnOutcome {
            answer,
            planner_calls,
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolsConfig;
    use crate::providers::ToolCall;
    use crate::test_utils::ScriptedProvider;

    fn shell_toolbox() -> Toolbox {
        let mut config = ToolsConfig::default();
        config.weather.enabled = false;
        Toolbox::from_config(&config).unwrap()
    }

    fn agent_with(provider: Arc<ScriptedProvider>, toolbox: Toolbox) -> Agent {
        Agent::new(provider, toolbox, &AgentConfig::default()).unwrap()
    }

    fn command_call(id: &str, command: &str) -> ToolCall {
        ToolCall::new(
            id,
            "run_command",
            serde_json::json!({ "command": command }).to_string(),
        )
    }

    #[test]
    fn test_route() {
        assert_eq!(route(None), LoopState::Done);
        assert_eq!(route(Some(&Message::user("hi"))), LoopState::Done);
        assert_eq!(
            route(Some(&Message::assistant_with_tools(Vec::new()))),
            LoopState::Done
        );
        assert_eq!(
            route(Some(&Message::assistant_with_tools(vec![command_call("c", "ls")]))),
            LoopState::Acting
        );
    }

    #[test]
    fn test_agent_creation_with_zero_max_turns_fails() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let config = AgentConfig {
            max_turns: 0,
            ..Default::default()
        };
        assert!(Agent::new(provider, Toolbox::empty(), &config).is_err());
    }

    #[tokio::test]
    async fn test_direct_answer_uses_one_planner_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Message::assistant("Hello!")]));
        let agent = agent_with(provider.clone(), shell_toolbox());
        let mut session = Session::with_id("s1");

        let outcome = agent.run_turn(&mut session, "Say hello").await.unwrap();

        assert_eq!(outcome.answer, "Hello!");
        assert_eq!(outcome.planner_calls, 1);
        assert_eq!(outcome.tool_calls, 0);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(session.conversation.len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_round_trip_appends_in_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Message::assistant_with_tools(vec![
                command_call("c1", "echo first"),
                command_call("c2", "true"),
            ]),
            Message::assistant("All done"),
        ]));
        let agent = agent_with(provider.clone(), shell_toolbox());
        let mut session = Session::new();

        let outcome = agent.run_turn(&mut session, "run things").await.unwrap();
        assert_eq!(outcome.answer, "All done");
        assert_eq!(outcome.planner_calls, 2);
        assert_eq!(outcome.tool_calls, 2);

        let messages = session.conversation.messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Assistant
            ]
        );
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[2].text(), "first\n");
        assert_eq!(messages[3].text(), "Command executed with no output.");

        // Second model call sees both observations
        let second_request = &provider.requests()[1];
        assert_eq!(second_request.len(), 5);
        assert_eq!(second_request[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_history_carries_across_turns() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Message::assistant("Hi Ada"),
            Message::assistant("Your name is Ada"),
        ]));
        let agent = agent_with(provider.clone(), Toolbox::empty());
        let mut session = Session::new();

        agent.run_turn(&mut session, "I am Ada").await.unwrap();
        let outcome = agent.run_turn(&mut session, "Who am I?").await.unwrap();

        assert_eq!(outcome.answer, "Your name is Ada");
        assert_eq!(session.conversation.len(), 4);
        // system + 3 history messages on the second call
        assert_eq!(provider.requests()[1].len(), 4);
    }

    #[tokio::test]
    async fn test_provider_error_leaves_session_untouched() {
        let provider = Arc::new(ScriptedProvider::failing("rate limited"));
        let agent = agent_with(provider, Toolbox::empty());
        let mut session = Session::resume("s", vec![Message::user("a"), Message::assistant("b")]);
        let before = session.clone();

        let err = agent.run_turn(&mut session, "again").await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_turn_without_mutation() {
        let provider = Arc::new(ScriptedProvider::new(vec![Message::assistant_with_tools(
            vec![ToolCall::new("c1", "delete_everything", "{}")],
        )]));
        let agent = agent_with(provider, shell_toolbox());
        let mut session = Session::new();

        let err = agent.run_turn(&mut session, "go").await.unwrap_err();
        let err = err.downcast::<StepwiseError>().unwrap();
        assert!(matches!(err, StepwiseError::UnknownTool(ref n) if n == "delete_everything"));
        assert!(session.conversation.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_agent_respects_max_iterations() {
        let looping: Vec<Message> = (0..5)
            .map(|i| Message::assistant_with_tools(vec![command_call(&format!("c{}", i), "true")]))
            .collect();
        let provider = Arc::new(ScriptedProvider::new(looping));
        let config = AgentConfig {
            max_turns: 3,
            ..Default::default()
        };
        let agent = Agent::new(provider.clone(), shell_toolbox(), &config).unwrap();
        let mut session = Session::new();

        let err = agent.run_turn(&mut session, "loop").await.unwrap_err();
        let err = err.downcast::<StepwiseError>().unwrap();
        assert!(matches!(err, StepwiseError::MaxIterationsExceeded { limit: 3, .. }));
        assert_eq!(provider.call_count(), 3);
        assert!(session.conversation.is_empty());
    }

    #[tokio::test]
    async fn test_usage_is_summed_across_planner_calls() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Message::assistant("ok")])
                .with_usage(TokenUsage::new(10, 2)),
        );
        let agent = agent_with(provider, Toolbox::empty());
        let mut session = Session::new();

        let outcome = agent.run_turn(&mut session, "hi").await.unwrap();
        assert_eq!(outcome.usage.total_tokens, 12);
        assert_eq!(session.conversation.usage().total_tokens, 12);
    }

    #[tokio::test]
    async fn test_system_prompt_depends_on_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![Message::assistant("x")]));
        let agent = agent_with(provider.clone(), Toolbox::empty());
        agent.run_turn(&mut Session::new(), "hi").await.unwrap();
        assert_eq!(
            provider.requests()[0][0].text(),
            crate::prompts::PLAIN_CHAT_PROMPT
        );
        assert!(!agent.has_tools());
        assert_eq!(agent.model_name(), "scripted");

        let with_tools = agent_with(provider, shell_toolbox());
        assert_eq!(
            with_tools.planner.system_prompt(),
            crate::prompts::DEFAULT_SYSTEM_PROMPT
        );
    }
}
