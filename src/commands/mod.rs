/*!
Command handlers for the CLI

- `chat`: Interactive chat loop
- `run`: Execute a single prompt
- `sessions`: Inspect the checkpoint store

Handlers share [`build_agent`] and [`complete_turn`], which wire the
provider, toolbox and optional checkpoint store around the agent.
*/

use crate::agent::{Agent, Session, TurnObserver, TurnOutcome};
use crate::config::Config;
use crate::error::Result;
use crate::providers::create_provider;
use crate::storage::{CheckpointStore, SqliteCheckpointStore};
use crate::tools::{ToolRequest, ToolResult, Toolbox};
use colored::Colorize;
use std::sync::Arc;

// Checkpoint inspection
pub mod sessions;

/// Prints each tool request to the console as it runs
pub struct ConsoleObserver;

impl TurnObserver for ConsoleObserver {
    fn on_tool_call(&self, request: &ToolRequest) {
        println!("{} {}", "Tool called:".yellow(), request);
    }

    fn on_tool_result(&self, request: &ToolRequest, result: &ToolResult) {
        if !result.success {
            tracing::debug!(tool = request.name(), "Tool reported failure");
        }
    }
}

/// Build an agent from configuration
///
/// `provider_name` overrides `provider.type`; `no_tools` offers the model
/// no tools at all.
pub fn build_agent(config: &Config, provider_name: Option<&str>, no_tools: bool) -> Result<Agent> {
    let provider_type = provider_name.unwrap_or(&config.provider.provider_type);
    let provider = create_provider(provider_type, &config.provider)?;

    let toolbox = if no_tools {
        Toolbox::empty()
    } else {
        Toolbox::from_config(&config.agent.tools)?
    };

    Agent::new(Arc::from(provider), toolbox, &config.agent)
}

/// Open the session a command should work on
///
/// With an id the checkpoint store is opened and the stored history loaded
/// (empty for a new id). Without one the session lives only in memory.
pub fn open_session(
    config: &Config,
    session_id: Option<&str>,
) -> Result<(Session, Option<Box<dyn CheckpointStore>>)> {
    let Some(id) = session_id else {
        return Ok((Session::new(), None));
    };

    let store = SqliteCheckpointStore::open(&config.storage)?;
    tracing::debug!(path = %store.path().display(), "Opened checkpoint store");
    let session = resume_or_start(&store, id)?;
    let store: Box<dyn CheckpointStore> = Box::new(store);
    Ok((session, Some(store)))
}

/// Load the session stored under exactly `id`, or start an empty one
///
/// Prefixes are not expanded here: a new id that happens to prefix a stored
/// one starts its own session.
pub fn resume_or_start(store: &dyn CheckpointStore, id: &str) -> Result<Session> {
    match store.load(id)? {
        Some(checkpoint) => {
            tracing::info!(
                session = %checkpoint.id,
                messages = checkpoint.messages.len(),
                "Resuming session"
            );
            Ok(Session::resume(checkpoint.id, checkpoint.messages))
        }
        None => {
            tracing::info!(session = %id, "Starting new session");
            Ok(Session::with_id(id))
        }
    }
}

/// Run one turn and checkpoint the session if it succeeded
///
/// A failed turn leaves both the session and the stored checkpoint as they
/// were.
pub async fn complete_turn(
    agent: &Agent,
    session: &mut Session,
    store: Option<&dyn CheckpointStore>,
    input: &str,
    observer: &dyn TurnObserver,
) -> Result<TurnOutcome> {
    let outcome = agent
        .run_turn_with_observer(session, input, observer)
        .await?;
    if let Some(store) = store {
        store.save(session, Some(agent.model_name()))?;
    }
    Ok(outcome)
}

// Chat command handler
pub mod chat {
    //! Interactive chat loop.
    //!
    //! Reads one line per turn. `exit` or `quit` ends the session, a blank
    //! line is ignored, anything else is sent to the agent and the answer is
    //! printed.

    use super::*;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// What a line of user input asks for
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum InputCommand<'a> {
        /// `exit` or `quit`, any case
        Exit,
        /// Nothing but whitespace
        Empty,
        /// Text for the agent, trimmed
        Prompt(&'a str),
    }

    /// Classify a line of user input
    ///
    /// # Examples
    ///
    /// ```
    /// use stepwise::commands::chat::{parse_input, InputCommand};
    ///
    /// assert_eq!(parse_input("  QUIT "), InputCommand::Exit);
    /// assert_eq!(parse_input("   "), InputCommand::Empty);
    /// assert_eq!(parse_input("hi "), InputCommand::Prompt("hi"));
    /// ```
    pub fn parse_input(line: &str) -> InputCommand<'_> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            InputCommand::Empty
        } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            InputCommand::Exit
        } else {
            InputCommand::Prompt(trimmed)
        }
    }

    /// Start interactive chat
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration
    /// * `provider_name` - Optional override for the configured provider
    /// * `session_id` - Persist the conversation under this id
    /// * `no_tools` - Chat without tools
    pub async fn run_chat(
        config: Config,
        provider_name: Option<String>,
        session_id: Option<String>,
        no_tools: bool,
    ) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let agent = build_agent(&config, provider_name.as_deref(), no_tools)?;
        let (mut session, store) = open_session(&config, session_id.as_deref())?;

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&agent, &session, store.is_some());

        loop {
            match rl.readline(&format!("{} ", "User:".green().bold())) {
                Ok(line) => {
                    let prompt = match parse_input(&line) {
                        InputCommand::Exit => break,
                        InputCommand::Empty => continue,
                        InputCommand::Prompt(prompt) => prompt,
                    };

                    if let Err(e) = rl.add_history_entry(prompt) {
                        tracing::debug!("Failed to record readline history: {}", e);
                    }

                    match complete_turn(
                        &agent,
                        &mut session,
                        store.as_deref(),
                        prompt,
                        &ConsoleObserver,
                    )
                    .await
                    {
                        Ok(outcome) => {
                            println!("\n{}\n", outcome.answer);
                        }
                        Err(e) => {
                            eprintln!("{} {}\n", "Error:".red(), e);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome_banner(agent: &Agent, session: &Session, persisted: bool) {
        println!("{}", "Stepwise".bold());
        println!("Model: {}", agent.model_name().cyan());
        if !agent.has_tools() {
            println!("Tools: {}", "disabled".yellow());
        }
        if persisted {
            println!(
                "Session: {} ({} messages)",
                session.id.cyan(),
                session.conversation.len()
            );
        }
        println!("Type {} or {} to leave.\n", "exit".bold(), "quit".bold());
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_input_exit_words() {
            for line in ["exit", "quit", "EXIT", "Quit", "  exit  ", "qUiT\n"] {
                assert_eq!(parse_input(line), InputCommand::Exit, "{:?}", line);
            }
        }

        #[test]
        fn test_parse_input_empty() {
            assert_eq!(parse_input(""), InputCommand::Empty);
            assert_eq!(parse_input(" \t "), InputCommand::Empty);
        }

        #[test]
        fn test_parse_input_prompt_is_trimmed() {
            assert_eq!(
                parse_input("  What's the weather in Paris?  "),
                InputCommand::Prompt("What's the weather in Paris?")
            );
            assert_eq!(parse_input("exit now"), InputCommand::Prompt("exit now"));
        }

        #[tokio::test]
        async fn test_run_chat_unknown_provider() {
            let config = Config::default();
            let result = run_chat(config, Some("unknown".to_string()), None, false).await;
            assert!(result.is_err());
        }
    }
}

// Run command handler
pub mod r#run {
    //! One-shot prompt execution.

    use super::*;

    /// Run a single prompt and print the answer
    ///
    /// # Errors
    ///
    /// Returns error if the prompt is empty or the turn fails
    pub async fn run_prompt(
        config: Config,
        prompt: String,
        provider_name: Option<String>,
        session_id: Option<String>,
        no_tools: bool,
    ) -> Result<()> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(
                crate::error::StepwiseError::Config("Prompt must not be empty".to_string()).into(),
            );
        }

        let agent = build_agent(&config, provider_name.as_deref(), no_tools)?;
        let (mut session, store) = open_session(&config, session_id.as_deref())?;

        let outcome =
            complete_turn(&agent, &mut session, store.as_deref(), prompt, &ConsoleObserver)
                .await?;
        tracing::debug!(
            planner_calls = outcome.planner_calls,
            tool_calls = outcome.tool_calls,
            tokens = outcome.usage.total_tokens,
            "Prompt finished"
        );
        println!("{}", outcome.answer);
        Ok(())
    }

}
