//! Stepwise - plan-and-act agent library
//!
//! A conversational agent that alternates between asking a hosted model for
//! the next step and running the tools it requested, until the model answers
//! in plain text.
//!
//! # Architecture
//!
//! - `agent`: Session, conversation, planner, executor and the turn loop
//! - `providers`: Model service abstraction and implementations (Groq, Ollama)
//! - `tools`: The `get_weather` and `run_command` tools
//! - `storage`: Checkpoint stores keyed by session id
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepwise::{Agent, Config, Session};
//! use stepwise::providers::create_provider;
//! use stepwise::tools::Toolbox;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let provider = create_provider(&config.provider.provider_type, &config.provider)?;
//!     let toolbox = Toolbox::from_config(&config.agent.tools)?;
//!     let agent = Agent::new(Arc::from(provider), toolbox, &config.agent)?;
//!
//!     let mut session = Session::new();
//!     let outcome = agent.run_turn(&mut session, "What's the weather in Paris?").await?;
//!     println!("{}", outcome.answer);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod storage;
pub mod tools;

// Re-export commonly used types
pub use agent::{Agent, Session, TurnOutcome};
pub use config::Config;
pub use error::{Result, StepwiseError};

#[cfg(test)]
pub mod test_utils;
