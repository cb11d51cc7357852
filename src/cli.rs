//! Command-line interface definition for Stepwise
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot prompts and
//! checkpoint inspection.

use clap::{Parser, Subcommand};

/// Stepwise - plan-and-act agent loop
///
/// Chat with a hosted model that can look up the weather and run
/// shell commands on your behalf.
#[derive(Parser, Debug, Clone)]
#[command(name = "stepwise")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the checkpoint database path
    #[arg(long = "db", global = true)]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Stepwise
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start interactive chat with the agent
    Chat {
        /// Override the provider from config (groq, ollama)
        #[arg(short, long)]
        provider: Option<String>,

        /// Persist the conversation under this session id
        #[arg(short, long)]
        session: Option<String>,

        /// Chat without offering any tools to the model
        #[arg(long)]
        no_tools: bool,
    },

    /// Run a single prompt through the agent and print the answer
    Run {
        /// Prompt to execute
        #[arg(long)]
        prompt: String,

        /// Override the provider from config (groq, ollama)
        #[arg(short, long)]
        provider: Option<String>,

        /// Continue (and persist) the conversation stored under this session id
        #[arg(short, long)]
        session: Option<String>,

        /// Run without offering any tools to the model
        #[arg(long)]
        no_tools: bool,
    },

    /// Inspect persisted sessions
    Sessions {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },
}

/// Checkpoint inspection subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List stored sessions, most recently updated first
    List,

    /// Print the messages of a stored session
    Show {
        /// Session id (or unique prefix)
        id: String,
    },

    /// Delete a stored session
    Delete {
        /// Session id (or unique prefix)
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            command: Commands::Sessions {
                command: SessionCommand::List,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(cli.storage_path.is_none());
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                command: SessionCommand::List
            }
        ));
    }

    #[test]
    fn test_cli_parse_chat_command() {
        let cli = Cli::try_parse_from(["stepwise", "chat"]).unwrap();
        if let Commands::Chat {
            provider,
            session,
            no_tools,
        } = cli.command
        {
            assert_eq!(provider, None);
            assert_eq!(session, None);
            assert!(!no_tools);
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_cli_parse_chat_with_all_flags() {
        let cli = Cli::try_parse_from([
            "stepwise",
            "chat",
            "--provider",
            "ollama",
            "--session",
            "trip-planning",
            "--no-tools",
        ])
        .unwrap();
        if let Commands::Chat {
            provider,
            session,
            no_tools,
        } = cli.command
        {
            assert_eq!(provider, Some("ollama".to_string()));
            assert_eq!(session, Some("trip-planning".to_string()));
            assert!(no_tools);
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_cli_parse_run_with_prompt() {
        let cli = Cli::try_parse_from(["stepwise", "run", "--prompt", "Weather in Oslo?"]).unwrap();
        if let Commands::Run {
            prompt, session, ..
        } = cli.command
        {
            assert_eq!(prompt, "Weather in Oslo?");
            assert_eq!(session, None);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_run_requires_prompt() {
        assert!(Cli::try_parse_from(["stepwise", "run"]).is_err());
    }

    #[test]
    fn test_cli_parse_sessions_show() {
        let cli = Cli::try_parse_from(["stepwise", "sessions", "show", "abc123"]).unwrap();
        if let Commands::Sessions {
            command: SessionCommand::Show { id },
        } = cli.command
        {
            assert_eq!(id, "abc123");
        } else {
            panic!("Expected Sessions Show command");
        }
    }

    #[test]
    fn test_cli_parse_global_db_after_subcommand() {
        let cli =
            Cli::try_parse_from(["stepwise", "sessions", "list", "--db", "/tmp/s.db"]).unwrap();
        assert_eq!(cli.storage_path, Some("/tmp/s.db".to_string()));
    }

    #[test]
    fn test_cli_parse_with_config_and_verbose() {
        let cli =
            Cli::try_parse_from(["stepwise", "--config", "custom.yaml", "-v", "chat"]).unwrap();
        assert_eq!(cli.config, Some("custom.yaml".to_string()));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_parse_missing_command() {
        assert!(Cli::try_parse_from(["stepwise"]).is_err());
    }

    #[test]
    fn test_cli_parse_invalid_command() {
        assert!(Cli::try_parse_from(["stepwise", "invalid"]).is_err());
    }
}
