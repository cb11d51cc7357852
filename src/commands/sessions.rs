//! Session inspection: list, show and delete stored checkpoints

use crate::cli::SessionCommand;
use crate::config::Config;
use crate::error::{Result, StepwiseError};
use crate::providers::{Message, Role};
use crate::storage::{CheckpointStore, SqliteCheckpointStore, StoredSession};
use colored::Colorize;
use prettytable::{format, Table};

const UUID_LEN: usize = 36;

/// Handle session commands against the configured checkpoint store
pub fn handle_sessions(config: &Config, command: SessionCommand) -> Result<()> {
    let store = SqliteCheckpointStore::open(&config.storage)?;
    run_command(&store, command)
}

fn run_command(store: &dyn CheckpointStore, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::List => {
            let sessions = store.list()?;
            if sessions.is_empty() {
                println!("{}", "No stored sessions found.".yellow());
                return Ok(());
            }

            println!("\nSessions:");
            session_table(&sessions).printstd();
            println!();
            println!(
                "Use {} to resume a session.",
                "stepwise chat --session <ID>".cyan()
            );
            println!();
        }
        SessionCommand::Show { id } => {
            let checkpoint = match store.resolve(&id)? {
                Some(resolved) => store.load(&resolved)?,
                None => None,
            }
            .ok_or_else(|| StepwiseError::Storage(format!("Session not found: {}", id)))?;

            println!("{} {}", "Session".bold(), checkpoint.id.cyan());
            println!("Title: {}", checkpoint.title);
            println!(
                "Model: {}\n",
                checkpoint.model.as_deref().unwrap_or("-")
            );
            for message in &checkpoint.messages {
                println!("{}", render_message(message));
            }
        }
        SessionCommand::Delete { id } => {
            let Some(resolved) = store.resolve(&id)? else {
                return Err(StepwiseError::Storage(format!("Session not found: {}", id)).into());
            };
            store.delete(&resolved)?;
            println!("{}", format!("Deleted session {}", resolved).green());
        }
    }

    Ok(())
}

/// Short display id: uuids are cut to 8 characters, custom ids are kept
fn display_id(id: &str) -> &str {
    if id.len() == UUID_LEN && id.is_char_boundary(8) {
        &id[..8]
    } else {
        id
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn session_table(sessions: &[StoredSession]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Model".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for session in sessions {
        table.add_row(prettytable::row![
            display_id(&session.id).cyan(),
            shorten(&session.title, 40),
            session.model.as_deref().unwrap_or("-"),
            session.message_count,
            session.updated_at.format("%Y-%m-%d %H:%M")
        ]);
    }
    table
}

fn render_message(message: &Message) -> String {
    let label = match message.role {
        Role::User => "user".green().bold(),
        Role::Assistant => "assistant".blue().bold(),
        Role::Tool => "tool".yellow().bold(),
        Role::System => "system".dimmed(),
    };

    let calls = message.requested_tools();
    if !calls.is_empty() {
        let rendered: Vec<String> = calls
            .iter()
            .map(|call| format!("{}({})", call.function.name, call.function.arguments))
            .collect();
        return format!("{}: {}", label, rendered.join(", "));
    }
    format!("{}: {}", label, message.text())
}
