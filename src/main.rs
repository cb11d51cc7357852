//! Stepwise - plan-and-act agent CLI
//!
#![doc = "Main entry point for the Stepwise agent application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stepwise::cli::{Cli, Commands};
use stepwise::commands;
use stepwise::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Pick up GROQ_API_KEY and friends from a local .env
    let dotenv = dotenvy::dotenv();

    init_tracing(cli.verbose);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            provider,
            session,
            no_tools,
        } => {
            if let Some(p) = &provider {
                tracing::debug!("Using provider override: {}", p);
            }
            commands::chat::run_chat(config, provider, session, no_tools).await?;
            Ok(())
        }
        Commands::Run {
            prompt,
            provider,
            session,
            no_tools,
        } => {
            tracing::info!("Running single prompt");
            commands::run::run_prompt(config, prompt, provider, session, no_tools).await?;
            Ok(())
        }
        Commands::Sessions { command } => {
            commands::sessions::handle_sessions(&config, command)?;
            Ok(())
        }
    }
}

/// Initialize tracing; logs go to stderr so answers on stdout stay clean
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "stepwise=debug"
    } else {
        "stepwise=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
