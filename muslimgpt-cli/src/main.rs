//! CLI entry point for MuslimGPT

mod chat;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Password};
use muslimgpt_agent::{ConversationController, SendOutcome};
use muslimgpt_core::config::{Config, ConfigLoader};
use muslimgpt_core::logging::init_logging;
use muslimgpt_core::session::{SessionContext, SessionRegistry};
use muslimgpt_core::store::JsonlMessageStore;
use muslimgpt_core::utils::{display_title, expand_tilde};
use muslimgpt_providers::GeminiClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Characters of a session title shown in lists
pub(crate) const TITLE_DISPLAY_CHARS: usize = 30;

#[derive(Parser)]
#[command(name = "muslimgpt")]
#[command(about = "Chat with MuslimGPT from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize MuslimGPT configuration
    Onboard,
    /// Start an interactive chat
    Chat {
        /// Session id (or unique prefix) to resume
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Send a single message and print the reply
    Ask {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Session id (or unique prefix) to continue
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Show status information
    Status,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List saved sessions, newest first
    List {
        /// Only sessions whose title contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Print the messages of a session
    Show {
        /// Session id or unique prefix
        session_id: String,
    },
    /// Delete a session and all its messages
    Delete {
        /// Session id or unique prefix
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    let config = config_loader.load()?;
    let _log_guard = init_logging(&config.logging);

    match cli.command {
        Commands::Onboard => {
            info!("Running onboard command");
            run_onboard(&config_loader, config)?;
        }
        Commands::Chat { session } => {
            info!("Starting interactive chat");
            let controller = build_controller(&config)?;
            chat::run(&controller, session.as_deref()).await?;
        }
        Commands::Ask { message, session } => {
            info!("Processing one-shot message");
            run_ask(&config, &message, session).await?;
        }
        Commands::Sessions { command } => {
            let controller = build_controller(&config)?;
            match command {
                SessionCommands::List { search } => {
                    run_sessions_list(&controller, search.as_deref().unwrap_or(""))?
                }
                SessionCommands::Show { session_id } => {
                    run_sessions_show(&controller, &session_id)?
                }
                SessionCommands::Delete { session_id } => {
                    run_sessions_delete(&controller, &session_id)?
                }
            }
        }
        Commands::Status => {
            info!("Showing status");
            run_status(&config_loader, &config)?;
        }
    }

    Ok(())
}

/// Wire the file store and the Gemini client into a controller
fn build_controller(config: &Config) -> Result<ConversationController> {
    let store = JsonlMessageStore::open(expand_tilde(&config.store.path))?;
    let client = GeminiClient::from_config(config)?;

    Ok(ConversationController::new(
        Arc::new(store),
        Arc::new(client),
        config.agent.system_instruction.clone(),
    ))
}

/// Run the onboard wizard
fn run_onboard(loader: &ConfigLoader, mut config: Config) -> Result<()> {
    println!("{}", style("Welcome to MuslimGPT!").bold().cyan());
    println!("Let's set up your configuration.\n");

    let config_path = loader.config_path();
    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Onboard cancelled.");
            return Ok(());
        }
    }

    let api_key: String = Password::new()
        .with_prompt("Enter your Google Gemini API key (leave empty to use GOOGLE_API_KEY)")
        .allow_empty_password(true)
        .interact()?;

    let model: String = Input::new()
        .with_prompt("Enter the model to use")
        .default(config.agent.model.clone())
        .interact_text()?;

    config.providers.gemini.api_key = api_key.trim().to_string();
    config.agent.model = model;

    loader.save(&config)?;

    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    println!("Config location: {}", config_path.display());
    println!("\nYou can now run:");
    println!("  {} - Start chatting", style("muslimgpt chat").cyan());
    println!(
        "  {} - Ask a single question",
        style("muslimgpt ask --message 'What is Zakat?'").cyan()
    );

    Ok(())
}

async fn run_ask(config: &Config, message: &str, session: Option<String>) -> Result<()> {
    let controller = build_controller(config)?;
    let mut ctx = SessionContext::new();
    if let Some(selector) = session {
        let Some(session_id) = chat::resolve_session(&controller, &selector)? else {
            return Ok(());
        };
        controller.load_session(&mut ctx, &session_id)?;
    }

    match chat::send_with_spinner(&controller, &mut ctx, message).await? {
        SendOutcome::Ignored => {
            println!("Nothing to send.");
        }
        SendOutcome::Replied(reply) => {
            println!("{}", reply);
            println!("\n{} {}", style("Session:").dim(), ctx.session_id());
        }
        SendOutcome::Failed(failure) => {
            error!("Error processing message: {}", failure);
            anyhow::bail!("Failed to process message: {}", failure);
        }
    }

    Ok(())
}

fn run_sessions_list(controller: &ConversationController, query: &str) -> Result<()> {
    let registry = controller.registry()?;
    let entries = registry.search(query);

    if entries.is_empty() {
        if query.is_empty() {
            println!("No sessions yet.");
        } else {
            println!("No sessions match '{}'.", query);
        }
        return Ok(());
    }

    println!("{}", style("Sessions").bold().cyan());
    for (index, entry) in entries.iter().enumerate() {
        println!(
            "  {:>3}. {}  {}",
            index + 1,
            style(display_title(&entry.title, TITLE_DISPLAY_CHARS)).bold(),
            style(&entry.session_id).dim()
        );
    }

    Ok(())
}

fn run_sessions_show(controller: &ConversationController, selector: &str) -> Result<()> {
    let registry = controller.registry()?;
    let Ok(entry) = registry.find(selector) else {
        println!("{} Session {} not found", style("✗").red(), selector);
        return Ok(());
    };

    println!("{}", style(&entry.title).bold().cyan());
    println!("{}\n", style(&entry.session_id).dim());
    for record in controller.store().session_records(&entry.session_id)? {
        chat::print_message(record.role, &record.content);
    }

    Ok(())
}

fn run_sessions_delete(controller: &ConversationController, selector: &str) -> Result<()> {
    let registry = controller.registry()?;
    let session_id = match registry.find(selector) {
        Ok(entry) => entry.session_id.clone(),
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            return Ok(());
        }
    };

    let removed = controller.delete_session(&session_id)?;
    println!(
        "{} Deleted session {} ({} messages)",
        style("✓").green().bold(),
        session_id,
        removed
    );

    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config) -> Result<()> {
    println!("{}", style("MuslimGPT Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config file: {}", loader.config_path().display());
    println!("  Model: {}", config.agent.model);
    let key_status = if config.providers.gemini.api_key().is_some() {
        style("configured").green()
    } else {
        style("not configured").red()
    };
    println!("  Gemini API key: {}", key_status);
    println!();

    let store_path = expand_tilde(&config.store.path);
    println!("{}", style("Store:").bold());
    println!("  Path: {}", store_path.display());
    let session_count = if store_path.exists() {
        SessionRegistry::load(&JsonlMessageStore::open(&store_path)?)?.len()
    } else {
        0
    };
    println!("  Sessions: {}", session_count);

    Ok(())
}
