//! Interactive chat loop

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use muslimgpt_agent::{ConversationController, SendOutcome};
use muslimgpt_core::session::{SessionContext, SessionRegistry, SessionState};
use muslimgpt_core::store::Role;
use muslimgpt_core::utils::display_title;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing::{info, warn};

use crate::TITLE_DISPLAY_CHARS;

/// One line of user input, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatCommand {
    Prompt(String),
    New,
    Sessions(String),
    Open(String),
    Delete(String),
    History,
    Help,
    Quit,
    Unknown(String),
}

impl ChatCommand {
    /// Lines starting with `/` are commands; `//` escapes a literal slash
    fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if let Some(escaped) = trimmed.strip_prefix("//") {
            return ChatCommand::Prompt(format!("/{}", escaped));
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return ChatCommand::Prompt(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim().to_string()),
            None => (rest, String::new()),
        };

        match name {
            "new" => ChatCommand::New,
            "sessions" | "search" => ChatCommand::Sessions(arg),
            "open" => ChatCommand::Open(arg),
            "delete" => ChatCommand::Delete(arg),
            "history" => ChatCommand::History,
            "help" => ChatCommand::Help,
            "quit" | "exit" => ChatCommand::Quit,
            _ => ChatCommand::Unknown(name.to_string()),
        }
    }
}

/// Resolve `/open` and `/delete` arguments: a 1-based index into the last
/// listing, or a session id / unique id prefix.
fn resolve_selector(
    selector: &str,
    listed: &[String],
    registry: &SessionRegistry,
) -> muslimgpt_core::Result<String> {
    if let Ok(index) = selector.parse::<usize>() {
        if let Some(session_id) = index.checked_sub(1).and_then(|i| listed.get(i)) {
            return Ok(session_id.clone());
        }
    }
    registry.find(selector).map(|entry| entry.session_id.clone())
}

/// Resolve a `--session` argument against the saved sessions.
///
/// Unknown or ambiguous selectors print a ✗ line and yield `None`; an id is
/// never minted from user input.
pub(crate) fn resolve_session(
    controller: &ConversationController,
    selector: &str,
) -> Result<Option<String>> {
    let registry = controller.registry()?;
    match registry.find(selector) {
        Ok(entry) => Ok(Some(entry.session_id.clone())),
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            Ok(None)
        }
    }
}

pub(crate) fn print_message(role: Role, content: &str) {
    match role {
        Role::User => println!("{} {}", style("You:").bold().green(), content),
        Role::Assistant => println!("{} {}\n", style("MuslimGPT:").bold().cyan(), content),
    }
}

fn print_help() {
    println!("{}", style("Commands").bold());
    println!("  /new               Start a new chat");
    println!("  /sessions [query]  List saved sessions, optionally filtered by title");
    println!("  /open <n|id>       Open a listed session");
    println!("  /delete <n|id>     Delete a listed session");
    println!("  /history           Show the current conversation");
    println!("  /help              Show this help");
    println!("  /quit              Leave the chat");
    println!("  //text             Send a prompt that starts with /");
    println!();
}

fn print_history(ctx: &SessionContext) {
    if ctx.is_empty() {
        println!("{}", style("No messages yet.").dim());
        return;
    }
    for turn in ctx.messages() {
        print_message(turn.role, &turn.content);
    }
}

/// List sessions matching `query` and return their ids in display order
fn list_sessions(registry: &SessionRegistry, query: &str, active: &str) -> Vec<String> {
    let entries = registry.search(query);
    if entries.is_empty() {
        println!("{}", style("No sessions found.").dim());
        return Vec::new();
    }

    for (index, entry) in entries.iter().enumerate() {
        let marker = if entry.session_id == active { "*" } else { " " };
        println!(
            " {}{:>3}. {}",
            marker,
            index + 1,
            display_title(&entry.title, TITLE_DISPLAY_CHARS)
        );
    }
    println!();

    entries.into_iter().map(|e| e.session_id.clone()).collect()
}

/// Send a prompt with a spinner running until the reply arrives
pub(crate) async fn send_with_spinner(
    controller: &ConversationController,
    ctx: &mut SessionContext,
    prompt: &str,
) -> muslimgpt_core::Result<SendOutcome> {
    if prompt.trim().is_empty() {
        return controller.send(ctx, prompt).await;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = controller.send(ctx, prompt).await;
    spinner.finish_and_clear();
    outcome
}

/// Run the interactive chat loop until `/quit` or end of input
pub async fn run(controller: &ConversationController, session: Option<&str>) -> Result<()> {
    let mut ctx = SessionContext::new();
    let mut listed: Vec<String> = Vec::new();

    if let Some(selector) = session {
        let Some(session_id) = resolve_session(controller, selector)? else {
            return Ok(());
        };
        controller.load_session(&mut ctx, &session_id)?;
    }

    println!("{}", style("MuslimGPT").bold().cyan());
    println!(
        "Model: {}. Type {} for commands.\n",
        controller.model(),
        style("/help").cyan()
    );
    if ctx.state() == SessionState::Active {
        print_history(&ctx);
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{} ", style(">").bold().green());
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        match ChatCommand::parse(line.trim_end_matches(['\r', '\n'])) {
            ChatCommand::Prompt(prompt) => {
                match send_with_spinner(controller, &mut ctx, &prompt).await? {
                    SendOutcome::Ignored => {}
                    SendOutcome::Replied(reply) => print_message(Role::Assistant, &reply),
                    SendOutcome::Failed(failure) => {
                        println!("{} {}\n", style("Error:").bold().red(), failure);
                    }
                }
            }
            ChatCommand::New => {
                controller.new_session(&mut ctx);
                println!("{}\n", style("Started a new chat.").dim());
            }
            ChatCommand::Sessions(query) => {
                let registry = controller.registry()?;
                listed = list_sessions(&registry, &query, ctx.session_id());
            }
            ChatCommand::Open(selector) => {
                let registry = controller.registry()?;
                match resolve_selector(&selector, &listed, &registry) {
                    Ok(session_id) => {
                        controller.load_session(&mut ctx, &session_id)?;
                        let title = registry.title(&session_id).unwrap_or_default();
                        println!("{} {}\n", style("Opened:").bold(), title);
                        print_history(&ctx);
                    }
                    Err(e) => println!("{} {}\n", style("✗").red(), e),
                }
            }
            ChatCommand::Delete(selector) => {
                let registry = controller.registry()?;
                match resolve_selector(&selector, &listed, &registry) {
                    Ok(session_id) => {
                        controller.delete_session(&session_id)?;
                        listed.retain(|id| id != &session_id);
                        println!("{} Deleted session\n", style("✓").green().bold());
                        if session_id == ctx.session_id() {
                            info!("Active session deleted, starting a new one");
                            controller.new_session(&mut ctx);
                        }
                    }
                    Err(e) => println!("{} {}\n", style("✗").red(), e),
                }
            }
            ChatCommand::History => print_history(&ctx),
            ChatCommand::Help => print_help(),
            ChatCommand::Quit => break,
            ChatCommand::Unknown(name) => {
                warn!("Unknown chat command: {}", name);
                println!("Unknown command /{}. Type /help for commands.\n", name);
            }
        }
    }

    Ok(())
}
