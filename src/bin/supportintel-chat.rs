//! Interactive support console for triaging tickets with a hosted model.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! supportintel-chat
//!
//! # Start on a billing ticket with the second catalog model
//! supportintel-chat --category billing --model 2
//!
//! # Read the API key and model list from a config file
//! supportintel-chat --config supportintel.yaml
//!
//! # Disable colors (useful for piping output)
//! supportintel-chat --no-color
//! ```
//!
//! The API key is read from `OPENROUTER_API_KEY`, falling back to `api_key` in the config
//! file. Diagnostics go to stderr, filtered by `SUPPORTINTEL_LOG` (default `warn`).
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/model <id|number>` - Change the model
//! - `/category <name|number>` - Change the ticket category
//! - `/attach <path>` - Attach a screenshot to the next message
//! - `/new` - Start a new session
//! - `/quit` - Exit the application

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use supportintel::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use supportintel::utils::time::clock;
use supportintel::{Category, OpenRouter, Role, TracingClientLogger};

const LOG_ENV: &str = "SUPPORTINTEL_LOG";

/// Main entry point for the supportintel-chat application.
#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("supportintel-chat [OPTIONS]");
    let config = match ChatConfig::resolve(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ CRITICAL: {err}");
            return ExitCode::FAILURE;
        }
    };
    let Some(api_key) = config.api_key() else {
        eprintln!(
            "❌ CRITICAL: API Key not found. Set {} or add api_key to a --config file.",
            supportintel::API_KEY_ENV
        );
        return ExitCode::FAILURE;
    };

    let client = OpenRouter::with_options(
        Some(api_key),
        Some(config.base_url.clone()),
        Some(config.timeout),
    )
    .and_then(|client| client.with_app_identity(config.referer.clone(), config.title.clone()))
    .map(|client| client.with_logger(Arc::new(TracingClientLogger)));
    let client = match client {
        Ok(client) => client,
        Err(err) => {
            eprintln!("❌ CRITICAL: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(client, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<supportintel::Error>() {
                Some(err) if !err.is_recoverable() => eprintln!("❌ CRITICAL: {err}"),
                _ => eprintln!("❌ {err}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(client: OpenRouter, config: ChatConfig) -> Result<(), Box<dyn std::error::Error>> {
    let use_color = config.use_color;
    let mut session = ChatSession::new(client, config);

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut renderer = PlainTextRenderer::with_color(use_color).with_interrupt(interrupted.clone());
    let mut rl = DefaultEditor::new()?;

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    print_banner(&session);
    if let Some(advisory) = session.category().advisory() {
        renderer.print_advisory(advisory);
    }
    println!("Type /help for commands, /quit to exit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("Ticket> ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::New => {
                            session.new_session();
                            renderer.print_info("Started a new session.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Model(selection) => match session.select_model(&selection) {
                            Ok(model) => {
                                renderer.print_info(&format!("Model changed to: {model}"))
                            }
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Models => print_models(&session),
                        ChatCommand::Category(selection) => {
                            match session.select_category(&selection) {
                                Ok(category) => {
                                    renderer.print_info(&format!("Ticket category: {category}"));
                                    if let Some(advisory) = category.advisory() {
                                        renderer.print_advisory(advisory);
                                    }
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Categories => print_categories(session.category()),
                        ChatCommand::Attach(path) => match session.attach(&path) {
                            Ok(attachment) => renderer.print_info(&format!(
                                "Attached {} ({}, {} bytes) to the next message.",
                                attachment.display_name(),
                                attachment.media_type,
                                attachment.len()
                            )),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Detach => match session.detach() {
                            Some(attachment) => renderer
                                .print_info(&format!("Removed {}.", attachment.display_name())),
                            None => renderer.print_info("No attachment pending."),
                        },
                        ChatCommand::History => print_history(&session),
                        ChatCommand::Stats => print_stats(&session),
                        ChatCommand::ShowConfig => print_config(&session),
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to the model
                println!("Engineer:");
                let outcome = session.submit(line, &mut renderer).await;
                if let Some(err) = outcome.error() {
                    if !err.is_recoverable() {
                        return Err(Box::new(err.clone()));
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_banner(session: &ChatSession<OpenRouter>) {
    println!("DevCore Labs");
    println!("🛡️ DevCore Labs Technical Resolution System");
    println!(
        "SYSTEM STATUS: 🟢 OPERATIONAL | Engine: {} | Category: {}",
        session.model(),
        session.category()
    );
}

fn print_models(session: &ChatSession<OpenRouter>) {
    println!("    AI Resolution Engines:");
    let catalog = session.catalog();
    for (i, model) in catalog.models().iter().enumerate() {
        let marker = if model == session.model() { "*" } else { " " };
        match catalog.note(model) {
            Some(note) => println!("     {marker}{}. {model} ({note})", i + 1),
            None => println!("     {marker}{}. {model}", i + 1),
        }
    }
    if !catalog.contains(session.model()) {
        println!("     * custom: {}", session.model());
    }
}

fn print_categories(current: Category) {
    println!("    Ticket Categories:");
    for (i, category) in Category::ALL.iter().enumerate() {
        let marker = if *category == current { "*" } else { " " };
        println!("     {marker}{}. {category}", i + 1);
    }
}

fn print_history(session: &ChatSession<OpenRouter>) {
    if session.history().is_empty() {
        println!("    (no messages yet)");
        return;
    }
    for turn in session.history() {
        let speaker = match turn.role {
            Role::User => "You",
            Role::Assistant => "Engineer",
            Role::System => "System",
        };
        println!(
            "    [{}] {speaker}: {}",
            clock(turn.created_at),
            turn.content.as_text()
        );
    }
}

fn print_stats(session: &ChatSession<OpenRouter>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Category: {}", stats.category);
    println!(
        "      Turns: {} ({} user / {} assistant)",
        stats.turn_count, stats.user_turns, stats.assistant_turns
    );
    println!(
        "      Requests: {} ({} completed, {} empty, {} failed, {} interrupted)",
        stats.total_requests,
        stats.completed,
        stats.empty_responses,
        stats.failures,
        stats.interrupts
    );
    match stats.last_response_time {
        Some(elapsed) => println!("      Last response: {:.1}s", elapsed.as_secs_f64()),
        None => println!("      Last response: (none)"),
    }
    match stats.pending_attachment {
        Some(ref name) => println!("      Attachment: {name}"),
        None => println!("      Attachment: (none)"),
    }
}

fn print_config(session: &ChatSession<OpenRouter>) {
    let config = session.config();
    println!("    Current Configuration:");
    println!("      Model: {}", session.model());
    println!("      Category: {}", session.category());
    println!("      Base URL: {}", config.base_url);
    println!("      Referer: {}", config.referer);
    println!("      Title: {}", config.title);
    println!("      Timeout: {}s", config.timeout.as_secs());
    println!("      Context turns: {}", config.context_turns);
    println!(
        "      Color: {}",
        if config.use_color {
            "enabled"
        } else {
            "disabled"
        }
    );
}
