//! Interactive terminal client for the College Resource Chatbot.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a server on http://localhost:3001
//! crcbot
//!
//! # Point at another server
//! crcbot --base-url http://10.0.0.5:3001
//! CRCBOT_BASE_URL=http://10.0.0.5:3001 crcbot
//!
//! # Disable colors (useful for piping output)
//! crcbot --no-color
//! ```
//!
//! Type a question and press Enter. Replies that point at a course document
//! are shown as a download link. Failed requests are logged to stderr (set
//! `RUST_LOG=debug` for request tracing) and produce no reply.

use std::cell::RefCell;
use std::rc::Rc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use crcbot::chat::{
    ChatArgs, ChatCommand, ChatConfig, ConversationStore, PlainTextRenderer, SessionStats,
    TranscriptRenderer, attach, help_text, parse_command,
};

/// Main entry point for the crcbot application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("crcbot [OPTIONS]");
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    let client = config.client()?;
    let endpoint = client.endpoint()?;
    tracing::info!(%endpoint, timeout = ?client.timeout(), "starting chat client");

    let store = ConversationStore::new(client);
    let renderer = Rc::new(RefCell::new(PlainTextRenderer::with_color(use_color)));
    attach(&store, Rc::clone(&renderer));
    let mut rl = DefaultEditor::new()?;

    renderer.borrow_mut().print_info(&format!(
        "College Resource Chatbot\n\
         Your assistant for academic resources ({endpoint})\n\
         Type /help for commands, /quit to exit\n\n\
         Welcome to CRCBOT!!"
    ))?;

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                if let Some(cmd) = parse_command(&line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            let help = indent(help_text());
                            report(renderer.borrow_mut().print_info(&help));
                        }
                        ChatCommand::History => {
                            report(
                                PlainTextRenderer::with_color(use_color)
                                    .with_user_echo(true)
                                    .render_history(&store.history()),
                            );
                        }
                        ChatCommand::Stats => {
                            let stats = format_stats(&store.stats(), endpoint.as_str());
                            report(renderer.borrow_mut().print_info(&stats));
                        }
                        ChatCommand::Invalid(message) => {
                            report(renderer.borrow_mut().print_error(&message));
                        }
                    }
                    continue;
                }

                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.trim());
                }

                // Enter submits the buffered line; the store ignores blank input.
                store.set_draft(line);
                if let Err(err) = store.submit_draft().await {
                    tracing::debug!(error = %err, "no reply for this message");
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - discard the line
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                report(
                    renderer
                        .borrow_mut()
                        .print_error(&format!("Input error: {}", err)),
                );
                break;
            }
        }
    }

    Ok(())
}

fn report(drawn: crcbot::Result<()>) {
    if let Err(err) = drawn {
        tracing::warn!(error = %err, "could not write to the terminal");
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_stats(stats: &SessionStats, endpoint: &str) -> String {
    [
        "Session Statistics:".to_string(),
        format!("  Endpoint: {}", endpoint),
        format!("  Messages: {}", stats.message_count),
        format!("  Questions asked: {}", stats.user_messages),
        format!("  Replies: {}", stats.bot_messages),
        format!("  Document links: {}", stats.document_links),
        format!("  Failed requests: {}", stats.failed_requests),
        format!(
            "  Request pending: {}",
            if stats.pending { "yes" } else { "no" }
        ),
    ]
    .iter()
    .map(|line| indent(line))
    .collect::<Vec<_>>()
    .join("\n")
}
