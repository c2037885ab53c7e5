use std::io::Write;

use anyhow::Result;
use parley_core::models::{ChatEvent, Composer, Conversation, ErrorStore, Role, StreamStatus};
use parley_core::render::{render_with_theme, to_ansi};
use parley_core::{ChatController, SendOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::commands::{self, Command, HELP};

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

fn prompt(controller: &ChatController, composer: &Composer) {
    let name = controller
        .active_conversation()
        .map(|c| c.name().to_string())
        .unwrap_or_else(|| "no conversation".to_string());
    let attachment = if composer.is_url_picker_open() {
        " [url?]"
    } else if composer.attachment().is_some() {
        " [image]"
    } else {
        ""
    };
    print!("{DIM}{name}{attachment}{RESET} > ");
    let _ = std::io::stdout().flush();
}

/// Resolve a sidebar position (1-based) or a raw conversation id
fn resolve(controller: &ChatController, target: &str) -> Option<String> {
    let sidebar = controller.sidebar();
    if let Ok(n) = target.parse::<usize>()
        && let Some(conv) = n.checked_sub(1).and_then(|i| sidebar.get(i))
    {
        return Some(conv.id().to_string());
    }
    sidebar
        .iter()
        .find(|c| c.id() == target)
        .map(|c| c.id().to_string())
}

fn print_thread(conversation: &Conversation, theme: &str) {
    println!("── {} ──", conversation.name());
    for message in conversation.messages() {
        match message.role {
            Role::User => {
                println!("you: {}", message.content);
                if let Some(url) = &message.image_url {
                    let shown = if url.starts_with("data:") { "(inline image)" } else { url.as_str() };
                    println!("     {DIM}image: {shown}{RESET}");
                }
            }
            Role::Assistant => {
                println!("{}", to_ansi(&render_with_theme(&message.content, theme)));
            }
        }
        println!();
    }
}

fn print_errors(errors: &ErrorStore) {
    let entries = errors.get_all_entries();
    if entries.is_empty() {
        println!("No warnings or errors.");
        return;
    }
    println!(
        "{} error(s), {} warning(s):",
        errors.error_count(),
        errors.warning_count()
    );
    for entry in entries {
        let time = chrono::DateTime::<chrono::Local>::from(entry.timestamp).format("%H:%M:%S");
        println!("  {time} {:?} {}: {}", entry.level, entry.target, entry.message);
    }
}

/// Print streaming output as it arrives and the rendered reply once committed
async fn print_events(
    controller: ChatController,
    mut events: tokio::sync::broadcast::Receiver<ChatEvent>,
    theme: String,
) {
    let mut printed = 0;
    loop {
        match events.recv().await {
            Ok(ChatEvent::StreamingStarted { .. }) => {
                printed = 0;
                print!("\n{DIM}");
            }
            Ok(ChatEvent::StreamingBufferUpdated { buffer, .. }) => {
                if let Some(new_text) = buffer.get(printed..) {
                    print!("{new_text}");
                    printed = buffer.len();
                }
            }
            Ok(ChatEvent::StreamingEnded {
                conversation_id,
                status,
            }) => {
                println!("{RESET}");
                match status {
                    StreamStatus::Completed => {
                        let reply = controller
                            .conversation(&conversation_id)
                            .and_then(|c| c.last_message().cloned());
                        if let Some(reply) = reply {
                            println!("\n{}\n", to_ansi(&render_with_theme(&reply.content, &theme)));
                        }
                    }
                    StreamStatus::Cancelled => println!("[stopped]"),
                    StreamStatus::Failed(error) => println!("[failed: {error}]"),
                }
                print!("> ");
            }
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Event printer fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        }
        let _ = std::io::stdout().flush();
    }
}

pub async fn run(controller: ChatController, errors: ErrorStore, theme: String) -> Result<()> {
    let printer = tokio::spawn(print_events(
        controller.clone(),
        controller.subscribe(),
        theme.clone(),
    ));
    let mut composer = Composer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("parley. /help for commands.");
    prompt(&controller, &composer);

    while let Some(line) = lines.next_line().await? {
        let Some(command) = commands::parse(&line) else {
            prompt(&controller, &composer);
            continue;
        };

        match command {
            Command::Text(url) if composer.is_url_picker_open() => match composer.attach_url(&url) {
                Ok(()) => println!("Attached {url}"),
                Err(e) => println!("Not attached: {e}"),
            },
            Command::Text(text) => {
                composer.set_text(text);
                if !composer.can_send(controller.is_streaming()) {
                    println!("Still answering; /stop to cancel.");
                } else if let Some(outbound) = composer.send() {
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        if let SendOutcome::Busy = controller.send(outbound).await {
                            println!("Still answering; /stop to cancel.");
                        }
                    });
                    // The printer owns the terminal until the reply ends
                    continue;
                }
            }
            Command::New => {
                controller.create_conversation().await;
            }
            Command::List => {
                let active = controller.active_conversation_id();
                let sidebar = controller.sidebar();
                if sidebar.is_empty() {
                    println!("No conversations yet.");
                }
                for (i, conv) in sidebar.iter().enumerate() {
                    let marker = if active.as_deref() == Some(conv.id()) { '*' } else { ' ' };
                    println!(
                        "{marker} {:>2}. {} ({} messages)",
                        i + 1,
                        conv.name(),
                        conv.message_count()
                    );
                }
            }
            Command::Open(target) => match resolve(&controller, &target) {
                Some(id) => {
                    controller.set_active(&id);
                    if let Some(conv) = controller.conversation(&id) {
                        print_thread(&conv, &theme);
                    }
                }
                None => println!("No conversation {target}"),
            },
            Command::Rename(new_name) => match controller.active_conversation_id() {
                Some(id) => {
                    controller.rename_conversation(&id, &new_name).await;
                }
                None => println!("No active conversation."),
            },
            Command::Delete(target) => {
                let id = match target {
                    Some(target) => resolve(&controller, &target),
                    None => controller.active_conversation_id(),
                };
                match id {
                    Some(id) => {
                        controller.delete_conversation(&id).await;
                    }
                    None => println!("Nothing to delete."),
                }
            }
            Command::Image(path) => match composer.attach_file(&path) {
                Ok(()) => println!("Attached {}", path.display()),
                Err(e) => println!("Not attached: {e}"),
            },
            Command::Url(Some(url)) => match composer.attach_url(&url) {
                Ok(()) => println!("Attached {url}"),
                Err(e) => println!("Not attached: {e}"),
            },
            Command::Url(None) => composer.toggle_url_picker(),
            Command::Detach => composer.clear_attachment(),
            Command::Stop => {
                // At most one reply streams, possibly in a conversation that is no longer open
                if !controller.stop_all() {
                    println!("Nothing is streaming.");
                }
            }
            Command::Errors => print_errors(&errors),
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Unknown(input) => println!("Unknown command {input}; /help lists commands."),
        }
        prompt(&controller, &composer);
    }

    controller.stop_all();
    printer.abort();
    Ok(())
}
