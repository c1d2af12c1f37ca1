//! Interactive line-based chat loop.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::Timelike;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::settings_complete;
use crate::cli::commands::{self, SlashCommand, HELP};
use crate::cli::history::{print_history, resolve_handle};
use crate::cli::model_list::print_models;
use crate::cli::transcript::TranscriptPrinter;
use crate::cli::upload::run_upload;
use crate::core::activity::Activity;
use crate::core::controller::ChatController;
use crate::core::error::SendError;
use crate::core::models::ModelTarget;

pub const SAMPLE_PROMPTS: [&str; 4] = [
    "How can I plan a trip?",
    "What are some ideas for a personal project?",
    "Can you help me with time management tips?",
    "How do I create a budget?",
];

pub fn greeting(hour: u32) -> &'static str {
    if hour < 12 {
        "Good morning!"
    } else if hour < 18 {
        "Good afternoon!"
    } else {
        "Good evening!"
    }
}

fn print_welcome() {
    println!("{}", greeting(chrono::Local::now().hour()));
    println!("Try one of these, or ask anything (/help for commands):");
    for prompt in SAMPLE_PROMPTS {
        println!("  • {prompt}");
    }
}

/// Render the transcript as it changes. The open reply is closed off when
/// the controller goes idle.
fn spawn_printer(controller: Arc<ChatController>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut transcript = controller.subscribe_transcript();
        let mut activity = controller.subscribe_activity();
        let mut printer = TranscriptPrinter::new();

        let initial = printer.render(&transcript.borrow_and_update());
        emit(&initial);

        loop {
            tokio::select! {
                changed = transcript.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let out = printer.render(&transcript.borrow_and_update());
                    emit(&out);
                }
                changed = activity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if activity.borrow_and_update().is_idle() {
                        // The last chunk may have landed after the idle notice.
                        let out = printer.render(&transcript.borrow_and_update());
                        emit(&out);
                        emit(&printer.close());
                    }
                }
            }
        }
    })
}

fn emit(text: &str) {
    if text.is_empty() {
        return;
    }
    let mut stdout = io::stdout();
    let _ = write!(stdout, "{text}");
    let _ = stdout.flush();
}

fn report_send_error(err: &SendError) {
    match err {
        SendError::EmptyQuery => {}
        SendError::Busy(activity) => println!("⏳ Please wait, {activity}."),
        SendError::Connection(source) => {
            eprintln!("❌ Could not reach the chat backend: {source}")
        }
        SendError::Interrupted { source, .. } => {
            eprintln!("⚠️  Reply interrupted, keeping what arrived: {source}")
        }
    }
}

fn spawn_switch(controller: Arc<ChatController>, target: ModelTarget) {
    println!("🔄 Switching {} model to {}...", target.kind.as_str(), target.name);
    if !controller.activity().is_idle() {
        println!("   (waiting for the current reply to finish)");
    }
    tokio::spawn(async move {
        controller.switch_model(target.clone()).await;
        let models = controller.models();
        match models.selected(target.kind) {
            Some(name) if name == target.name => println!("✅ Now using {name}"),
            Some(name) => eprintln!("⚠️  Model switch failed; still using {name}"),
            None => eprintln!("⚠️  Model switch failed"),
        }
    });
}

pub async fn run_chat(
    controller: Arc<ChatController>,
    use_query_engine: bool,
) -> Result<(), Box<dyn Error>> {
    match controller.settings().await {
        Ok(settings) if !settings_complete(&settings) => {
            println!("⚙️  Backend settings are incomplete; answers may fail until they are filled in.");
            println!("   Run `tok settings` to see what is missing, `tok settings set <key> <value>` to fill it in.");
        }
        Ok(_) => {}
        Err(err) => eprintln!("❌ Could not reach the chat backend: {err}"),
    }

    match controller.restore_on_startup().await {
        Ok(Some(summary)) => println!(
            "📖 Restored {} ({} exchanges)",
            summary.title.as_deref().unwrap_or(&summary.handle),
            summary.exchanges
        ),
        Ok(None) => {}
        Err(err) => eprintln!("⚠️  Could not restore the last session: {err}"),
    }
    let _ = controller.load_history_index().await;
    let _ = controller.refresh_models().await;

    if controller.messages().is_empty() {
        print_welcome();
    }

    let printer = spawn_printer(controller.clone());
    let mut rag = use_query_engine;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match commands::parse(line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("⚠️  {message}");
                continue;
            }
        };

        let Some(command) = command else {
            if controller.activity() != Activity::Idle {
                println!("⏳ Please wait, {}.", controller.activity());
                continue;
            }
            let controller = controller.clone();
            let query = line.to_string();
            tokio::spawn(async move {
                if let Err(err) = controller.submit(&query, rag).await {
                    report_send_error(&err);
                }
            });
            continue;
        };

        debug!(?command, "slash command");
        match command {
            SlashCommand::New => {
                controller.start_new_session().await;
                print_welcome();
            }
            SlashCommand::History => {
                if let Err(err) = controller.load_history_index().await {
                    eprintln!("⚠️  {err}; showing the last list");
                }
                print_history(&controller.history());
            }
            SlashCommand::Open(choice) => {
                let handle = resolve_handle(&controller.history(), &choice);
                match controller.select_session(&handle).await {
                    Ok(summary) => println!(
                        "📖 Opened {} ({} exchanges)",
                        summary.title.as_deref().unwrap_or(&summary.handle),
                        summary.exchanges
                    ),
                    Err(err) => eprintln!("❌ {err}"),
                }
            }
            SlashCommand::Models => match controller.refresh_models().await {
                Ok(catalog) => print_models(&catalog),
                Err(err) => eprintln!("❌ Could not list models: {err}"),
            },
            SlashCommand::Model(name) => spawn_switch(controller.clone(), ModelTarget::llm(name)),
            SlashCommand::Embed(name) => spawn_switch(controller.clone(), ModelTarget::embed(name)),
            SlashCommand::Rag => {
                rag = !rag;
                if rag {
                    println!("📚 Answering from uploaded documents");
                } else {
                    println!("💬 Answering from the model alone");
                }
            }
            SlashCommand::Upload { paths, metadata } => {
                let controller = controller.clone();
                tokio::spawn(async move { run_upload(&controller, &paths, metadata).await });
            }
            SlashCommand::Help => println!("{HELP}"),
            SlashCommand::Quit => break,
        }
    }

    printer.abort();
    Ok(())
}
