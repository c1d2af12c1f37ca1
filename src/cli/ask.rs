//! TUI-less "ask" command

use std::error::Error;
use std::io::{self, Write};

use crate::core::controller::ChatController;
use crate::core::error::SendError;

pub async fn run_ask(
    controller: &ChatController,
    prompt: Vec<String>,
    use_query_engine: bool,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: tok ask <prompt>");
        std::process::exit(1);
    }

    let mut transcript = controller.subscribe_transcript();
    let mut shown = 0usize;
    let mut stdout = io::stdout();

    let submit = controller.submit(&prompt, use_query_engine);
    tokio::pin!(submit);

    let result = loop {
        tokio::select! {
            result = &mut submit => break result,
            changed = transcript.changed() => {
                if changed.is_err() {
                    break (&mut submit).await;
                }
                let text = transcript
                    .borrow_and_update()
                    .messages
                    .last()
                    .filter(|message| message.is_bot())
                    .map(|message| message.text.clone());
                if let Some(fresh) = text.as_deref().and_then(|text| text.get(shown..)) {
                    write!(stdout, "{fresh}")?;
                    stdout.flush()?;
                    shown += fresh.len();
                }
            }
        }
    };

    match result {
        Ok(reply) => {
            if let Some(rest) = reply.text.get(shown..) {
                write!(stdout, "{rest}")?;
            }
            writeln!(stdout)?;
            Ok(())
        }
        Err(SendError::Interrupted { partial, source }) => {
            if let Some(rest) = partial.get(shown..) {
                write!(stdout, "{rest}")?;
            }
            writeln!(stdout)?;
            eprintln!("⚠️  Reply interrupted: {source}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }
}
