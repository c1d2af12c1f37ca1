//! Incremental terminal rendering of the transcript.

use crate::core::message::{Message, Sender};
use crate::core::store::Transcript;

fn prefix(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "🧑 You: ",
        Sender::Bot => "🤖 Bot: ",
    }
}

/// Tracks what has already been written so each snapshot only prints the
/// difference. A bot message stays open (no trailing newline) until the next
/// message arrives or [`TranscriptPrinter::close`] is called.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    generation: u64,
    printed: usize,
    open_bytes: Option<usize>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, transcript: &Transcript) -> String {
        let mut out = String::new();
        let messages = &transcript.messages;

        if transcript.generation != self.generation || self.printed > messages.len() {
            self.close_into(&mut out);
            self.generation = transcript.generation;
            self.printed = 0;
            if !messages.is_empty() {
                out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
            }
        }

        if let (Some(done), Some(open)) = (self.open_bytes, self.printed.checked_sub(1)) {
            let text = &messages[open].text;
            if let Some(fresh) = text.get(done..) {
                out.push_str(fresh);
            }
            self.open_bytes = Some(text.len().max(done));
        }

        for message in &messages[self.printed..] {
            self.close_into(&mut out);
            self.start(message, &mut out);
            self.printed += 1;
        }
        out
    }

    /// Terminate the open bot message, if any.
    pub fn close(&mut self) -> String {
        let mut out = String::new();
        self.close_into(&mut out);
        out
    }

    fn start(&mut self, message: &Message, out: &mut String) {
        out.push_str(prefix(message.sender));
        out.push_str(&message.text);
        if message.is_bot() {
            self.open_bytes = Some(message.text.len());
        } else {
            out.push('\n');
        }
    }

    fn close_into(&mut self, out: &mut String) {
        if self.open_bytes.take().is_some() {
            out.push('\n');
        }
    }
}
