//! Reading a streamed reply into the transcript.

use futures_util::StreamExt;
use tracing::debug;

use super::decoder::Utf8StreamDecoder;
use super::store::MessageStore;
use crate::api::{BackendError, ByteStream};

/// The placeholder a stream writes into, and the transcript generation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTarget {
    pub generation: u64,
    pub message_id: u64,
}

/// Result of draining one reply stream.
#[derive(Debug)]
pub struct IngestReport {
    /// Everything decoded so far.
    pub text: String,
    pub chunks: usize,
    /// The transcript was replaced while the stream was running; later chunks
    /// were not written.
    pub detached: bool,
    pub error: Option<BackendError>,
}

/// Drain `stream`, keeping the target message equal to the text received so far.
///
/// Chunks are applied strictly in arrival order. Once the target is gone
/// (session switched, new chat) the rest of the stream is still read so the
/// backend can finish and persist the exchange, but nothing more is written.
pub async fn ingest(
    store: &MessageStore,
    target: StreamTarget,
    mut stream: ByteStream,
) -> IngestReport {
    let mut decoder = Utf8StreamDecoder::new();
    let mut report = IngestReport {
        text: String::new(),
        chunks: 0,
        detached: false,
        error: None,
    };

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                report.chunks += 1;
                let piece = decoder.decode(&bytes);
                if piece.is_empty() {
                    continue;
                }
                report.text.push_str(&piece);
                publish(store, target, &mut report);
            }
            Err(err) => {
                debug!(chunks = report.chunks, %err, "reply stream failed");
                report.error = Some(err);
                return report;
            }
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        report.text.push_str(&tail);
        publish(store, target, &mut report);
    }
    report
}

fn publish(store: &MessageStore, target: StreamTarget, report: &mut IngestReport) {
    if report.detached {
        return;
    }
    let text = &report.text;
    let written = store.mutate_in(target.generation, target.message_id, |message| {
        message.text.clone_from(text);
    });
    if !written {
        debug!(
            message_id = target.message_id,
            "transcript replaced mid-stream; dropping further chunks"
        );
        report.detached = true;
    }
}
