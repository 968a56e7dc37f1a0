//! Incremental assembly of a streamed assistant reply.
//!
//! Chunks arrive as raw bytes. They are decoded across chunk boundaries,
//! appended to the reply, and each new text snapshot is published on a
//! `watch` channel. A render loop consumes snapshots one at a time; while it
//! is busy, newer snapshots replace older unseen ones, so only the latest
//! text is ever rendered next.

use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ChatResult;
use crate::message::Message;

/// How a stream ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    /// Cancelled by the caller. Text appended before the cancel is kept.
    Aborted,
}

/// UTF-8 decoder that carries an incomplete trailing sequence over to the
/// next chunk. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + chunk` as is complete.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        let mut consumed = 0;

        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid_up_to + bad;
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            consumed += valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Flushes whatever is left once the stream ends.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Builds one streamed reply and publishes its text after every append.
pub struct MessageAssembler {
    message: Message,
    decoder: Utf8ChunkDecoder,
    snapshots: watch::Sender<String>,
}

impl MessageAssembler {
    /// The receiver sees the initial (usually empty) text first.
    pub fn new(message: Message) -> (Self, watch::Receiver<String>) {
        let (snapshots, rx) = watch::channel(message.message.clone());
        (
            Self {
                message,
                decoder: Utf8ChunkDecoder::new(),
                snapshots,
            },
            rx,
        )
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Appends a chunk. Returns whether any text was added.
    pub fn append(&mut self, chunk: &[u8]) -> bool {
        let text = self.decoder.decode(chunk);
        self.push_text(text)
    }

    fn push_text(&mut self, text: String) -> bool {
        if text.is_empty() {
            return false;
        }
        self.message.message.push_str(&text);
        // No receivers left is fine; the message itself is the record.
        let _ = self.snapshots.send(self.message.message.clone());
        true
    }

    /// Drains `stream` until it ends, fails, or `cancel` fires.
    ///
    /// The assembled message is always returned, including on failure, with
    /// `streaming` cleared. A chunk error that is itself an abort counts as
    /// [`StreamOutcome::Aborted`]. Dropping the assembler here closes the
    /// snapshot channel, which ends any [`render_loop`] reading it.
    pub async fn run<S, B>(
        mut self,
        mut stream: S,
        cancel: CancellationToken,
    ) -> (Message, ChatResult<StreamOutcome>)
    where
        S: Stream<Item = ChatResult<B>> + Unpin,
        B: AsRef<[u8]>,
    {
        let mut chunks = 0usize;
        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(chunks, id = %self.message.id, "stream cancelled");
                    break Ok(StreamOutcome::Aborted);
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(chunk)) => {
                            chunks += 1;
                            self.append(chunk.as_ref());
                        }
                        Some(Err(e)) if e.is_abort() => {
                            debug!(chunks, id = %self.message.id, "stream aborted by source");
                            break Ok(StreamOutcome::Aborted);
                        }
                        Some(Err(e)) => {
                            warn!(chunks, id = %self.message.id, error = %e, "stream failed");
                            break Err(e);
                        }
                        None => break Ok(StreamOutcome::Completed),
                    }
                }
            }
        };

        let tail = self.decoder.finish();
        self.push_text(tail);
        self.message.streaming = false;
        (self.message, outcome)
    }
}

/// Calls `on_snapshot` for the current text, then for each newer snapshot
/// until the sender is dropped. Snapshots published while a call is running
/// collapse into the latest one. Returns the number of calls.
pub async fn render_loop<F>(mut rx: watch::Receiver<String>, mut on_snapshot: F) -> usize
where
    F: FnMut(&str),
{
    let mut renders = 0;
    {
        let first = rx.borrow_and_update().clone();
        on_snapshot(&first);
        renders += 1;
    }
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        on_snapshot(&snapshot);
        renders += 1;
    }
    renders
}
