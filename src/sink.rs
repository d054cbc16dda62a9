//! Event sinks.
//!
//! A sink takes ownership of every decoded event. The event loop owns its
//! sink exclusively, so implementations need no internal locking.
//!
//! - [`StdoutSink`] - one text line per event
//! - [`JsonLinesSink`] - one JSON object per line on any writer
//! - [`ChannelSink`] - forwards events to another task

use std::io::Write;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::decoder::DecodedEvent;

/// Failure to hand an event over.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the event failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The receiving side of a channel is gone.
    #[error("sink channel closed")]
    Closed,
}

/// Destination for decoded events.
pub trait EventSink: Send + 'static {
    /// Take ownership of one event.
    fn emit(&mut self, event: DecodedEvent) -> Result<(), SinkError>;
}

/// Prints events to standard output in text form.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    /// Create a new stdout sink.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for StdoutSink {
    fn emit(&mut self, event: DecodedEvent) -> Result<(), SinkError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{event}")?;
        out.flush()?;
        Ok(())
    }
}

/// Writes each event as a JSON object followed by `\n`.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send + 'static> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: DecodedEvent) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Forwards events over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DecodedEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DecodedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: DecodedEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Closed)
    }
}
