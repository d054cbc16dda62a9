//! Error types for seccheck-receiver.
//!
//! Errors are split in two classes:
//!
//! - **Data plane** ([`FrameError`], [`EnvelopeError`], [`DispatchError`],
//!   wrapped in [`RecordError`]): a single record is malformed. The record is
//!   logged and dropped, the receiver keeps running.
//! - **Control plane** ([`SeccheckError`]): the receiver itself is no longer
//!   sound (socket setup, accept, read failures, unparseable envelopes). These
//!   terminate the process.
//!
//! [`FrameError`]: crate::protocol::FrameError
//! [`EnvelopeError`]: crate::protocol::EnvelopeError
//! [`DispatchError`]: crate::decoder::DispatchError

use thiserror::Error;

use crate::decoder::DispatchError;
use crate::protocol::{EnvelopeError, FrameError};
use crate::reactor::ConnectionId;

/// Fatal error type for receiver and producer operations.
#[derive(Debug, Error)]
pub enum SeccheckError {
    /// Binding or listening on the socket path failed.
    #[error("bind {path}: {source}")]
    Bind {
        /// Socket path that could not be bound.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// `accept` failed with something other than an interruption.
    #[error("accept: {0}")]
    Accept(#[source] std::io::Error),

    /// Reading from a registered connection failed.
    #[error("read from connection {connection}: {source}")]
    Read {
        /// Connection the read was issued on.
        connection: ConnectionId,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Envelope bytes passed the size checks but did not parse.
    #[error("envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    /// The event loop stopped taking registrations.
    #[error("event loop is gone, cannot register connection")]
    EventLoopGone,

    /// The event loop task panicked or was cancelled.
    #[error("event loop task failed: {0}")]
    EventLoopTask(#[from] tokio::task::JoinError),

    /// Connecting to a receiver socket failed.
    #[error("connect {path}: {source}")]
    Connect {
        /// Socket path that could not be reached.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Writing a frame to the receiver failed.
    #[error("write: {0}")]
    Write(#[source] std::io::Error),

    /// Configured maximum event size cannot hold any valid record.
    #[error("maximum event size {size} is below the minimum {min}")]
    MaxEventSizeTooSmall {
        /// Configured size.
        size: usize,
        /// Smallest usable size.
        min: usize,
    },

    /// Frame would exceed the maximum event size.
    #[error("frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge {
        /// Encoded frame size.
        size: usize,
        /// Maximum accepted by the receiver.
        max: usize,
    },
}

/// Result type alias using SeccheckError.
pub type Result<T> = std::result::Result<T, SeccheckError>;

/// Failure to turn one record read from the wire into a decoded event.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Frame header or sizes are inconsistent.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Envelope could not be unpacked.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// No decoder, or the decoder rejected the payload.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl RecordError {
    /// Whether this failure must terminate the receiver.
    ///
    /// Only an envelope that fails to parse at all is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordError::Envelope(e) if e.is_fatal())
    }
}
