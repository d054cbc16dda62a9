//! Frame struct with typed accessors.
//!
//! Represents one validated record read from a connection.
//! Uses `bytes::Bytes` so the envelope shares the read buffer.
//!
//! # Example
//!
//! ```
//! use seccheck_receiver::protocol::{build_frame, Frame};
//! use bytes::Bytes;
//!
//! let record = Bytes::from(build_frame(b"hello", 2));
//! let frame = Frame::decode(&record).unwrap();
//!
//! assert_eq!(frame.dropped_count(), 2);
//! assert_eq!(frame.envelope(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{decode_frame, FrameError, FrameHeader, HEADER_LEN, MAX_EVENT_SIZE};

/// A validated record: header plus envelope bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: FrameHeader,
    /// Envelope bytes (zero-copy slice of the read buffer).
    pub envelope: Bytes,
    trailing: usize,
}

impl Frame {
    /// Decode a record using the default maximum event size.
    pub fn decode(record: &Bytes) -> Result<Self, FrameError> {
        Self::decode_with_max(record, MAX_EVENT_SIZE)
    }

    /// Decode a record, rejecting anything larger than `max_event_size`.
    pub fn decode_with_max(record: &Bytes, max_event_size: usize) -> Result<Self, FrameError> {
        let (header, envelope) = decode_frame(record, max_event_size)?;
        let envelope = record.slice_ref(envelope);
        Ok(Self {
            header,
            envelope,
            trailing: record.len() - header.total_size as usize,
        })
    }

    /// Get a reference to the envelope bytes.
    #[inline]
    pub fn envelope(&self) -> &[u8] {
        &self.envelope
    }

    /// Get the producer's drop counter.
    #[inline]
    pub fn dropped_count(&self) -> u32 {
        self.header.dropped_count
    }

    /// Bytes in the read after this record's `total_size`.
    #[inline]
    pub fn trailing(&self) -> usize {
        self.trailing
    }
}

/// Build a complete record as a single byte vector.
///
/// Uses the minimal header size. Use `build_frame_parts` for
/// scatter/gather I/O (writev).
///
/// # Example
///
/// ```
/// use seccheck_receiver::protocol::build_frame;
///
/// let bytes = build_frame(b"hello", 0);
/// assert_eq!(bytes.len(), 10 + 5); // header + envelope
/// ```
pub fn build_frame(envelope: &[u8], dropped_count: u32) -> Vec<u8> {
    let header = FrameHeader::for_envelope(envelope.len(), dropped_count);
    let mut buf = Vec::with_capacity(HEADER_LEN + envelope.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(envelope);
    buf
}

/// Build record parts for scatter/gather I/O.
///
/// Returns the encoded header and a reference to the envelope.
pub fn build_frame_parts(envelope: &[u8], dropped_count: u32) -> ([u8; HEADER_LEN], &[u8]) {
    let header = FrameHeader::for_envelope(envelope.len(), dropped_count);
    (header.encode(), envelope)
}
