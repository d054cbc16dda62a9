//! Wire format encoding and decoding.
//!
//! Every record starts with a 10-byte fixed header:
//! ```text
//! ┌────────────┬─────────────┬───────────────┬──────────────────┐
//! │ Total size │ Header size │ Dropped count │ Envelope ...     │
//! │ 4 bytes    │ 2 bytes     │ 4 bytes       │ total - 4 - hdr  │
//! │ uint32 LE  │ uint16 LE   │ uint32 LE     │                  │
//! └────────────┴─────────────┴───────────────┴──────────────────┘
//! ```
//!
//! `total_size` counts itself and everything up to the end of the envelope.
//! `header_size` counts the bytes between the size field and the envelope,
//! so producers may grow the header without breaking older receivers.
//!
//! All multi-byte integers are Little Endian.

use thiserror::Error;

/// Size of the leading `total_size` field.
pub const SIZE_FIELD_LEN: usize = 4;

/// Size of the fixed header fields following `total_size`
/// (`header_size` + `dropped_count`).
pub const FIXED_HEADER_LEN: usize = 6;

/// Fixed header size in bytes (exactly 10).
pub const HEADER_LEN: usize = SIZE_FIELD_LEN + FIXED_HEADER_LEN;

/// Maximum size of a single event record (300 KiB).
pub const MAX_EVENT_SIZE: usize = 300 * 1024;

/// Smallest record that can carry an envelope: full header plus one byte.
pub const MIN_EVENT_SIZE: usize = HEADER_LEN + 1;

/// Reasons a record is rejected before its envelope is looked at.
///
/// None of these are fatal: the record is reported and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Not even the size field fits in the read.
    #[error("empty record: {len} bytes, need at least {SIZE_FIELD_LEN}")]
    Empty {
        /// Bytes available.
        len: usize,
    },

    /// `total_size` exceeds the maximum event size.
    #[error("invalid message size {total_size}, maximum is {max}")]
    TooLarge {
        /// Size announced by the producer.
        total_size: u32,
        /// Configured maximum.
        max: usize,
    },

    /// Fewer bytes than the header or the announced payload require.
    #[error("message was truncated, size: {actual}, expected: {expected}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// `header_size` does not cover the fixed header fields.
    #[error("header size ({header_size}) is smaller than the fixed header ({FIXED_HEADER_LEN})")]
    HeaderTooSmall {
        /// Header size announced by the producer.
        header_size: u16,
    },

    /// `header_size` leaves no room for an envelope inside `total_size`.
    #[error("header size ({header_size}) is larger than message {total_size}")]
    HeaderTooLarge {
        /// Header size announced by the producer.
        header_size: u16,
        /// Total size announced by the producer.
        total_size: u32,
    },
}

/// Decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Size of the whole record, including this field.
    pub total_size: u32,
    /// Bytes from the end of `total_size` to the start of the envelope.
    pub header_size: u16,
    /// Events the producer dropped before this one.
    pub dropped_count: u32,
}

impl FrameHeader {
    /// Header for an envelope of `envelope_len` bytes using the minimal
    /// header size.
    pub fn for_envelope(envelope_len: usize, dropped_count: u32) -> Self {
        Self {
            total_size: (HEADER_LEN + envelope_len) as u32,
            header_size: FIXED_HEADER_LEN as u16,
            dropped_count,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use seccheck_receiver::protocol::FrameHeader;
    ///
    /// let header = FrameHeader::for_envelope(5, 0);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 10);
    /// assert_eq!(&bytes[..4], &15u32.to_le_bytes());
    /// ```
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.total_size.to_le_bytes());
        buf[4..6].copy_from_slice(&self.header_size.to_le_bytes());
        buf[6..10].copy_from_slice(&self.dropped_count.to_le_bytes());
        buf
    }

    /// Decode and bound-check the fixed header.
    ///
    /// `total_size` is checked against `max_event_size` before any other
    /// field is read. `header_size` is not validated here; see [`decode_frame`].
    pub fn decode(buf: &[u8], max_event_size: usize) -> Result<Self, FrameError> {
        let Some(size) = buf.get(..SIZE_FIELD_LEN) else {
            return Err(FrameError::Empty { len: buf.len() });
        };
        let total_size = u32::from_le_bytes([size[0], size[1], size[2], size[3]]);
        if total_size as usize > max_event_size {
            return Err(FrameError::TooLarge {
                total_size,
                max: max_event_size,
            });
        }

        let Some(fixed) = buf.get(SIZE_FIELD_LEN..HEADER_LEN) else {
            return Err(FrameError::Truncated {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        };
        let header_size = u16::from_le_bytes([fixed[0], fixed[1]]);
        let dropped_count = u32::from_le_bytes([fixed[2], fixed[3], fixed[4], fixed[5]]);

        Ok(Self {
            total_size,
            header_size,
            dropped_count,
        })
    }

    /// Offset of the envelope from the start of the record.
    #[inline]
    pub fn envelope_offset(&self) -> usize {
        SIZE_FIELD_LEN + self.header_size as usize
    }

    /// Envelope length implied by the header.
    ///
    /// An empty envelope is rejected along with underflow: it cannot carry a
    /// type URL.
    pub fn envelope_len(&self) -> Result<usize, FrameError> {
        (self.total_size as usize)
            .checked_sub(self.envelope_offset())
            .filter(|&len| len > 0)
            .ok_or(FrameError::HeaderTooLarge {
                header_size: self.header_size,
                total_size: self.total_size,
            })
    }
}

/// Validate a record and locate its envelope.
///
/// Returns the header and the envelope slice of exactly the announced size.
/// Bytes past `total_size` are not part of the result.
///
/// A `header_size` that overruns `total_size` is `HeaderTooLarge` whatever
/// its value; `HeaderTooSmall` applies only to headers that fit.
pub fn decode_frame(buf: &[u8], max_event_size: usize) -> Result<(FrameHeader, &[u8]), FrameError> {
    let header = FrameHeader::decode(buf, max_event_size)?;
    let len = header.envelope_len()?;
    if (header.header_size as usize) < FIXED_HEADER_LEN {
        return Err(FrameError::HeaderTooSmall {
            header_size: header.header_size,
        });
    }
    let offset = header.envelope_offset();

    let available = buf.len().saturating_sub(offset);
    if available < len {
        return Err(FrameError::Truncated {
            expected: len,
            actual: available,
        });
    }

    Ok((header, &buf[offset..offset + len]))
}
