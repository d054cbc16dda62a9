//! Protocol module - wire format, framing, and envelopes.
//!
//! This module implements the receive side of the event stream:
//! - 10-byte little-endian record header decoding with bounds checks
//! - Frame struct with typed accessors
//! - `google.protobuf.Any` envelope unpacking

mod envelope;
mod frame;
mod wire_format;

pub use envelope::{pack, pack_raw, type_url, Envelope, EnvelopeError, TYPE_URL_PREFIX};
pub use frame::{build_frame, build_frame_parts, Frame};
pub use wire_format::{
    decode_frame, FrameError, FrameHeader, FIXED_HEADER_LEN, HEADER_LEN, MAX_EVENT_SIZE,
    MIN_EVENT_SIZE,
    SIZE_FIELD_LEN,
};
