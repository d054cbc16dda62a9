//! Decoder module - payload decoding and dispatch.
//!
//! Provides:
//! - [`DecoderRegistry`] - maps type names to decoders
//! - [`DecodedEvent`] - what a sink receives
//! - [`decode_record`] - the full record → event chain

mod event;
mod registry;

use bytes::Bytes;

pub use event::{DecodedEvent, EventBody, Phase};
pub use registry::{
    DecodeError, DecodeResult, Decoder, DecoderRegistry, DispatchError, RegistryBuilder,
    TypedDecoder,
};

use crate::error::RecordError;
use crate::protocol::{Envelope, Frame};
use crate::reactor::ConnectionId;

/// Decode one record read from `connection`.
///
/// Runs frame decoding, envelope unpacking and dispatch. Exactly one frame is
/// taken from the record; bytes after it are reported and ignored.
pub fn decode_record(
    decoders: &DecoderRegistry,
    connection: ConnectionId,
    record: &Bytes,
    max_event_size: usize,
) -> Result<DecodedEvent, RecordError> {
    let frame = Frame::decode_with_max(record, max_event_size)?;
    if frame.trailing() > 0 {
        tracing::warn!(
            %connection,
            "Ignoring {} bytes after a {} byte record",
            frame.trailing(),
            frame.header.total_size
        );
    }

    let envelope = Envelope::unpack(frame.envelope())?;
    let body = decoders.dispatch(envelope.type_name(), envelope.payload())?;

    Ok(DecodedEvent {
        connection,
        type_name: envelope.type_name().to_string(),
        dropped_count: frame.dropped_count(),
        body,
    })
}
