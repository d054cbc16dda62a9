//! Envelope unpacking.
//!
//! The envelope is a protobuf `google.protobuf.Any`: a type URL naming the
//! event point plus the serialized point message. The part of the URL after
//! [`TYPE_URL_PREFIX`] is the key used to pick a decoder.

use bytes::Bytes;
use prost::Message;
use prost_types::Any;
use thiserror::Error;

use crate::points::Point;

/// Prefix every type URL carries in front of the fully-qualified type name.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Reasons an envelope is rejected.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Bytes are not a protobuf `Any`.
    #[error("invalid proto message: {0}")]
    Malformed(#[from] prost::DecodeError),

    /// Type URL has nothing after the prefix.
    #[error("Invalid URL {type_url:?}")]
    UrlTooShort {
        /// URL as received.
        type_url: String,
    },

    /// Type URL prefix length does not fall on a character boundary.
    #[error("Invalid URL {type_url:?}: not a type name after the prefix")]
    InvalidUrl {
        /// URL as received.
        type_url: String,
    },
}

impl EnvelopeError {
    /// Whether this error terminates the receiver.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EnvelopeError::Malformed(_))
    }
}

/// An unpacked envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    // Always longer than TYPE_URL_PREFIX with a char boundary at its end.
    type_url: String,
    payload: Bytes,
}

impl Envelope {
    /// Parse envelope bytes and validate the type URL.
    pub fn unpack(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let any = Any::decode(bytes)?;
        if any.type_url.len() <= TYPE_URL_PREFIX.len() {
            return Err(EnvelopeError::UrlTooShort {
                type_url: any.type_url,
            });
        }
        if !any.type_url.is_char_boundary(TYPE_URL_PREFIX.len()) {
            return Err(EnvelopeError::InvalidUrl {
                type_url: any.type_url,
            });
        }
        Ok(Self {
            type_url: any.type_url,
            payload: Bytes::from(any.value),
        })
    }

    /// Full type URL.
    #[inline]
    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    /// Fully-qualified type name, e.g. `gvisor.syscall.Read`.
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_url[TYPE_URL_PREFIX.len()..]
    }

    /// Serialized point message.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialized point message as Bytes (cheap clone).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }
}

/// Type URL for a fully-qualified type name.
pub fn type_url(type_name: &str) -> String {
    format!("{TYPE_URL_PREFIX}{type_name}")
}

/// Wrap an event point in an envelope and serialize it.
///
/// # Example
///
/// ```
/// use seccheck_receiver::points::Read;
/// use seccheck_receiver::protocol::{pack, Envelope};
///
/// let bytes = pack(&Read { fd: 3, count: 64, exit: None });
/// let envelope = Envelope::unpack(&bytes).unwrap();
/// assert_eq!(envelope.type_name(), "gvisor.syscall.Read");
/// ```
pub fn pack<P: Point>(point: &P) -> Vec<u8> {
    pack_raw(P::TYPE_NAME, point.encode_to_vec())
}

/// Wrap already-serialized payload bytes in an envelope.
pub fn pack_raw(type_name: &str, payload: Vec<u8>) -> Vec<u8> {
    Any {
        type_url: type_url(type_name),
        value: payload,
    }
    .encode_to_vec()
}
