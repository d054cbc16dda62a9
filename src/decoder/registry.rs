//! Decoder registry for dispatching payloads by type name.
//!
//! The registry maps fully-qualified type names to decoders. It is built
//! once through [`RegistryBuilder`] and is read-only afterwards, so the event
//! loop can share it without locking.
//!
//! # Example
//!
//! ```
//! use seccheck_receiver::decoder::DecoderRegistry;
//! use seccheck_receiver::points::{Open, Read, Start};
//!
//! let registry = DecoderRegistry::builder()
//!     .point::<Read>()
//!     .point::<Open>()
//!     .point::<Start>()
//!     .build();
//!
//! assert!(registry.get("gvisor.syscall.Read").is_some());
//! assert!(registry.get("unknown.Type").is_none());
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;

use thiserror::Error;

use super::EventBody;
use crate::points::{Open, Point, Read, Start};

/// Payload could not be turned into an event.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not a valid message of the registered type.
    #[error("failed to decode {type_name}: {source}")]
    Proto {
        /// Type the payload was decoded as.
        type_name: &'static str,
        /// Underlying protobuf error.
        #[source]
        source: prost::DecodeError,
    },

    /// Payload parsed but its content is unusable.
    #[error("invalid {type_name} payload: {reason}")]
    Invalid {
        /// Type the payload was decoded as.
        type_name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Dispatch outcome other than a decoded event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No decoder registered under the type name.
    #[error("No callback registered for {type_name}")]
    NotFound {
        /// Type name from the envelope.
        type_name: String,
    },

    /// The decoder rejected the payload.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Result type for decoder functions.
pub type DecodeResult = std::result::Result<EventBody, DecodeError>;

/// Trait for decoder functions.
pub trait Decoder: Send + Sync + 'static {
    /// Decode raw payload bytes.
    fn decode(&self, payload: &[u8]) -> DecodeResult;
}

impl<F> Decoder for F
where
    F: Fn(&[u8]) -> DecodeResult + Send + Sync + 'static,
{
    fn decode(&self, payload: &[u8]) -> DecodeResult {
        self(payload)
    }
}

/// Decoder for a protobuf event point.
pub struct TypedDecoder<P> {
    _phantom: PhantomData<fn() -> P>,
}

impl<P> TypedDecoder<P>
where
    P: Point + Into<EventBody>,
{
    /// Create a new typed decoder.
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<P> Default for TypedDecoder<P>
where
    P: Point + Into<EventBody>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Decoder for TypedDecoder<P>
where
    P: Point + Into<EventBody>,
{
    fn decode(&self, payload: &[u8]) -> DecodeResult {
        P::decode(payload)
            .map(Into::into)
            .map_err(|source| DecodeError::Proto {
                type_name: P::TYPE_NAME,
                source,
            })
    }
}

/// Builder collecting `(type name, decoder)` pairs.
#[derive(Default)]
pub struct RegistryBuilder {
    decoders: HashMap<String, Box<dyn Decoder>>,
}

impl RegistryBuilder {
    /// Register the typed decoder for an event point under its type name.
    pub fn point<P>(self) -> Self
    where
        P: Point + Into<EventBody>,
    {
        self.decoder(P::TYPE_NAME, TypedDecoder::<P>::new())
    }

    /// Register a decoder under an explicit type name.
    ///
    /// A later registration for the same name replaces the earlier one.
    pub fn decoder(mut self, type_name: &str, decoder: impl Decoder) -> Self {
        if self
            .decoders
            .insert(type_name.to_string(), Box::new(decoder))
            .is_some()
        {
            tracing::warn!("Decoder for {} registered twice, keeping the last", type_name);
        }
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> DecoderRegistry {
        DecoderRegistry {
            decoders: self.decoders,
        }
    }
}

/// Immutable registry mapping type names to decoders.
pub struct DecoderRegistry {
    decoders: HashMap<String, Box<dyn Decoder>>,
}

impl DecoderRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with every built-in event point.
    pub fn with_defaults() -> Self {
        Self::builder()
            .point::<Read>()
            .point::<Open>()
            .point::<Start>()
            .build()
    }

    /// Get a decoder by type name.
    pub fn get(&self, type_name: &str) -> Option<&dyn Decoder> {
        self.decoders.get(type_name).map(|d| d.as_ref())
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered decoders.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode a payload with the decoder registered for `type_name`.
    pub fn dispatch(&self, type_name: &str, payload: &[u8]) -> Result<EventBody, DispatchError> {
        let decoder = self.get(type_name).ok_or_else(|| DispatchError::NotFound {
            type_name: type_name.to_string(),
        })?;

        Ok(decoder.decode(payload)?)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
