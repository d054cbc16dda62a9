//! # seccheck-receiver
//!
//! Receiver for sandbox security-check events.
//!
//! Producers connect over an `AF_UNIX`/`SOCK_SEQPACKET` socket and send one
//! record per event. Each record is a small little-endian header followed by
//! a protobuf `Any` envelope; the envelope's type name selects the decoder.
//!
//! ## Architecture
//!
//! - **Acceptor**: accepts producers and registers them with the event loop
//! - **Event loop**: one outstanding read per connection, decodes each record
//!   as it arrives and hands the result to an [`EventSink`]
//!
//! Malformed records are logged and dropped. Socket failures and envelopes
//! that cannot be parsed stop the receiver.
//!
//! ## Example
//!
//! ```ignore
//! use seccheck_receiver::{Server, StdoutSink};
//!
//! #[tokio::main]
//! async fn main() -> seccheck_receiver::Result<()> {
//!     let server = Server::builder().socket_path("/tmp/123.sock").bind().await?;
//!     server.run(StdoutSink::new()).await
//! }
//! ```

pub mod decoder;
pub mod error;
pub mod points;
pub mod protocol;
pub mod reactor;
pub mod sink;
pub mod transport;

mod remote;
mod server;

pub use decoder::{DecodedEvent, DecoderRegistry, EventBody};
pub use error::{RecordError, Result, SeccheckError};
pub use remote::Remote;
pub use server::{Server, ServerBuilder, DEFAULT_SOCKET_PATH};
pub use sink::{ChannelSink, EventSink, JsonLinesSink, StdoutSink};
