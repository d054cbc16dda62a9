//! Transport module - record-oriented local sockets.
//!
//! The reactor only needs two capabilities, expressed as traits so it can be
//! driven by anything that preserves record boundaries:
//! - [`Accept`] - hand out new connections
//! - [`RecordStream`] - receive one record per call
//!
//! [`SeqpacketListener`] and `tokio_seqpacket::UnixSeqpacket` implement them
//! over `AF_UNIX`/`SOCK_SEQPACKET`.

use std::future::Future;
use std::io;

mod socket;

pub use socket::{connect, remove_stale_socket, SeqpacketListener};
pub use tokio_seqpacket::UnixSeqpacket;

/// A connection that yields whole records.
pub trait RecordStream: Send + Sync + 'static {
    /// Receive one record into `buf`, returning its length.
    ///
    /// `Ok(0)` means the peer shut the connection down.
    fn recv<'a>(&'a self, buf: &'a mut [u8])
        -> impl Future<Output = io::Result<usize>> + Send + 'a;
}

/// A listener handing out new connections.
pub trait Accept: Send + 'static {
    /// Connection type produced by `accept`.
    type Conn: RecordStream;

    /// Wait for and accept the next connection.
    fn accept(&mut self) -> impl Future<Output = io::Result<Self::Conn>> + Send + '_;
}
