//! Unix seqpacket socket implementation.
//!
//! `SOCK_SEQPACKET` keeps record boundaries: every `recv` returns exactly one
//! record as written by the producer.
//!
//! # Example
//!
//! ```ignore
//! use seccheck_receiver::transport::{Accept, SeqpacketListener};
//!
//! let mut listener = SeqpacketListener::bind("/tmp/123.sock")?;
//! let conn = listener.accept().await?;
//! ```

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tokio_seqpacket::{UnixSeqpacket, UnixSeqpacketListener};

use super::{Accept, RecordStream};

/// Remove a leftover socket file. A missing file is not an error.
pub fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed stale socket {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Seqpacket listener bound to a filesystem path.
///
/// The socket file is removed when the listener is dropped.
pub struct SeqpacketListener {
    listener: UnixSeqpacketListener,
    path: PathBuf,
}

impl SeqpacketListener {
    /// Bind and listen on a socket path.
    ///
    /// Removes any existing socket file at the path before binding.
    /// Must be called from within a tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        remove_stale_socket(path)?;

        let listener = UnixSeqpacketListener::bind(path)?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Get the socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SeqpacketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

impl std::fmt::Debug for SeqpacketListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeqpacketListener")
            .field("path", &self.path)
            .finish()
    }
}

impl Accept for SeqpacketListener {
    type Conn = UnixSeqpacket;

    fn accept(&mut self) -> impl Future<Output = io::Result<UnixSeqpacket>> + Send + '_ {
        self.listener.accept()
    }
}

impl RecordStream for UnixSeqpacket {
    fn recv<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = io::Result<usize>> + Send + 'a {
        UnixSeqpacket::recv(self, buf)
    }
}

/// Connect to a seqpacket socket path.
pub async fn connect(path: impl AsRef<Path>) -> io::Result<UnixSeqpacket> {
    UnixSeqpacket::connect(path).await
}
