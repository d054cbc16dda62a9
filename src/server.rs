//! Server builder and runtime.
//!
//! The [`ServerBuilder`] collects configuration and binds the socket. The
//! [`Server`] then runs two tasks:
//! 1. Acceptor - accepts producers and registers them
//! 2. Event loop - reads records from all producers and feeds the sink
//!
//! # Example
//!
//! ```ignore
//! use seccheck_receiver::{Server, StdoutSink};
//!
//! #[tokio::main]
//! async fn main() -> seccheck_receiver::Result<()> {
//!     let server = Server::builder()
//!         .socket_path("/tmp/123.sock")
//!         .bind()
//!         .await?;
//!
//!     server.run(StdoutSink::new()).await
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::decoder::DecoderRegistry;
use crate::error::{Result, SeccheckError};
use crate::protocol::{MAX_EVENT_SIZE, MIN_EVENT_SIZE};
use crate::reactor::{Acceptor, EventLoop};
use crate::sink::EventSink;
use crate::transport::SeqpacketListener;

/// Socket path used when none is given.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/123.sock";

/// Builder for configuring and binding a [`Server`].
pub struct ServerBuilder {
    socket_path: PathBuf,
    max_event_size: usize,
    decoders: DecoderRegistry,
}

impl ServerBuilder {
    /// Create a builder with the default path and decoders.
    pub fn new() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            max_event_size: MAX_EVENT_SIZE,
            decoders: DecoderRegistry::with_defaults(),
        }
    }

    /// Set the socket path to listen on.
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Set the maximum accepted record size.
    ///
    /// Must be at least [`MIN_EVENT_SIZE`]; `bind` rejects smaller values.
    /// Default: 300 KiB
    pub fn max_event_size(mut self, size: usize) -> Self {
        self.max_event_size = size;
        self
    }

    /// Replace the decoder registry.
    pub fn decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = decoders;
        self
    }

    /// Bind the socket.
    ///
    /// A stale socket file at the path is removed first. Fails with
    /// [`SeccheckError::MaxEventSizeTooSmall`] on an unusable size limit, and
    /// with [`SeccheckError::Bind`] if the path cannot be bound.
    pub async fn bind(self) -> Result<Server> {
        if self.max_event_size < MIN_EVENT_SIZE {
            return Err(SeccheckError::MaxEventSizeTooSmall {
                size: self.max_event_size,
                min: MIN_EVENT_SIZE,
            });
        }

        let listener =
            SeqpacketListener::bind(&self.socket_path).map_err(|source| SeccheckError::Bind {
                path: self.socket_path.display().to_string(),
                source,
            })?;

        tracing::info!("Socket address {}", self.socket_path.display());

        Ok(Server {
            listener,
            decoders: Arc::new(self.decoders),
            max_event_size: self.max_event_size,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound receiver, ready to run.
#[derive(Debug)]
pub struct Server {
    listener: SeqpacketListener,
    decoders: Arc<DecoderRegistry>,
    max_event_size: usize,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Path the server is listening on.
    pub fn socket_path(&self) -> &Path {
        self.listener.path()
    }

    /// Run until a fatal error.
    ///
    /// Every decoded event is handed to `sink`. The socket file is removed
    /// when this returns.
    pub async fn run<S: EventSink>(self, sink: S) -> Result<()> {
        let (registrar, registrations) = mpsc::unbounded_channel();

        let mut event_loop = EventLoop::new(self.decoders, sink, registrations)
            .max_event_size(self.max_event_size)
            .spawn();
        let acceptor = Acceptor::new(self.listener, registrar);

        let result = tokio::select! {
            result = acceptor.run() => result,
            joined = &mut event_loop => joined.map_err(SeccheckError::from).and_then(|r| r),
        };

        event_loop.abort();
        if let Err(e) = &result {
            tracing::error!("Receiver stopped: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HEADER_LEN;

    #[test]
    fn test_builder_defaults() {
        let builder = ServerBuilder::new();
        assert_eq!(builder.socket_path, PathBuf::from("/tmp/123.sock"));
        assert_eq!(builder.max_event_size, MAX_EVENT_SIZE);
        assert_eq!(builder.decoders.len(), 3);
    }

    #[tokio::test]
    async fn test_bind_failure_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("server.sock");

        let err = Server::builder().socket_path(&path).bind().await.unwrap_err();
        match err {
            SeccheckError::Bind { path: p, .. } => assert!(p.ends_with("server.sock")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_bind_rejects_unusable_max_event_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.sock");

        for size in [0, HEADER_LEN, MIN_EVENT_SIZE - 1] {
            let err = Server::builder()
                .socket_path(&path)
                .max_event_size(size)
                .bind()
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                SeccheckError::MaxEventSizeTooSmall { size: s, min: MIN_EVENT_SIZE } if s == size
            ));
            assert!(!path.exists());
        }

        let server = Server::builder()
            .socket_path(&path)
            .max_event_size(MIN_EVENT_SIZE)
            .bind()
            .await
            .unwrap();
        assert!(server.socket_path().exists());
    }

    #[tokio::test]
    async fn test_bind_and_drop_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.sock");

        let server = Server::builder().socket_path(&path).bind().await.unwrap();
        assert_eq!(server.socket_path(), path.as_path());
        assert!(path.exists());

        drop(server);
        assert!(!path.exists());
    }
}
