//! Accept loop.
//!
//! Runs alongside the event loop and hands every accepted connection over
//! the registration channel. Accepting never blocks reads.

use std::io;

use tokio::sync::mpsc;

use crate::error::{Result, SeccheckError};
use crate::transport::Accept;

/// Accepts connections and registers them with the event loop.
pub struct Acceptor<L: Accept> {
    listener: L,
    registrar: mpsc::UnboundedSender<L::Conn>,
}

impl<L: Accept> Acceptor<L> {
    /// Create an acceptor registering connections through `registrar`.
    pub fn new(listener: L, registrar: mpsc::UnboundedSender<L::Conn>) -> Self {
        Self {
            listener,
            registrar,
        }
    }

    /// Accept until a fatal error.
    ///
    /// Interrupted accepts are retried. Any other accept failure, or the
    /// event loop going away, ends the loop with an error.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let conn = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    tracing::debug!("Accept interrupted, retrying");
                    continue;
                }
                Err(e) => return Err(SeccheckError::Accept(e)),
            };

            tracing::info!("Connection accepted");
            self.registrar
                .send(conn)
                .map_err(|_| SeccheckError::EventLoopGone)?;
        }
    }
}
