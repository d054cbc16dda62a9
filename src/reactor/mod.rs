//! Reactor module - accept loop and readiness-driven event loop.
//!
//! - [`Acceptor`] - accepts connections and registers them
//! - [`EventLoop`] - reads records from every registered connection
//! - [`ConnectionRegistry`] - per-connection bookkeeping
//!
//! The two loops share nothing but an mpsc channel carrying newly accepted
//! connections.

use std::future::Future;
use std::pin::Pin;

mod acceptor;
mod connection;
mod event_loop;

#[cfg(test)]
pub(crate) mod testing;

pub use acceptor::Acceptor;
pub use connection::{Connection, ConnectionId, ConnectionRegistry, ConnectionState};
pub use event_loop::EventLoop;

/// Boxed future type for pending reads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
