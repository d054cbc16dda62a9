//! Connection bookkeeping for the event loop.
//!
//! The registry owns every live connection. A connection is `Open` from
//! registration until it is closed, at which point it is removed and its
//! socket released.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Identifier assigned to a connection on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create an identifier from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered and armed for reads.
    Open,
    /// Peer hung up; the registration is released.
    Closed,
}

/// A live connection and its counters.
#[derive(Debug)]
pub struct Connection<C> {
    id: ConnectionId,
    stream: Arc<C>,
    records: u64,
    bytes: u64,
}

impl<C> Connection<C> {
    /// Connection identifier.
    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Shared handle to the underlying stream.
    #[inline]
    pub fn stream(&self) -> Arc<C> {
        Arc::clone(&self.stream)
    }

    /// Records read so far.
    #[inline]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Bytes read so far.
    #[inline]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Set of live connections, keyed by id.
#[derive(Debug)]
pub struct ConnectionRegistry<C> {
    connections: HashMap<ConnectionId, Connection<C>>,
    next_id: u64,
}

impl<C> ConnectionRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a new connection and assign it an id.
    pub fn register(&mut self, stream: C) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.connections.insert(
            id,
            Connection {
                id,
                stream: Arc::new(stream),
                records: 0,
                bytes: 0,
            },
        );
        id
    }

    /// Get a connection by id.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection<C>> {
        self.connections.get(&id)
    }

    /// Current state of a connection. Unknown ids are reported as closed.
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        if self.connections.contains_key(&id) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Account for one record of `len` bytes read from `id`.
    pub fn record_read(&mut self, id: ConnectionId, len: usize) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.records += 1;
            conn.bytes += len as u64;
        }
    }

    /// Close a connection, releasing the registry's handle to its stream.
    ///
    /// Returns the removed connection, or `None` if it was already closed.
    pub fn close(&mut self, id: ConnectionId) -> Option<Connection<C>> {
        self.connections.remove(&id)
    }

    /// Ids of all open connections, sorted.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no connection is open.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
