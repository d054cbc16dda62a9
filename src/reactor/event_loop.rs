//! Readiness-driven event loop.
//!
//! One task owns every live connection. Each open connection has exactly one
//! outstanding read in a [`FuturesUnordered`] set; the loop waits on that set
//! and on the registration channel, handles one wakeup to completion, then
//! re-arms the connection for its next record.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{BoxFuture, ConnectionId, ConnectionRegistry};
use crate::decoder::{decode_record, DecoderRegistry};
use crate::error::{RecordError, Result, SeccheckError};
use crate::protocol::{MAX_EVENT_SIZE, MIN_EVENT_SIZE};
use crate::sink::EventSink;
use crate::transport::RecordStream;

/// Outcome of one read on one connection.
struct Readiness {
    id: ConnectionId,
    buf: BytesMut,
    result: io::Result<usize>,
}

/// Errors that mean the peer is gone rather than the receiver being broken.
fn is_hangup(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
    )
}

/// The reactor: reads records from registered connections and feeds them
/// through the decode chain into the sink.
pub struct EventLoop<C, S> {
    decoders: Arc<DecoderRegistry>,
    sink: S,
    connections: ConnectionRegistry<C>,
    registrations: mpsc::UnboundedReceiver<C>,
    pending: FuturesUnordered<BoxFuture<'static, Readiness>>,
    max_event_size: usize,
}

impl<C, S> EventLoop<C, S>
where
    C: RecordStream,
    S: EventSink,
{
    /// Create an event loop taking new connections from `registrations`.
    pub fn new(
        decoders: Arc<DecoderRegistry>,
        sink: S,
        registrations: mpsc::UnboundedReceiver<C>,
    ) -> Self {
        Self {
            decoders,
            sink,
            connections: ConnectionRegistry::new(),
            registrations,
            pending: FuturesUnordered::new(),
            max_event_size: MAX_EVENT_SIZE,
        }
    }

    /// Set the maximum record size; also the size of each read buffer.
    ///
    /// Values below [`MIN_EVENT_SIZE`] are raised to it. A zero-length buffer
    /// would read every record as a hangup.
    pub fn max_event_size(mut self, max_event_size: usize) -> Self {
        self.max_event_size = max_event_size.max(MIN_EVENT_SIZE);
        self
    }

    /// Start the loop as a background task.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Run until a fatal error.
    ///
    /// Returns `Ok(())` only once the registration channel is closed and every
    /// connection has been closed by its peer.
    pub async fn run(mut self) -> Result<()> {
        let mut accepting = true;

        loop {
            tokio::select! {
                registration = self.registrations.recv(), if accepting => match registration {
                    Some(stream) => self.register(stream),
                    None => {
                        tracing::debug!("Registration channel closed");
                        accepting = false;
                    }
                },
                Some(ready) = self.pending.next(), if !self.pending.is_empty() => {
                    self.on_readiness(ready)?;
                }
                else => return Ok(()),
            }
        }
    }

    fn register(&mut self, stream: C) {
        let id = self.connections.register(stream);
        tracing::info!(connection = %id, open = self.connections.len(), "Connection registered");
        self.arm(id);
    }

    /// Queue the next read for an open connection.
    fn arm(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.get(id) else {
            return;
        };
        let stream = conn.stream();
        let size = self.max_event_size;

        self.pending.push(Box::pin(async move {
            let mut buf = BytesMut::zeroed(size);
            let result = stream.recv(&mut buf).await;
            Readiness { id, buf, result }
        }));
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(conn) = self.connections.close(id) {
            tracing::info!(
                connection = %id,
                records = conn.records(),
                bytes = conn.bytes(),
                "Connection closed"
            );
        }
    }

    fn on_readiness(&mut self, ready: Readiness) -> Result<()> {
        let Readiness { id, mut buf, result } = ready;

        match result {
            Ok(0) => self.close(id),
            Ok(n) => {
                buf.truncate(n);
                self.connections.record_read(id, n);
                self.handle_record(id, buf.freeze())?;
                self.arm(id);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                tracing::debug!(connection = %id, "Read interrupted, retrying");
                self.arm(id);
            }
            Err(e) if is_hangup(&e) => {
                tracing::debug!(connection = %id, "Peer hung up: {}", e);
                self.close(id);
            }
            Err(source) => {
                return Err(SeccheckError::Read {
                    connection: id,
                    source,
                })
            }
        }
        Ok(())
    }

    fn handle_record(&mut self, id: ConnectionId, record: Bytes) -> Result<()> {
        match decode_record(&self.decoders, id, &record, self.max_event_size) {
            Ok(event) => {
                if let Err(e) = self.sink.emit(event) {
                    tracing::warn!(connection = %id, "Dropping event, sink failed: {}", e);
                }
                Ok(())
            }
            Err(RecordError::Envelope(e)) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                tracing::warn!(connection = %id, "Dropping record: {}", e);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodeResult, EventBody};
    use crate::points::{Point, Read, Start};
    use crate::protocol::{build_frame, pack, pack_raw};
    use crate::reactor::testing::{ScriptedStream, Step};
    use crate::sink::ChannelSink;
    use std::sync::Mutex;

    fn frame_for<P: Point>(point: &P) -> Vec<u8> {
        build_frame(&pack(point), 0)
    }

    fn read(fd: i64) -> Read {
        Read {
            exit: None,
            fd,
            count: 1,
        }
    }

    #[tokio::test]
    async fn test_single_connection_events() {
        let (sink, mut events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx);

        tx.send(ScriptedStream::new(vec![
            Step::Record(frame_for(&read(1))),
            Step::Record(frame_for(&read(2))),
        ]))
        .unwrap();
        drop(tx);

        event_loop.run().await.unwrap();

        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        assert_eq!(first.body, EventBody::Read(read(1)));
        assert_eq!(second.body, EventBody::Read(read(2)));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connections_tracked_independently() {
        let (sink, mut events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx);

        // First connection closes right after one record; second keeps going.
        tx.send(ScriptedStream::new(vec![Step::Record(frame_for(&read(10)))]))
            .unwrap();
        tx.send(ScriptedStream::new(vec![
            Step::Record(frame_for(&read(20))),
            Step::Yield,
            Step::Record(frame_for(&read(21))),
            Step::Yield,
            Step::Record(frame_for(&read(22))),
        ]))
        .unwrap();
        drop(tx);

        event_loop.run().await.unwrap();

        let mut by_conn: Vec<(u64, i64)> = Vec::new();
        while let Ok(event) = events.try_recv() {
            let EventBody::Read(r) = event.body else {
                panic!("unexpected body");
            };
            by_conn.push((event.connection.get(), r.fd));
        }
        by_conn.sort_unstable();
        assert_eq!(by_conn, vec![(1, 10), (2, 20), (2, 21), (2, 22)]);
    }

    #[tokio::test]
    async fn test_zero_max_event_size_does_not_close_connections() {
        let (sink, mut events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx)
            .max_event_size(0);
        assert_eq!(event_loop.max_event_size, MIN_EVENT_SIZE);
        let handle = event_loop.spawn();

        // Records over the limit are dropped; the connection itself stays open.
        tx.send(ScriptedStream::new(vec![
            Step::Record(frame_for(&read(1))),
            Step::Record(frame_for(&read(2))),
            Step::Pending,
        ]))
        .unwrap();
        drop(tx);

        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_finished());
        assert!(events.try_recv().is_err());
        handle.abort();
    }

    #[tokio::test]
    async fn test_interrupted_read_is_retried() {
        let (sink, mut events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx);

        tx.send(ScriptedStream::new(vec![
            Step::Error(io::ErrorKind::Interrupted),
            Step::Error(io::ErrorKind::Interrupted),
            Step::Record(frame_for(&read(7))),
        ]))
        .unwrap();
        drop(tx);

        event_loop.run().await.unwrap();

        assert_eq!(events.recv().await.unwrap().body, EventBody::Read(read(7)));
    }

    #[tokio::test]
    async fn test_read_error_is_fatal() {
        let (sink, _events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx);

        tx.send(ScriptedStream::new(vec![Step::Error(io::ErrorKind::Other)]))
            .unwrap();

        let err = event_loop.run().await.unwrap_err();
        assert!(matches!(err, SeccheckError::Read { connection, .. } if connection.get() == 1));
    }

    #[tokio::test]
    async fn test_reset_closes_connection() {
        let (sink, mut events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx);

        tx.send(ScriptedStream::new(vec![
            Step::Record(frame_for(&read(1))),
            Step::Error(io::ErrorKind::ConnectionReset),
            Step::Record(frame_for(&read(2))),
        ]))
        .unwrap();
        drop(tx);

        event_loop.run().await.unwrap();

        assert_eq!(events.recv().await.unwrap().body, EventBody::Read(read(1)));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_records_are_dropped() {
        let (sink, mut events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx);

        let mut oversized = ((MAX_EVENT_SIZE + 1) as u32).to_le_bytes().to_vec();
        oversized.extend_from_slice(&[0; 6]);

        tx.send(ScriptedStream::new(vec![
            Step::Record(vec![1, 2]),
            Step::Record(oversized),
            Step::Record(frame_for(&read(9))[..12].to_vec()),
            Step::Record(build_frame(&pack_raw("unknown.Type", vec![1]), 0)),
            Step::Record(frame_for(&read(3))),
        ]))
        .unwrap();
        drop(tx);

        event_loop.run().await.unwrap();

        assert_eq!(events.recv().await.unwrap().body, EventBody::Read(read(3)));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unparseable_envelope_is_fatal() {
        let (sink, _events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx);

        tx.send(ScriptedStream::new(vec![Step::Record(build_frame(
            &[0xFF, 0xFF, 0xFF],
            0,
        ))]))
        .unwrap();

        let err = event_loop.run().await.unwrap_err();
        assert!(matches!(err, SeccheckError::Envelope(_)));
    }

    #[tokio::test]
    async fn test_start_decoder_invoked_once_with_payload() {
        let seen: Arc<Mutex<Vec<(String, Vec<u8>)>>> = Arc::default();
        let start_seen = Arc::clone(&seen);
        let read_seen = Arc::clone(&seen);
        let decoders = DecoderRegistry::builder()
            .decoder("gvisor.container.Start", move |payload: &[u8]| -> DecodeResult {
                start_seen
                    .lock()
                    .unwrap()
                    .push(("start".to_string(), payload.to_vec()));
                Ok(EventBody::Opaque { len: payload.len() })
            })
            .decoder("gvisor.syscall.Read", move |payload: &[u8]| -> DecodeResult {
                read_seen
                    .lock()
                    .unwrap()
                    .push(("read".to_string(), payload.to_vec()));
                Ok(EventBody::Opaque { len: payload.len() })
            })
            .build();

        let (sink, mut events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(decoders), sink, rx);

        let payload = b"P-bytes".to_vec();
        tx.send(ScriptedStream::new(vec![Step::Record(build_frame(
            &pack_raw(Start::TYPE_NAME, payload.clone()),
            0,
        ))]))
        .unwrap();
        drop(tx);

        event_loop.run().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![("start".to_string(), payload)]);
        let event = events.recv().await.unwrap();
        assert_eq!(event.type_name, "gvisor.container.Start");
    }

    #[tokio::test]
    async fn test_closed_sink_does_not_stop_loop() {
        let (sink, events) = ChannelSink::channel();
        drop(events);
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx);

        tx.send(ScriptedStream::new(vec![
            Step::Record(frame_for(&read(1))),
            Step::Record(frame_for(&read(2))),
        ]))
        .unwrap();
        drop(tx);

        assert!(event_loop.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_connection_keeps_loop_running() {
        let (sink, mut events) = ChannelSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = EventLoop::new(Arc::new(DecoderRegistry::with_defaults()), sink, rx).spawn();

        tx.send(ScriptedStream::new(vec![
            Step::Record(frame_for(&read(5))),
            Step::Pending,
        ]))
        .unwrap();
        drop(tx);

        assert_eq!(events.recv().await.unwrap().body, EventBody::Read(read(5)));
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
