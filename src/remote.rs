//! Producer side: send points to a receiver.
//!
//! Each point is packed into an envelope, framed, and written with one
//! vectored send so the receiver gets it as a single record.

use std::io::{self, IoSlice};
use std::path::Path;

use tokio_seqpacket::UnixSeqpacket;

use crate::error::{Result, SeccheckError};
use crate::points::Point;
use crate::protocol::{build_frame_parts, pack, HEADER_LEN, MAX_EVENT_SIZE};

/// A connection to a receiver.
///
/// Events that could not be written are counted; the count travels in the
/// next frame that is written successfully, then starts again from zero.
pub struct Remote {
    socket: UnixSeqpacket,
    dropped: u32,
    max_event_size: usize,
}

impl Remote {
    /// Connect to a receiver listening on `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let socket = crate::transport::connect(path)
            .await
            .map_err(|source| SeccheckError::Connect {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self::from_socket(socket))
    }

    /// Wrap an already connected socket.
    pub fn from_socket(socket: UnixSeqpacket) -> Self {
        Self {
            socket,
            dropped: 0,
            max_event_size: MAX_EVENT_SIZE,
        }
    }

    /// Refuse frames larger than `size`.
    pub fn max_event_size(mut self, size: usize) -> Self {
        self.max_event_size = size;
        self
    }

    /// Events dropped since the last successful write.
    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }

    /// Pack and send one point.
    pub async fn write<P: Point>(&mut self, point: &P) -> Result<()> {
        self.write_envelope(&pack(point)).await
    }

    /// Frame and send already encoded envelope bytes.
    pub async fn write_envelope(&mut self, envelope: &[u8]) -> Result<()> {
        let size = HEADER_LEN + envelope.len();
        if size > self.max_event_size {
            self.drop_event();
            return Err(SeccheckError::FrameTooLarge {
                size,
                max: self.max_event_size,
            });
        }

        let (header, body) = build_frame_parts(envelope, self.dropped);
        let parts = [IoSlice::new(&header), IoSlice::new(body)];

        match self.socket.send_vectored(&parts).await {
            Ok(n) if n == size => {
                self.dropped = 0;
                Ok(())
            }
            Ok(n) => {
                self.drop_event();
                Err(SeccheckError::Write(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("partial write of {n} of {size} bytes"),
                )))
            }
            Err(e) => {
                self.drop_event();
                Err(SeccheckError::Write(e))
            }
        }
    }

    fn drop_event(&mut self) {
        self.dropped = self.dropped.saturating_add(1);
        tracing::debug!(dropped = self.dropped, "Event dropped");
    }
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("dropped", &self.dropped)
            .field("max_event_size", &self.max_event_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{decode_record, DecoderRegistry, EventBody};
    use crate::points::Open;
    use crate::reactor::ConnectionId;
    use crate::transport::{Accept, RecordStream, SeqpacketListener};
    use bytes::Bytes;

    async fn recv_record(conn: &UnixSeqpacket) -> Bytes {
        let mut buf = vec![0u8; MAX_EVENT_SIZE];
        let n = RecordStream::recv(conn, &mut buf).await.unwrap();
        buf.truncate(n);
        Bytes::from(buf)
    }

    fn open(path: &str) -> Open {
        Open {
            exit: None,
            pathname: path.to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.sock");
        let mut listener = SeqpacketListener::bind(&path).unwrap();

        let mut remote = Remote::connect(&path).await.unwrap();
        let conn = listener.accept().await.unwrap();

        remote.write(&open("/etc/hosts")).await.unwrap();

        let record = recv_record(&conn).await;
        let event = decode_record(
            &DecoderRegistry::with_defaults(),
            ConnectionId::new(1),
            &record,
            MAX_EVENT_SIZE,
        )
        .unwrap();
        assert_eq!(event.body, EventBody::Open(open("/etc/hosts")));
        assert_eq!(event.dropped_count, 0);
    }

    #[tokio::test]
    async fn test_dropped_count_carried_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.sock");
        let mut listener = SeqpacketListener::bind(&path).unwrap();

        let mut remote = Remote::connect(&path).await.unwrap().max_event_size(64);
        let conn = listener.accept().await.unwrap();

        let big = open(&"x".repeat(100));
        assert!(matches!(
            remote.write(&big).await,
            Err(SeccheckError::FrameTooLarge { max: 64, .. })
        ));
        assert!(remote.write(&big).await.is_err());
        assert_eq!(remote.dropped_count(), 2);

        remote.write(&open("/a")).await.unwrap();
        remote.write(&open("/b")).await.unwrap();
        assert_eq!(remote.dropped_count(), 0);

        let registry = DecoderRegistry::with_defaults();
        let first = decode_record(&registry, ConnectionId::new(1), &recv_record(&conn).await, 64)
            .unwrap();
        let second = decode_record(&registry, ConnectionId::new(1), &recv_record(&conn).await, 64)
            .unwrap();
        assert_eq!(first.dropped_count, 2);
        assert_eq!(second.dropped_count, 0);
    }

    #[tokio::test]
    async fn test_connect_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let err = Remote::connect(dir.path().join("absent.sock"))
            .await
            .unwrap_err();

        assert!(matches!(err, SeccheckError::Connect { .. }));
    }
}
