//! Scripted transport doubles for reactor tests.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::transport::{Accept, RecordStream};

/// One scripted outcome of `recv`.
#[derive(Debug)]
pub(crate) enum Step {
    /// Deliver a record.
    Record(Vec<u8>),
    /// Fail with an error of this kind.
    Error(io::ErrorKind),
    /// Yield to the scheduler once, then move on to the next step.
    Yield,
    /// Never complete.
    Pending,
}

/// A stream replaying a fixed script. Once exhausted it reports hangup.
#[derive(Debug)]
pub(crate) struct ScriptedStream {
    script: Mutex<VecDeque<Step>>,
}

impl ScriptedStream {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
        }
    }

    fn next_step(&self) -> Option<Step> {
        self.script.lock().unwrap().pop_front()
    }
}

impl RecordStream for ScriptedStream {
    fn recv<'a>(&'a self, buf: &'a mut [u8]) -> impl Future<Output = io::Result<usize>> + Send + 'a {
        async move {
            loop {
                match self.next_step() {
                    Some(Step::Record(bytes)) => {
                        let n = bytes.len().min(buf.len());
                        buf[..n].copy_from_slice(&bytes[..n]);
                        return Ok(n);
                    }
                    Some(Step::Error(kind)) => return Err(io::Error::from(kind)),
                    Some(Step::Yield) => tokio::task::yield_now().await,
                    Some(Step::Pending) => std::future::pending::<()>().await,
                    None => return Ok(0),
                }
            }
        }
    }
}

/// A listener replaying scripted accept results, then pending forever.
#[derive(Debug)]
pub(crate) struct ScriptedListener {
    script: VecDeque<io::Result<ScriptedStream>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedListener {
    pub(crate) fn new(script: Vec<io::Result<ScriptedStream>>) -> Self {
        Self {
            script: script.into(),
            attempts: Arc::default(),
        }
    }

    /// Shared counter of `accept` calls.
    pub(crate) fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

impl Accept for ScriptedListener {
    type Conn = ScriptedStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<ScriptedStream>> + Send + '_ {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.pop_front();
        async move {
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }
}
