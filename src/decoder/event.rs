//! Decoded events handed to sinks.

use std::fmt;

use serde::Serialize;

use crate::points::{Exit, Open, Point, Read, Start};
use crate::reactor::ConnectionId;

/// Whether a syscall point was taken on entry or on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Before the syscall runs.
    Enter,
    /// After the syscall returned.
    Exit,
}

impl Phase {
    fn from_exit(exit: Option<&Exit>) -> Self {
        if exit.is_some() {
            Phase::Exit
        } else {
            Phase::Enter
        }
    }

    /// One-letter marker used in text output.
    pub fn marker(self) -> &'static str {
        match self {
            Phase::Enter => "E",
            Phase::Exit => "X",
        }
    }
}

/// Decoded payload of an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "fields", rename_all = "snake_case")]
pub enum EventBody {
    /// `gvisor.syscall.Open`.
    Open(Open),
    /// `gvisor.syscall.Read`.
    Read(Read),
    /// `gvisor.container.Start`.
    ContainerStart(Start),
    /// Payload accepted by a custom decoder without structured fields.
    Opaque {
        /// Payload length.
        len: usize,
    },
}

impl EventBody {
    /// Syscall phase, `None` for non-syscall events.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            EventBody::Open(open) => Some(Phase::from_exit(open.exit.as_ref())),
            EventBody::Read(read) => Some(Phase::from_exit(read.exit.as_ref())),
            EventBody::ContainerStart(_) | EventBody::Opaque { .. } => None,
        }
    }

    /// Short syscall name (`Read`), `None` for non-syscall events.
    pub fn syscall_name(&self) -> Option<&'static str> {
        match self {
            EventBody::Open(_) => Some(Open::short_name()),
            EventBody::Read(_) => Some(Read::short_name()),
            EventBody::ContainerStart(_) | EventBody::Opaque { .. } => None,
        }
    }

    fn fmt_fields(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = ShortText::new(f);
        match self {
            EventBody::Open(open) => {
                out.exit(open.exit.as_ref())?;
                out.string("pathname", &open.pathname)
            }
            EventBody::Read(read) => {
                out.exit(read.exit.as_ref())?;
                out.scalar("fd", &read.fd)?;
                out.scalar("count", &read.count)
            }
            EventBody::ContainerStart(start) => {
                out.string("id", &start.id)?;
                out.string("cwd", &start.cwd)?;
                out.strings("args", &start.args)?;
                out.strings("env", &start.env)?;
                out.scalar("terminal", &start.terminal)
            }
            EventBody::Opaque { len } => write!(out.f, "<{len} bytes>"),
        }
    }
}

/// Single-line protobuf text form: `name: value` pairs separated by spaces,
/// fields at their default value omitted.
struct ShortText<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    first: bool,
}

impl<'a, 'b> ShortText<'a, 'b> {
    fn new(f: &'a mut fmt::Formatter<'b>) -> Self {
        Self { f, first: true }
    }

    fn sep(&mut self) -> fmt::Result {
        if !self.first {
            self.f.write_str(" ")?;
        }
        self.first = false;
        Ok(())
    }

    fn scalar<T: fmt::Display + Default + PartialEq>(&mut self, name: &str, value: &T) -> fmt::Result {
        if *value == T::default() {
            return Ok(());
        }
        self.sep()?;
        write!(self.f, "{name}: {value}")
    }

    fn string(&mut self, name: &str, value: &str) -> fmt::Result {
        if value.is_empty() {
            return Ok(());
        }
        self.sep()?;
        write!(self.f, "{name}: {value:?}")
    }

    fn strings(&mut self, name: &str, values: &[String]) -> fmt::Result {
        for value in values {
            self.sep()?;
            write!(self.f, "{name}: {value:?}")?;
        }
        Ok(())
    }

    fn exit(&mut self, exit: Option<&Exit>) -> fmt::Result {
        let Some(exit) = exit else {
            return Ok(());
        };
        self.sep()?;
        self.f.write_str("exit { ")?;
        let mut inner = ShortText::new(&mut *self.f);
        inner.scalar("result", &exit.result)?;
        inner.scalar("errorno", &exit.errorno)?;
        if !inner.first {
            self.f.write_str(" ")?;
        }
        self.f.write_str("}")
    }
}

impl From<Open> for EventBody {
    fn from(open: Open) -> Self {
        EventBody::Open(open)
    }
}

impl From<Read> for EventBody {
    fn from(read: Read) -> Self {
        EventBody::Read(read)
    }
}

impl From<Start> for EventBody {
    fn from(start: Start) -> Self {
        EventBody::ContainerStart(start)
    }
}

/// An event decoded from one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedEvent {
    /// Connection the record arrived on.
    pub connection: ConnectionId,
    /// Fully-qualified type name from the envelope.
    pub type_name: String,
    /// Producer's drop counter at the time the record was written.
    pub dropped_count: u32,
    /// Decoded payload.
    pub body: EventBody,
}

/// Text rendering.
///
/// Syscall points: `E Read fd: 3 count: 10` (`X` once the syscall
/// returned). Everything else: `gvisor.container.Start => id: "c1"`.
impl fmt::Display for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.body.phase(), self.body.syscall_name()) {
            (Some(phase), Some(name)) => write!(f, "{} {} ", phase.marker(), name)?,
            _ => write!(f, "{} => ", self.type_name)?,
        }
        self.body.fmt_fields(f)
    }
}
