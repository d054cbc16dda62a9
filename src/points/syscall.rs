//! Syscall points (`gvisor.syscall`).
//!
//! A syscall point is sent twice: on entry with `exit` unset, and on exit
//! with `exit` carrying the result.

use serde::Serialize;

use super::Point;

/// Result of a completed syscall.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Exit {
    /// Syscall return value.
    #[prost(int64, tag = "1")]
    pub result: i64,
    /// errno, 0 on success.
    #[prost(int64, tag = "2")]
    pub errorno: i64,
}

/// `open(2)`.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Open {
    /// Set on syscall exit.
    #[prost(message, optional, tag = "1")]
    pub exit: Option<Exit>,
    /// Path argument, empty if it could not be copied in.
    #[prost(string, tag = "2")]
    pub pathname: String,
}

/// `read(2)`.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Read {
    /// Set on syscall exit.
    #[prost(message, optional, tag = "1")]
    pub exit: Option<Exit>,
    #[prost(int64, tag = "2")]
    pub fd: i64,
    #[prost(uint64, tag = "3")]
    pub count: u64,
}

impl Point for Open {
    const TYPE_NAME: &'static str = "gvisor.syscall.Open";
}

impl Point for Read {
    const TYPE_NAME: &'static str = "gvisor.syscall.Read";
}
