//! Container lifecycle points (`gvisor.container`).

use serde::Serialize;

use super::Point;

/// A container started inside the sandbox.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Start {
    /// Container ID.
    #[prost(string, tag = "1")]
    pub id: String,
    /// Working directory of the init process.
    #[prost(string, tag = "2")]
    pub cwd: String,
    #[prost(string, repeated, tag = "3")]
    pub args: Vec<String>,
    #[prost(string, repeated, tag = "4")]
    pub env: Vec<String>,
    /// Whether the init process has a terminal attached.
    #[prost(bool, tag = "5")]
    pub terminal: bool,
}

impl Point for Start {
    const TYPE_NAME: &'static str = "gvisor.container.Start";
}
