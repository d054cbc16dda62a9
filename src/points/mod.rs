//! Event points carried in envelopes.
//!
//! Each point is a protobuf message identified by its fully-qualified type
//! name. Messages are declared with `prost` derives directly, so no build
//! step is needed.

mod container;
mod syscall;

use serde::Serialize;

pub use container::Start;
pub use syscall::{Exit, Open, Read};

/// A protobuf message that can travel in an envelope.
pub trait Point: prost::Message + Default + Serialize + Send + 'static {
    /// Fully-qualified type name, the dispatch key on the receive side.
    const TYPE_NAME: &'static str;

    /// Type name without its package, e.g. `Read`.
    fn short_name() -> &'static str {
        Self::TYPE_NAME
            .rsplit_once('.')
            .map_or(Self::TYPE_NAME, |(_, name)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(Read::short_name(), "Read");
        assert_eq!(Open::short_name(), "Open");
        assert_eq!(Start::short_name(), "Start");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Read::TYPE_NAME, "gvisor.syscall.Read");
        assert_eq!(Open::TYPE_NAME, "gvisor.syscall.Open");
        assert_eq!(Start::TYPE_NAME, "gvisor.container.Start");
    }
}
