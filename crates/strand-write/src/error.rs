//! Write errors
//!
//! Every error is attached to the single pending write it happened to;
//! sibling writes are unaffected.

use thiserror::Error;

use crate::transport::TransportId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The transport was broken or gone when this write's turn came
    #[error("transport unusable")]
    TransportUnusable,

    /// The producer failed to materialize its bytes
    #[error("producer failed: {0}")]
    Producer(String),

    /// The transport rejected the bytes
    #[error("send on {id} failed: {reason}")]
    Send { id: TransportId, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(WriteError::TransportUnusable.to_string(), "transport unusable");
        let e = WriteError::Send { id: TransportId(3), reason: "reset".into() };
        assert_eq!(e.to_string(), "send on transport#3 failed: reset");
    }
}
