//! Write targets

use std::fmt;

use crate::error::WriteError;

/// Identifier of a transport, for logging and error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(pub u64);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport#{}", self.0)
    }
}

/// Something a [`WriteQueue`](crate::WriteQueue) can flush into
pub trait Transport {
    fn id(&self) -> TransportId;

    /// False once the transport is broken; later writes are abandoned
    fn is_usable(&self) -> bool;

    fn send(&mut self, bytes: &[u8]) -> Result<(), WriteError>;
}

/// In-memory transport collecting everything sent to it
///
/// Can be told to break after a number of sends, which makes it useful for
/// exercising failure paths.
#[derive(Debug)]
pub struct MemoryTransport {
    id: TransportId,
    sent: Vec<u8>,
    sends: usize,
    break_after: Option<usize>,
    usable: bool,
}

impl MemoryTransport {
    pub fn new(id: u64) -> Self {
        Self {
            id: TransportId(id),
            sent: Vec::new(),
            sends: 0,
            break_after: None,
            usable: true,
        }
    }

    /// Fail the send after `n` successful ones and stay broken
    pub fn break_after(mut self, n: usize) -> Self {
        self.break_after = Some(n);
        self
    }

    /// Mark the transport broken
    pub fn tear_down(&mut self) {
        self.usable = false;
    }

    /// Bytes received so far
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }
}

impl Transport for MemoryTransport {
    fn id(&self) -> TransportId {
        self.id
    }

    fn is_usable(&self) -> bool {
        self.usable
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        if !self.usable {
            return Err(WriteError::TransportUnusable);
        }
        if self.break_after == Some(self.sends) {
            self.usable = false;
            return Err(WriteError::Send { id: self.id, reason: "connection reset".into() });
        }
        self.sends += 1;
        self.sent.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_transport_breaks() {
        let mut t = MemoryTransport::new(1).break_after(1);
        assert!(t.send(b"ok").is_ok());
        assert!(matches!(t.send(b"lost"), Err(WriteError::Send { .. })));
        assert!(!t.is_usable());
        assert_eq!(t.send(b"later"), Err(WriteError::TransportUnusable));
        assert_eq!(t.sent(), b"ok");
    }
}
