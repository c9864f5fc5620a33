//! FIFO of pending writes against one transport

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use strand_core::{kdebug, kwarn};

use crate::error::WriteError;
use crate::message::{MessagePtr, WriteMessage};
use crate::transport::Transport;

type Status = Option<Result<(), WriteError>>;

/// Completion slot of one queued write
///
/// Empty until the write is flushed or abandoned, then holds its outcome.
#[derive(Debug, Clone, Default)]
pub struct WriteReceipt(Arc<Mutex<Status>>);

impl WriteReceipt {
    fn slot(&self) -> MutexGuard<'_, Status> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn complete(&self, result: Result<(), WriteError>) {
        *self.slot() = Some(result);
    }

    /// Outcome, once the write has been processed
    pub fn status(&self) -> Option<Result<(), WriteError>> {
        self.slot().clone()
    }

    pub fn is_done(&self) -> bool {
        self.slot().is_some()
    }
}

/// Counters of one [`WriteQueue::flush`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Writes that reached the transport
    pub written: usize,
    /// Writes that failed or were abandoned
    pub failed: usize,
    /// Bytes handed to the transport
    pub bytes: usize,
}

struct Pending {
    message: MessagePtr,
    receipt: WriteReceipt,
}

/// Ordered pending writes
///
/// Messages are materialized strictly in push order. A failure belongs to
/// the write it happened to; once the transport reports itself unusable,
/// every remaining write is invoked without a transport and completes with
/// [`WriteError::TransportUnusable`]. Dropping the queue abandons whatever
/// is still pending the same way.
#[derive(Default)]
pub struct WriteQueue {
    pending: VecDeque<Pending>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: MessagePtr) -> WriteReceipt {
        let receipt = WriteReceipt::default();
        self.pending.push_back(Pending { message, receipt: receipt.clone() });
        receipt
    }

    /// Queue a concrete message
    pub fn push_message<M: WriteMessage + 'static>(&mut self, message: M) -> WriteReceipt {
        self.push(MessagePtr::new(message).into_dyn())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sum of the pending messages' size estimates
    pub fn estimated_bytes(&self) -> usize {
        self.pending.iter().map(|p| p.message.estimated_byte_size()).sum()
    }

    /// Materialize and send every pending write in order
    pub fn flush(&mut self, transport: &mut dyn Transport) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some(Pending { message, receipt }) = self.pending.pop_front() {
            if !transport.is_usable() {
                abandon_one(message, &receipt);
                report.failed += 1;
                continue;
            }

            let mut out = Vec::with_capacity(message.estimated_byte_size());
            let result = message
                .append_and_destroy(&mut out, Some(&*transport))
                .and_then(|()| if out.is_empty() { Ok(()) } else { transport.send(&out) });

            match &result {
                Ok(()) => {
                    report.written += 1;
                    report.bytes += out.len();
                }
                Err(e) => {
                    kwarn!("write on {} failed: {}", transport.id(), e);
                    report.failed += 1;
                }
            }
            receipt.complete(result);
        }

        kdebug!(
            "flushed {}: {} written, {} failed, {} bytes",
            transport.id(),
            report.written,
            report.failed,
            report.bytes
        );
        report
    }

    /// Drop every pending write without a transport; returns how many
    pub fn abandon(&mut self) -> usize {
        let n = self.pending.len();
        for Pending { message, receipt } in self.pending.drain(..) {
            abandon_one(message, &receipt);
        }
        if n > 0 {
            kdebug!("abandoned {} pending writes", n);
        }
        n
    }
}

fn abandon_one(message: MessagePtr, receipt: &WriteReceipt) {
    // whatever the message reports, the write did not happen
    let _ = message.append_and_destroy(&mut Vec::new(), None);
    receipt.complete(Err(WriteError::TransportUnusable));
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::BytesMessage;
    use crate::transport::MemoryTransport;

    struct Failing;

    impl WriteMessage for Failing {
        fn append_and_destroy(
            self: Box<Self>,
            _out: &mut Vec<u8>,
            _transport: Option<&dyn Transport>,
        ) -> Result<(), WriteError> {
            Err(WriteError::Producer("bad frame".into()))
        }
    }

    fn bytes(s: &str) -> BytesMessage {
        BytesMessage(s.as_bytes().to_vec())
    }

    #[test]
    fn test_flush_in_order() {
        let mut queue = WriteQueue::new();
        let receipts: Vec<_> = ["a", "bb", "ccc"].iter().map(|s| queue.push_message(bytes(s))).collect();
        assert_eq!(queue.estimated_bytes(), 6);

        let mut transport = MemoryTransport::new(1);
        let report = queue.flush(&mut transport);

        assert_eq!(report, FlushReport { written: 3, failed: 0, bytes: 6 });
        assert_eq!(transport.sent(), b"abbccc");
        assert!(receipts.iter().all(|r| r.status() == Some(Ok(()))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_producer_error_is_isolated() {
        let mut queue = WriteQueue::new();
        let first = queue.push_message(bytes("1"));
        let bad = queue.push_message(Failing);
        let last = queue.push_message(bytes("2"));

        let mut transport = MemoryTransport::new(2);
        let report = queue.flush(&mut transport);

        assert_eq!(report.written, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(first.status(), Some(Ok(())));
        assert_eq!(bad.status(), Some(Err(WriteError::Producer("bad frame".into()))));
        assert_eq!(last.status(), Some(Ok(())));
        assert_eq!(transport.sent(), b"12");
    }

    #[test]
    fn test_broken_transport_abandons_rest() {
        let mut queue = WriteQueue::new();
        let ok = queue.push_message(bytes("ok"));
        let lost = queue.push_message(bytes("lost"));
        let after = queue.push_message(bytes("after"));

        let mut transport = MemoryTransport::new(3).break_after(1);
        let report = queue.flush(&mut transport);

        assert_eq!(report, FlushReport { written: 1, failed: 2, bytes: 2 });
        assert_eq!(ok.status(), Some(Ok(())));
        assert!(matches!(lost.status(), Some(Err(WriteError::Send { .. }))));
        assert_eq!(after.status(), Some(Err(WriteError::TransportUnusable)));
    }

    #[test]
    fn test_receipt_pending_until_processed() {
        let mut queue = WriteQueue::new();
        let r = queue.push_message(bytes("x"));
        assert!(!r.is_done());
        assert_eq!(queue.abandon(), 1);
        assert_eq!(r.status(), Some(Err(WriteError::TransportUnusable)));
    }
}
