use std::sync::{Arc, Mutex};

use strand_write::{
    MemoryTransport, MessagePtr, Transport, WriteError, WriteMessage, WriteQueue,
};

/// Records every invocation as (name, had_transport)
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<(&'static str, bool)>>>);

impl Journal {
    fn entries(&self) -> Vec<(&'static str, bool)> {
        self.0.lock().unwrap().clone()
    }

    fn message(&self, name: &'static str) -> Frame {
        Frame { name, journal: self.clone() }
    }
}

struct Frame {
    name: &'static str,
    journal: Journal,
}

impl WriteMessage for Frame {
    fn append_and_destroy(
        self: Box<Self>,
        out: &mut Vec<u8>,
        transport: Option<&dyn Transport>,
    ) -> Result<(), WriteError> {
        self.journal.0.lock().unwrap().push((self.name, transport.is_some()));
        if transport.is_none() {
            return Err(WriteError::TransportUnusable);
        }
        out.extend_from_slice(self.name.as_bytes());
        Ok(())
    }

    fn estimated_byte_size(&self) -> usize {
        self.name.len()
    }
}

#[test]
fn discarded_write_is_invoked_once_without_transport() {
    let journal = Journal::default();
    let mut transport = MemoryTransport::new(8);
    let mut queue = WriteQueue::new();

    let a = queue.push_message(journal.message("A"));
    let b = queue.push_message(journal.message("B"));
    queue.flush(&mut transport);

    let c = queue.push_message(journal.message("C"));
    transport.tear_down();
    let report = queue.flush(&mut transport);

    assert_eq!(report.failed, 1);
    assert_eq!(journal.entries(), vec![("A", true), ("B", true), ("C", false)]);
    assert_eq!(a.status(), Some(Ok(())));
    assert_eq!(b.status(), Some(Ok(())));
    assert_eq!(c.status(), Some(Err(WriteError::TransportUnusable)));
    assert_eq!(transport.sent(), b"AB");
}

#[test]
fn dropping_the_queue_abandons_in_order() {
    let journal = Journal::default();
    let receipts = {
        let mut queue = WriteQueue::new();
        ["X", "Y", "Z"].map(|n| queue.push_message(journal.message(n)))
    };

    assert_eq!(journal.entries(), vec![("X", false), ("Y", false), ("Z", false)]);
    for r in &receipts {
        assert_eq!(r.status(), Some(Err(WriteError::TransportUnusable)));
    }
}

#[test]
fn unqueued_message_ptr_cleans_up_on_drop() {
    let journal = Journal::default();
    let ptr = MessagePtr::new(journal.message("lone"));
    assert_eq!(ptr.estimated_byte_size(), 4);
    drop(ptr);
    assert_eq!(journal.entries(), vec![("lone", false)]);
}
