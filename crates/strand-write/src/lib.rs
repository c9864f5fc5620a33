//! # strand-write
//!
//! Ordered write producers for a transport.
//!
//! A [`WriteMessage`] turns itself into bytes exactly once and is consumed
//! by doing so. Messages queued against one transport are materialized in
//! FIFO order by a [`WriteQueue`]. A message that never reaches a transport
//! is still invoked once, with no transport, so it can release whatever it
//! holds; [`MessagePtr`] guarantees that on drop.
//!
//! This crate does not depend on the context-switch core.

pub mod error;
pub mod message;
pub mod queue;
pub mod transport;

pub use error::WriteError;
pub use message::{BytesMessage, MessagePtr, WriteMessage};
pub use queue::{FlushReport, WriteQueue, WriteReceipt};
pub use transport::{MemoryTransport, Transport, TransportId};
