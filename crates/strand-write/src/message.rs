//! Write producers and their owning handle

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::WriteError;
use crate::transport::Transport;

/// A unit of output that materializes itself exactly once
pub trait WriteMessage: Send {
    /// Append this message's bytes to `out` and consume the message
    ///
    /// Called exactly once. `out` starts empty and may stay empty.
    /// `transport` is `None` when the message is being abandoned (broken
    /// transport, or its [`MessagePtr`] dropped); the message must still
    /// release its resources then and may report failure.
    fn append_and_destroy(
        self: Box<Self>,
        out: &mut Vec<u8>,
        transport: Option<&dyn Transport>,
    ) -> Result<(), WriteError>;

    /// Expected size of the bytes `append_and_destroy` will produce
    fn estimated_byte_size(&self) -> usize {
        0
    }
}

/// Unique owner of a [`WriteMessage`]
///
/// Dropping a `MessagePtr` that still owns its message invokes the message
/// with a scratch buffer and no transport.
pub struct MessagePtr<T: WriteMessage + ?Sized = dyn WriteMessage>(Option<Box<T>>);

impl<T: WriteMessage> MessagePtr<T> {
    pub fn new(message: T) -> Self {
        MessagePtr(Some(Box::new(message)))
    }
}

impl<T: WriteMessage + ?Sized> MessagePtr<T> {
    pub fn from_box(message: Box<T>) -> Self {
        MessagePtr(Some(message))
    }

    /// Give up ownership without invoking the message
    pub fn release(mut self) -> Box<T> {
        match self.0.take() {
            Some(message) => message,
            None => unreachable!("MessagePtr is only emptied by consuming it"),
        }
    }

    /// Invoke the message now, consuming the handle
    pub fn append_and_destroy(
        self,
        out: &mut Vec<u8>,
        transport: Option<&dyn Transport>,
    ) -> Result<(), WriteError> {
        self.release().append_and_destroy(out, transport)
    }
}

impl<T: WriteMessage + 'static> MessagePtr<T> {
    /// Erase the concrete message type
    pub fn into_dyn(self) -> MessagePtr {
        let message: Box<dyn WriteMessage> = self.release();
        MessagePtr(Some(message))
    }
}

impl<T: WriteMessage + ?Sized> Drop for MessagePtr<T> {
    fn drop(&mut self) {
        if let Some(message) = self.0.take() {
            let mut scratch = Vec::new();
            if let Err(e) = message.append_and_destroy(&mut scratch, None) {
                strand_core::ktrace!("abandoned message reported: {}", e);
            }
        }
    }
}

impl<T: WriteMessage + ?Sized> Deref for MessagePtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.0.as_deref() {
            Some(message) => message,
            None => unreachable!("MessagePtr is only emptied by consuming it"),
        }
    }
}

impl<T: WriteMessage + ?Sized> DerefMut for MessagePtr<T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.0.as_deref_mut() {
            Some(message) => message,
            None => unreachable!("MessagePtr is only emptied by consuming it"),
        }
    }
}

impl<T: WriteMessage + ?Sized> fmt::Debug for MessagePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePtr")
            .field("estimated_byte_size", &self.estimated_byte_size())
            .finish()
    }
}

/// Message carrying ready-made bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesMessage(pub Vec<u8>);

impl WriteMessage for BytesMessage {
    fn append_and_destroy(
        self: Box<Self>,
        out: &mut Vec<u8>,
        transport: Option<&dyn Transport>,
    ) -> Result<(), WriteError> {
        if transport.is_none() {
            return Err(WriteError::TransportUnusable);
        }
        out.extend_from_slice(&self.0);
        Ok(())
    }

    fn estimated_byte_size(&self) -> usize {
        self.0.len()
    }
}
