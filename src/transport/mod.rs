//! Duplex byte transport to a single, already-opened node.
//!
//! The protocol layer only needs timed writes and timed reads. Implementations:
//!
//! - [`serial::SerialTransport`]: a USB/RS-232 port via the `serialport` crate
//! - [`mock::MockDevice`]: an in-memory node for tests and dry runs

use crate::error::TransportError;
use std::time::Duration;

pub mod mock;
pub mod serial;

pub use mock::{MockDevice, MockFault, MockHandle};
pub use serial::SerialTransport;

/// Blocking byte transport with per-call timeouts.
///
/// Implementations are driven from one thread at a time; the device link
/// borrows them mutably for the whole request/response exchange.
pub trait Transport: Send {
    /// Write all of `bytes`, failing if that takes longer than `timeout`.
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError>;

    /// Read up to `buf.len()` bytes, returning how many arrived.
    ///
    /// Returns early once `buf` is full. A short count means the deadline
    /// passed with a partial frame; no bytes at all is a
    /// [`TransportError::Timeout`].
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Bytes received but not yet read.
    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        Ok(0)
    }

    /// Drop any bytes already received but not yet read.
    fn discard_input(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Short description for log lines.
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError> {
        (**self).write(bytes, timeout)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).read(buf, timeout)
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        (**self).bytes_to_read()
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        (**self).discard_input()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Type-erased transport, as handed to the acquisition worker.
pub type DynTransport = Box<dyn Transport>;
