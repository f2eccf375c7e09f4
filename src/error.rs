//! Custom error types for the scanner.
//!
//! Three families of failure can occur while talking to a node:
//!
//! - **`TransportError`**: the byte stream itself failed (open, read, write or
//!   timeout). Fatal to the current exchange, never to the session.
//! - **`ProtocolError`**: bytes arrived but the response frame was malformed
//!   (wrong length or checksum mismatch). Always carries the opcode.
//! - **`ScannerError::Range`**: a requested frequency lies outside the band the
//!   device supports. Raised before any device I/O.
//!
//! `ScannerError` consolidates these with configuration and worker failures so
//! the `?` operator works across the crate.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the scanner error type.
pub type ScannerResult<T> = std::result::Result<T, ScannerError>;

/// Failure of the underlying duplex byte stream.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Transport closed")]
    Closed,
}

/// A response frame that cannot be trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("opcode 0x{opcode:02X}: expected {expected} response bytes, got {actual}")]
    Length {
        opcode: u8,
        expected: usize,
        actual: usize,
    },

    #[error("opcode 0x{opcode:02X}: checksum mismatch (computed 0x{expected:02X}, received 0x{actual:02X})")]
    Checksum { opcode: u8, expected: u8, actual: u8 },
}

impl ProtocolError {
    /// Opcode of the exchange that produced the bad frame.
    pub fn opcode(&self) -> u8 {
        match self {
            ProtocolError::Length { opcode, .. } | ProtocolError::Checksum { opcode, .. } => {
                *opcode
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Frequency {frequency} MHz outside supported range {min}-{max} MHz")]
    Range { frequency: u16, min: u16, max: u16 },

    #[error("Device reported {reported} MHz after writing {requested} MHz")]
    FrequencyMismatch { requested: u16, reported: u16 },

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Failed to open device: {0}")]
    DeviceOpen(String),

    #[error("Acquisition worker is not running")]
    WorkerUnavailable,

    #[error("Operation cancelled")]
    Cancelled,
}

impl ScannerError {
    /// True when the error ends the whole session rather than one operation.
    ///
    /// Only a failed device open qualifies: no acquisition mode can run
    /// without a link, while every per-tick failure is reported and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScannerError::DeviceOpen(_) | ScannerError::WorkerUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_names_opcode_and_cause() {
        let err = ProtocolError::Checksum {
            opcode: 0x05,
            expected: 0x10,
            actual: 0x11,
        };
        assert_eq!(err.opcode(), 0x05);
        let msg = err.to_string();
        assert!(msg.contains("0x05"));
        assert!(msg.contains("checksum"));

        let err = ProtocolError::Length {
            opcode: 0x03,
            expected: 3,
            actual: 1,
        };
        assert!(err.to_string().contains("expected 3"));
    }

    #[test]
    fn only_open_failures_are_fatal() {
        assert!(ScannerError::DeviceOpen("no such port".into()).is_fatal());
        assert!(!ScannerError::Range {
            frequency: 1,
            min: 5645,
            max: 5945
        }
        .is_fatal());
        let transport: ScannerError = TransportError::Closed.into();
        assert!(!transport.is_fatal());
    }
}
