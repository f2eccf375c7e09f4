//! Serial transport for RS-232/USB-serial nodes.
//!
//! Nodes speak 115200 baud, 8N1, no flow control. The port's own read timeout
//! is set per call so each exchange honours the link's deadline.

use super::Transport;
use crate::error::TransportError;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default node baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port wrapper implementing [`Transport`].
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate` with 8N1 framing.
    ///
    /// # Errors
    /// Returns [`TransportError::Serial`] if the port cannot be opened.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()?;

        debug!("Serial port '{}' opened at {} baud", port_name, baud_rate);

        Ok(Self {
            port_name: port_name.to_string(),
            baud_rate,
            port,
        })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError> {
        self.port.set_timeout(timeout)?;
        match self.port.write_all(bytes).and_then(|()| self.port.flush()) {
            Ok(()) => {
                trace!(port = %self.port_name, bytes = bytes.len(), "serial write");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(TransportError::Timeout {
                operation: "serial write",
                timeout,
            }),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;

        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.port.set_timeout(remaining)?;
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => {
                    if filled == 0 {
                        return Err(TransportError::Closed);
                    }
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }

        if filled == 0 && !buf.is_empty() {
            return Err(TransportError::Timeout {
                operation: "serial read",
                timeout,
            });
        }
        trace!(port = %self.port_name, bytes = filled, "serial read");
        Ok(filled)
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_missing_port_is_serial_error() {
        let result = SerialTransport::open("/dev/rssi-scanner-does-not-exist", DEFAULT_BAUD_RATE);
        assert!(matches!(result, Err(TransportError::Serial(_))));
    }
}
