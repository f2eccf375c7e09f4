//! In-memory node for testing without hardware.
//!
//! `MockDevice` speaks the node protocol: it answers READ_FREQUENCY,
//! READ_LAP_STATS and READ_REVISION_CODE, and applies WRITE_FREQUENCY. It
//! provides:
//! - Simulated response latency
//! - Controllable fault injection (silence, corruption, truncation, stray bytes, I/O errors)
//! - Opcode logging for test verification
//!
//! # Example
//!
//! ```
//! use rssi_scanner::link::DeviceLink;
//! use rssi_scanner::transport::MockDevice;
//!
//! let device = MockDevice::new(5800);
//! let handle = device.handle();
//! let mut link = DeviceLink::new(device);
//! assert_eq!(link.read_frequency().unwrap(), 5800);
//! link.write_frequency(5645).unwrap();
//! assert_eq!(handle.frequency(), 5645);
//! ```

use super::Transport;
use crate::error::TransportError;
use crate::protocol::{
    decode_write, encode_response, write_u16_be, LAP_STATS_PAYLOAD_LEN, READ_FREQUENCY,
    READ_LAP_STATS, READ_REVISION_CODE, REVISION_VERIFY_BYTE, WRITE_FREQUENCY,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Signal-strength model: rssi reported while tuned to a frequency.
pub type RssiModel = Box<dyn Fn(u16) -> u8 + Send>;

/// Fault applied to the next request the mock receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    /// Swallow the request; the host times out.
    Silent,
    /// Answer with a wrong checksum byte.
    CorruptChecksum,
    /// Answer with the checksum byte missing.
    Truncate,
    /// Answer with one stray byte after the checksum.
    TrailingByte,
    /// Fail the host's write with an I/O error.
    WriteError,
}

/// Peak/nadir history the mock reports in lap stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct History {
    rssi: u8,
    ms_since_start: u16,
    ms_since_end: u16,
}

struct MockState {
    frequency: u16,
    api_level: u8,
    latency: Duration,
    rssi_model: RssiModel,
    history: History,
    laps: u8,
    faults: VecDeque<MockFault>,
    pending: VecDeque<u8>,
    opcodes: Vec<u8>,
    written: Vec<u16>,
    /// Accept frequency writes without retuning.
    stuck: bool,
}

impl MockState {
    fn lap_stats_payload(&self) -> [u8; LAP_STATS_PAYLOAD_LEN] {
        let mut payload = [0u8; LAP_STATS_PAYLOAD_LEN];
        let rssi = (self.rssi_model)(self.frequency);
        payload[0] = self.laps;
        payload[3] = rssi;
        payload[4] = rssi;
        write_u16_be(&mut payload, 6, 1000);
        payload[11] = self.history.rssi;
        write_u16_be(&mut payload, 12, self.history.ms_since_start);
        write_u16_be(&mut payload, 14, self.history.ms_since_end);
        payload
    }

    fn respond(&mut self, payload: &[u8], fault: Option<MockFault>) {
        let mut frame = encode_response(payload);
        match fault {
            Some(MockFault::Silent) => return,
            Some(MockFault::CorruptChecksum) => {
                if let Some(last) = frame.last_mut() {
                    *last = last.wrapping_add(1);
                }
            }
            Some(MockFault::Truncate) => {
                frame.pop();
            }
            Some(MockFault::TrailingByte) => frame.push(0xAA),
            Some(MockFault::WriteError) | None => {}
        }
        self.pending.extend(frame);
    }
}

/// Default model: a transmitter parked on 5800 MHz.
fn default_rssi(frequency: u16) -> u8 {
    let distance = frequency.abs_diff(5800) / 2;
    100u16.saturating_sub(distance).max(10) as u8
}

/// Scripted node implementing [`Transport`].
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Create a node tuned to `frequency` with no latency.
    pub fn new(frequency: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                frequency,
                api_level: 18,
                latency: Duration::ZERO,
                rssi_model: Box::new(default_rssi),
                history: History::default(),
                laps: 0,
                faults: VecDeque::new(),
                pending: VecDeque::new(),
                opcodes: Vec::new(),
                written: Vec::new(),
                stuck: false,
            })),
        }
    }

    /// Delay every response by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = latency;
        self
    }

    /// Replace the rssi model.
    pub fn with_rssi_model(self, model: impl Fn(u16) -> u8 + Send + 'static) -> Self {
        self.state.lock().rssi_model = Box::new(model);
        self
    }

    /// Handle for inspecting and steering the mock after it is moved into a link.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: self.state.clone(),
        }
    }
}

/// Shared view of a [`MockDevice`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Frequency the mock is tuned to.
    pub fn frequency(&self) -> u16 {
        self.state.lock().frequency
    }

    /// Retune the mock directly, as if from its front panel.
    pub fn set_frequency(&self, frequency: u16) {
        self.state.lock().frequency = frequency;
    }

    /// Set the API level returned by READ_REVISION_CODE.
    pub fn set_api_level(&self, level: u8) {
        self.state.lock().api_level = level;
    }

    /// Report a peak/nadir history entry in subsequent lap stats.
    pub fn set_history(&self, rssi: u8, ms_since_start: u16, ms_since_end: u16) {
        self.state.lock().history = History {
            rssi,
            ms_since_start,
            ms_since_end,
        };
    }

    /// Ignore frequency writes while keeping the old frequency.
    pub fn set_stuck(&self, stuck: bool) {
        self.state.lock().stuck = stuck;
    }

    /// Queue a fault for the next request.
    pub fn inject(&self, fault: MockFault) {
        self.state.lock().faults.push_back(fault);
    }

    /// Every opcode received, in order.
    pub fn opcodes(&self) -> Vec<u8> {
        self.state.lock().opcodes.clone()
    }

    /// How many times `opcode` was received.
    pub fn request_count(&self, opcode: u8) -> usize {
        self.state
            .lock()
            .opcodes
            .iter()
            .filter(|&&op| op == opcode)
            .count()
    }

    /// Every frequency written through WRITE_FREQUENCY, in order.
    pub fn written_frequencies(&self) -> Vec<u16> {
        self.state.lock().written.clone()
    }
}

impl Transport for MockDevice {
    fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let fault = state.faults.pop_front();
        if fault == Some(MockFault::WriteError) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }

        let Some(&opcode) = bytes.first() else {
            return Ok(());
        };
        state.opcodes.push(opcode);

        match opcode {
            READ_FREQUENCY => {
                let payload = state.frequency.to_be_bytes();
                state.respond(&payload, fault);
            }
            READ_LAP_STATS => {
                let payload = state.lap_stats_payload();
                state.respond(&payload, fault);
            }
            READ_REVISION_CODE => {
                let payload = [REVISION_VERIFY_BYTE, state.api_level];
                state.respond(&payload, fault);
            }
            WRITE_FREQUENCY => {
                // A malformed write is dropped, as the firmware does.
                if let Ok((_, payload)) = decode_write(bytes) {
                    if payload.len() == 2 && fault != Some(MockFault::Silent) {
                        let frequency = u16::from_be_bytes([payload[0], payload[1]]);
                        state.written.push(frequency);
                        if !state.stuck {
                            state.frequency = frequency;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let latency = self.state.lock().latency;
        let ready = !self.state.lock().pending.is_empty();

        if !ready || latency > timeout {
            std::thread::sleep(timeout);
            return Err(TransportError::Timeout {
                operation: "mock read",
                timeout,
            });
        }
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let mut state = self.state.lock();
        let n = buf.len().min(state.pending.len());
        for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        Ok(self.state.lock().pending.len())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.state.lock().pending.clear();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mock node @ {} MHz", self.state.lock().frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_read, encode_write, verify_response};

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn answers_frequency_reads() {
        let mut device = MockDevice::new(5800);
        device.write(&encode_read(READ_FREQUENCY), TIMEOUT).unwrap();
        let mut buf = [0u8; 8];
        let n = device.read(&mut buf, TIMEOUT).unwrap();
        assert_eq!(&buf[..n], &[0x16, 0xA8, 0xBE]);
    }

    #[test]
    fn applies_frequency_writes() {
        let mut device = MockDevice::new(5800);
        let handle = device.handle();
        device
            .write(&encode_write(WRITE_FREQUENCY, &5645u16.to_be_bytes()), TIMEOUT)
            .unwrap();
        assert_eq!(handle.frequency(), 5645);
        assert_eq!(handle.written_frequencies(), vec![5645]);
        assert_eq!(handle.opcodes(), vec![WRITE_FREQUENCY]);
    }

    #[test]
    fn corrupt_fault_breaks_checksum_once() {
        let mut device = MockDevice::new(5800);
        device.handle().inject(MockFault::CorruptChecksum);
        let mut buf = [0u8; 3];

        device.write(&encode_read(READ_FREQUENCY), TIMEOUT).unwrap();
        device.read(&mut buf, TIMEOUT).unwrap();
        assert!(!verify_response(&buf));

        device.write(&encode_read(READ_FREQUENCY), TIMEOUT).unwrap();
        device.read(&mut buf, TIMEOUT).unwrap();
        assert!(verify_response(&buf));
    }

    #[test]
    fn silent_fault_times_out() {
        let mut device = MockDevice::new(5800);
        device.handle().inject(MockFault::Silent);
        device.write(&encode_read(READ_LAP_STATS), TIMEOUT).unwrap();
        let mut buf = [0u8; 17];
        assert!(matches!(
            device.read(&mut buf, TIMEOUT),
            Err(TransportError::Timeout { .. })
        ));
    }

    #[test]
    fn late_response_stays_pending_until_discarded() {
        let mut device = MockDevice::new(5800).with_latency(Duration::from_millis(50));
        device.write(&encode_read(READ_FREQUENCY), TIMEOUT).unwrap();
        let mut buf = [0u8; 3];
        assert!(device.read(&mut buf, TIMEOUT).is_err());
        assert!(!device.state.lock().pending.is_empty());
        device.discard_input().unwrap();
        assert!(device.state.lock().pending.is_empty());
    }
}
