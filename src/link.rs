//! Device link: one request/response exchange at a time over a [`Transport`].
//!
//! Every operation is blocking and bounded by the link timeout (100 ms by
//! default). Methods take `&mut self`, so the borrow checker allows only one
//! request in flight per link; sharing across threads goes through a mutex
//! owned by the acquisition worker.
//!
//! Before each request the link drops unread input, so a late answer to an
//! abandoned exchange cannot be parsed as the answer to the next one.

use crate::error::{ScannerError, ScannerResult};
use crate::protocol::{
    decode_response, encode_read, encode_write, opcode_name, read_u16_be, LapStats,
    FREQUENCY_PAYLOAD_LEN, LAP_STATS_PAYLOAD_LEN, READ_FREQUENCY, READ_LAP_STATS,
    READ_REVISION_CODE, REVISION_PAYLOAD_LEN, REVISION_VERIFY_BYTE, WRITE_FREQUENCY,
};
use crate::transport::Transport;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-exchange timeout used by the reference node.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Number of write/read-back rounds for a validated frequency change.
pub const DEFAULT_SET_ATTEMPTS: usize = 5;

/// Estimate when the node sampled its statistics.
///
/// The reading is assumed to sit halfway through the exchange, so the
/// caller's `now_ms` is advanced by half the round trip measured on the
/// monotonic clock.
pub fn compensate_timestamp(now_ms: i64, sent: Instant, received: Instant) -> i64 {
    let round_trip = received.saturating_duration_since(sent);
    now_ms + (round_trip.as_millis() / 2) as i64
}

/// A verified read response with its monotonic send/receive instants.
struct Exchange {
    payload: Vec<u8>,
    sent: Instant,
    received: Instant,
}

/// Protocol endpoint for a single node.
pub struct DeviceLink<T: Transport> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> DeviceLink<T> {
    /// Wrap an opened transport using [`DEFAULT_TIMEOUT`].
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-exchange timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Description of the underlying transport.
    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    fn read_block(&mut self, opcode: u8, payload_len: usize) -> ScannerResult<Exchange> {
        self.transport.discard_input()?;

        let sent = Instant::now();
        self.transport.write(&encode_read(opcode), self.timeout)?;

        let mut buf = vec![0u8; payload_len + 1];
        let mut n = self.transport.read(&mut buf, self.timeout)?;
        let received = Instant::now();

        // trailing bytes make the frame over-long; pull them in so it fails on length
        let extra = self.transport.bytes_to_read()?;
        if n == buf.len() && extra > 0 {
            buf.resize(n + extra, 0);
            n += self.transport.read(&mut buf[n..], self.timeout)?;
        }

        let payload = decode_response(opcode, payload_len, &buf[..n])
            .inspect_err(|e| warn!(opcode = opcode_name(opcode), "{}", e))?
            .to_vec();

        debug!(
            opcode = opcode_name(opcode),
            bytes = n,
            round_trip_us = received.duration_since(sent).as_micros() as u64,
            "exchange complete"
        );
        Ok(Exchange {
            payload,
            sent,
            received,
        })
    }

    /// Read the node's tuned frequency.
    pub fn read_frequency(&mut self) -> ScannerResult<u16> {
        let exchange = self.read_block(READ_FREQUENCY, FREQUENCY_PAYLOAD_LEN)?;
        Ok(read_u16_be(&exchange.payload, 0))
    }

    /// Tune the node. No response is expected.
    ///
    /// The link encodes whatever it is given; range checks happen upstream.
    pub fn write_frequency(&mut self, frequency: u16) -> ScannerResult<()> {
        self.transport.discard_input()?;
        let frame = encode_write(WRITE_FREQUENCY, &frequency.to_be_bytes());
        self.transport.write(&frame, self.timeout)?;
        debug!(opcode = opcode_name(WRITE_FREQUENCY), frequency, "frequency written");
        Ok(())
    }

    /// Poll the lap statistics record.
    ///
    /// `now_ms` is the caller's clock at the time of the call; the returned
    /// timestamp adds half the measured round trip.
    pub fn read_lap_stats(&mut self, now_ms: i64) -> ScannerResult<LapStats> {
        let exchange = self.read_block(READ_LAP_STATS, LAP_STATS_PAYLOAD_LEN)?;
        let timestamp = compensate_timestamp(now_ms, exchange.sent, exchange.received);
        Ok(LapStats::parse(&exchange.payload, timestamp)?)
    }

    /// Read the firmware API level.
    ///
    /// Returns `None` when the verification byte is wrong, meaning the
    /// firmware does not implement the command.
    pub fn read_api_level(&mut self) -> ScannerResult<Option<u8>> {
        let exchange = self.read_block(READ_REVISION_CODE, REVISION_PAYLOAD_LEN)?;
        let [verify, level] = [exchange.payload[0], exchange.payload[1]];
        Ok((verify == REVISION_VERIFY_BYTE).then_some(level))
    }

    /// Write `frequency` and read it back, repeating until the node agrees.
    ///
    /// # Errors
    /// [`ScannerError::FrequencyMismatch`] when the node still reports a
    /// different frequency after `attempts` rounds, or the last transport or
    /// protocol error if no round completed.
    pub fn set_frequency_validated(
        &mut self,
        frequency: u16,
        attempts: usize,
    ) -> ScannerResult<u16> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = self
                .write_frequency(frequency)
                .and_then(|()| self.read_frequency());
            let error = match result {
                Ok(reported) if reported == frequency => return Ok(reported),
                Ok(reported) => {
                    debug!(attempt, frequency, reported, "frequency read-back mismatch");
                    ScannerError::FrequencyMismatch {
                        requested: frequency,
                        reported,
                    }
                }
                Err(e) => {
                    debug!(attempt, frequency, "frequency write failed: {}", e);
                    e
                }
            };
            if attempt == attempts {
                return Err(error);
            }
            attempt += 1;
        }
    }
}
