//! READ_LAP_STATS record.
//!
//! ```text
//! [0]      laps
//! [1-2]    ms since last lap
//! [3]      rssi
//! [4]      peak rssi
//! [5]      last pass peak
//! [6-7]    loop time (us)
//! [8]      flags
//! [9]      last pass nadir
//! [10]     nadir rssi
//! [11]     history rssi
//! [12-13]  ms since history start
//! [14-15]  ms since history end
//! ```

use super::frame::read_u16_be;
use crate::error::ProtocolError;
use crate::protocol::READ_LAP_STATS;

/// Payload size of a READ_LAP_STATS response, checksum excluded.
pub const LAP_STATS_PAYLOAD_LEN: usize = 16;

/// One statistics snapshot from the node.
///
/// Only `rssi`, `history_rssi` and the two history offsets drive acquisition;
/// the remaining fields are decoded so callers can log them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LapStats {
    /// Event time in ms, corrected by half the exchange round trip.
    pub timestamp_ms: i64,
    /// Live signal strength.
    pub rssi: i32,
    /// Signal strength of the most recent peak/nadir history entry; 0 when none.
    pub history_rssi: i32,
    /// Milliseconds since the history entry began.
    pub ms_since_history_start: i64,
    /// Milliseconds since the history entry ended.
    pub ms_since_history_end: i64,
    /// Lap counter.
    pub laps: u8,
    /// Milliseconds since the last lap was detected.
    pub ms_since_last_lap: u16,
    /// Highest rssi seen by the node.
    pub peak_rssi: i32,
    /// Peak of the last pass.
    pub last_pass_peak: i32,
    /// Node main-loop time in microseconds.
    pub loop_time_micros: u16,
    /// Crossing and status flags.
    pub flags: u8,
    /// Nadir of the last pass.
    pub last_pass_nadir: i32,
    /// Lowest rssi seen by the node.
    pub nadir_rssi: i32,
}

/// Single-byte signal fields are signed on the wire.
fn rssi_at(payload: &[u8], offset: usize) -> i32 {
    i32::from(payload[offset] as i8)
}

impl LapStats {
    /// Decode a checksum-verified payload.
    pub fn parse(payload: &[u8], timestamp_ms: i64) -> Result<Self, ProtocolError> {
        if payload.len() != LAP_STATS_PAYLOAD_LEN {
            return Err(ProtocolError::Length {
                opcode: READ_LAP_STATS,
                expected: LAP_STATS_PAYLOAD_LEN + 1,
                actual: payload.len() + 1,
            });
        }
        Ok(Self {
            timestamp_ms,
            rssi: rssi_at(payload, 3),
            history_rssi: rssi_at(payload, 11),
            ms_since_history_start: i64::from(read_u16_be(payload, 12)),
            ms_since_history_end: i64::from(read_u16_be(payload, 14)),
            laps: payload[0],
            ms_since_last_lap: read_u16_be(payload, 1),
            peak_rssi: rssi_at(payload, 4),
            last_pass_peak: rssi_at(payload, 5),
            loop_time_micros: read_u16_be(payload, 6),
            flags: payload[8],
            last_pass_nadir: rssi_at(payload, 9),
            nadir_rssi: rssi_at(payload, 10),
        })
    }

    /// Whether the node reported a peak/nadir history entry.
    pub fn has_history(&self) -> bool {
        self.history_rssi != 0
    }

    /// Absolute times of the history entry's start and end.
    ///
    /// Returns one point when both offsets coincide.
    pub fn history_points(&self) -> Vec<(i64, i32)> {
        if !self.has_history() {
            return Vec::new();
        }
        let start = self.timestamp_ms - self.ms_since_history_start;
        let end = self.timestamp_ms - self.ms_since_history_end;
        if start == end {
            vec![(start, self.history_rssi)]
        } else {
            vec![(start, self.history_rssi), (end, self.history_rssi)]
        }
    }
}
