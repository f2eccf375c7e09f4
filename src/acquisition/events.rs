//! Values published to the presentation layer.

use super::Mode;
use crate::buffers::{CircularBuffer, FixedBuffer, TimedSample};

/// Rssi recorded at one frequency by a scan tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPoint {
    /// Frequency the node was tuned to when sampled (MHz).
    pub frequency: u16,
    /// Rssi just measured.
    pub live: i32,
    /// Lowest rssi seen at this frequency this session.
    pub min: i32,
    /// Highest rssi seen at this frequency this session.
    pub max: i32,
}

/// Visible time range of the signal plot, in session milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    /// Oldest visible instant.
    pub start_ms: i64,
    /// Newest visible instant.
    pub end_ms: i64,
}

impl TimeWindow {
    /// Window of `span_ms` ending at `now_ms`.
    pub fn ending_at(now_ms: i64, span_ms: i64) -> Self {
        Self {
            start_ms: now_ms - span_ms,
            end_ms: now_ms,
        }
    }
}

/// What one tick added to the active buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferDelta {
    /// Scan tick.
    Scan {
        /// Frequency the node reported before retuning.
        probed: u16,
        /// Recorded values, `None` when `probed` was outside the band.
        point: Option<ScanPoint>,
        /// Frequency the node was retuned to.
        next: u16,
    },
    /// Signal tick.
    Signal {
        /// Live sample appended.
        live: TimedSample,
        /// History points appended (zero, one or two).
        history: Vec<TimedSample>,
        /// Plot window after this tick.
        window: TimeWindow,
    },
}

/// Per-tick notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionEvent {
    /// A tick completed.
    Tick {
        /// Mode that produced the tick.
        mode: Mode,
        /// New frequency, when the tick changed it.
        frequency: Option<u16>,
        /// Buffer change.
        delta: BufferDelta,
    },
    /// A tick or command failed; the schedule continues.
    Error {
        /// Mode active at the time, if any.
        mode: Option<Mode>,
        /// Human readable message.
        message: String,
    },
    /// The active mode changed (`None` when stopped).
    ModeChanged {
        /// Mode now running.
        mode: Option<Mode>,
    },
    /// A manual frequency change was confirmed by the node.
    FrequencyChanged {
        /// Frequency now tuned (MHz).
        frequency: u16,
    },
}

/// Scan buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSnapshot {
    /// Latest rssi per frequency.
    pub live: FixedBuffer<Option<i32>>,
    /// Running minimum per frequency.
    pub min: FixedBuffer<Option<i32>>,
    /// Running maximum per frequency.
    pub max: FixedBuffer<Option<i32>>,
}

/// Signal buffers.
#[derive(Debug, Clone)]
pub struct SignalSnapshot {
    /// Rolling live rssi.
    pub live: CircularBuffer<TimedSample>,
    /// Rolling peak/nadir history points.
    pub history: CircularBuffer<TimedSample>,
    /// Current plot window.
    pub window: TimeWindow,
}

/// Contents of the active mode's buffers.
///
/// Published whole behind an `Arc` so readers never observe a half-updated
/// or half-swapped set of series.
#[derive(Debug, Clone, Default)]
pub enum SeriesSnapshot {
    /// No mode is running.
    #[default]
    Empty,
    /// Scan mode buffers.
    Scan(ScanSnapshot),
    /// Signal mode buffers.
    Signal(SignalSnapshot),
}

impl SeriesSnapshot {
    /// Mode the snapshot belongs to.
    pub fn mode(&self) -> Option<Mode> {
        match self {
            SeriesSnapshot::Empty => None,
            SeriesSnapshot::Scan(_) => Some(Mode::Scan),
            SeriesSnapshot::Signal(_) => Some(Mode::Signal),
        }
    }
}

/// Latest-only status for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    /// Mode currently scheduled.
    pub mode: Option<Mode>,
    /// Last known node frequency (MHz).
    pub frequency: Option<u16>,
    /// Node API level, when probed.
    pub api_level: Option<u8>,
    /// Most recent error message. Each new error replaces the last.
    pub last_error: Option<String>,
    /// Successful ticks since the worker started.
    pub ticks: u64,
}
