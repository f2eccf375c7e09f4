//! Periodic acquisition: the scan sweep and the fixed-frequency signal monitor.
//!
//! Both modes are [`Routine`]s. A tick is split in two halves so cancellation
//! stays clean:
//!
//! 1. [`Routine::poll`] performs the blocking device exchanges. It runs on the
//!    blocking pool and only sees a copy of the routine's context, never its
//!    buffers. It checks the job's token before touching the device and again
//!    before any write, so a stopped job never retunes the node.
//! 2. [`Routine::apply`] folds the reading into the routine's buffers. It runs
//!    on the job task only if the job was not cancelled while the exchange was
//!    in flight, so a stale reading can never land in a newer session's
//!    buffers.
//!
//! The [`scheduler`] owns the worker thread that runs at most one routine at a
//! time.

pub mod events;
pub mod scan;
pub mod scheduler;
pub mod signal;

pub use events::{
    AcquisitionEvent, BufferDelta, DisplayState, ScanPoint, ScanSnapshot, SeriesSnapshot,
    SignalSnapshot, TimeWindow,
};
pub use scan::{ScanRoutine, ScanSeries};
pub use scheduler::{AcquisitionWorker, SchedulerSettings, SharedLink, WorkerCommand};
pub use signal::{SignalRoutine, SignalSeries};

use crate::error::{ScannerError, ScannerResult};
use crate::link::DeviceLink;
use crate::transport::DynTransport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Acquisition mode. Exactly one may be scheduled at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Sweep the band, recording live/min/max rssi per frequency.
    #[default]
    Scan,
    /// Hold the frequency and record a rolling rssi time series.
    Signal,
}

impl Mode {
    /// The mode a toggle switches to.
    pub fn other(self) -> Self {
        match self {
            Mode::Scan => Mode::Signal,
            Mode::Signal => Mode::Scan,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Scan => write!(f, "scan"),
            Mode::Signal => write!(f, "signal"),
        }
    }
}

/// Result of applying one successful tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Frequency to display after this tick, if the tick changed it.
    pub frequency: Option<u16>,
    /// What the tick added to the buffers.
    pub delta: BufferDelta,
}

/// One acquisition mode's periodic work.
pub trait Routine: Send + 'static {
    /// Copyable parameters the blocking half needs.
    type Context: Copy + Send + 'static;
    /// What the blocking half hands back.
    type Reading: Send + 'static;

    /// Mode this routine implements.
    fn mode(&self) -> Mode;

    /// Tick period.
    fn period(&self) -> Duration;

    /// Parameters for [`Routine::poll`].
    fn context(&self) -> Self::Context;

    /// Device exchanges for one tick. Blocking.
    ///
    /// Returns [`ScannerError::Cancelled`] instead of writing to the device
    /// once `cancel` has fired.
    fn poll(
        context: Self::Context,
        link: &mut DeviceLink<DynTransport>,
        cancel: &CancellationToken,
        now_ms: i64,
    ) -> ScannerResult<Self::Reading>;

    /// Record a reading. `now_ms` is the session clock after the exchange.
    fn apply(&mut self, reading: Self::Reading, now_ms: i64) -> Tick;

    /// Copy of the buffers for the presentation layer.
    fn snapshot(&self) -> SeriesSnapshot;
}

/// Fail with [`ScannerError::Cancelled`] once the job's token has fired.
pub fn ensure_live(cancel: &CancellationToken) -> ScannerResult<()> {
    if cancel.is_cancelled() {
        Err(ScannerError::Cancelled)
    } else {
        Ok(())
    }
}
