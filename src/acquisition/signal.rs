//! Signal mode: poll rssi at a fixed frequency.

use super::events::{BufferDelta, SeriesSnapshot, SignalSnapshot, TimeWindow};
use super::{Mode, Routine, Tick};
use crate::buffers::{CircularBuffer, TimedSample};
use crate::error::ScannerResult;
use crate::link::DeviceLink;
use crate::protocol::LapStats;
use crate::transport::DynTransport;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default signal tick period.
pub const DEFAULT_SIGNAL_PERIOD: Duration = Duration::from_millis(50);

/// Default number of samples kept in each rolling buffer.
pub const DEFAULT_NUM_SAMPLES: usize = 200;

/// Rolling live and history series.
#[derive(Debug, Clone)]
pub struct SignalSeries {
    live: CircularBuffer<TimedSample>,
    history: CircularBuffer<TimedSample>,
}

impl SignalSeries {
    /// Empty series holding `num_samples` points each.
    pub fn new(num_samples: usize) -> Self {
        Self {
            live: CircularBuffer::new(num_samples),
            history: CircularBuffer::new(num_samples),
        }
    }

    /// Append a poll result. Returns the history points added.
    pub fn record(&mut self, stats: &LapStats) -> Vec<TimedSample> {
        self.live.add(stats.timestamp_ms, stats.rssi);
        let points = stats.history_points();
        for &point in &points {
            self.history.push(point);
        }
        points
    }

    /// Rolling live samples, oldest first.
    pub fn live(&self) -> &CircularBuffer<TimedSample> {
        &self.live
    }

    /// Rolling history points, oldest first.
    pub fn history(&self) -> &CircularBuffer<TimedSample> {
        &self.history
    }

    /// Empty both rings.
    pub fn reset(&mut self) {
        self.live.reset();
        self.history.reset();
    }
}

/// The fixed-frequency monitor and its buffers.
pub struct SignalRoutine {
    period: Duration,
    num_samples: usize,
    series: SignalSeries,
    window: TimeWindow,
}

impl SignalRoutine {
    /// Fresh monitor keeping `num_samples` points.
    pub fn new(period: Duration, num_samples: usize) -> Self {
        Self {
            period,
            num_samples,
            series: SignalSeries::new(num_samples),
            window: TimeWindow::default(),
        }
    }

    /// Span of the plot window: `num_samples * period`.
    pub fn window_span_ms(&self) -> i64 {
        self.num_samples as i64 * self.period.as_millis() as i64
    }

    /// Buffers recorded so far.
    pub fn series(&self) -> &SignalSeries {
        &self.series
    }
}

impl Routine for SignalRoutine {
    type Context = ();
    type Reading = LapStats;

    fn mode(&self) -> Mode {
        Mode::Signal
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn context(&self) {}

    fn poll(
        _: (),
        link: &mut DeviceLink<DynTransport>,
        _cancel: &CancellationToken,
        now_ms: i64,
    ) -> ScannerResult<LapStats> {
        link.read_lap_stats(now_ms)
    }

    fn apply(&mut self, stats: LapStats, now_ms: i64) -> Tick {
        let history = self.series.record(&stats);
        self.window = TimeWindow::ending_at(now_ms, self.window_span_ms());
        Tick {
            frequency: None,
            delta: BufferDelta::Signal {
                live: (stats.timestamp_ms, stats.rssi),
                history,
                window: self.window,
            },
        }
    }

    fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot::Signal(SignalSnapshot {
            live: self.series.live.clone(),
            history: self.series.history.clone(),
            window: self.window,
        })
    }
}
