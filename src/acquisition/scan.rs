//! Scan mode: sweep the band one step per tick.
//!
//! Each tick reads the node's frequency and rssi, records live/min/max for
//! that frequency, then retunes the node one step up (wrapping at the top of
//! the band).

use super::events::{BufferDelta, ScanPoint, ScanSnapshot, SeriesSnapshot};
use super::{ensure_live, Mode, Routine, Tick};
use crate::band::FrequencyBand;
use crate::buffers::FixedBuffer;
use crate::error::ScannerResult;
use crate::link::DeviceLink;
use crate::transport::DynTransport;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default scan tick period.
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_millis(100);

/// Live, minimum and maximum rssi per frequency.
///
/// Slots start unset. The first sample at a frequency becomes its minimum and
/// maximum; later samples only lower the minimum or raise the maximum.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSeries {
    live: FixedBuffer<Option<i32>>,
    min: FixedBuffer<Option<i32>>,
    max: FixedBuffer<Option<i32>>,
}

impl ScanSeries {
    /// Empty series over `band`.
    pub fn new(band: FrequencyBand) -> Self {
        Self {
            live: FixedBuffer::new(band),
            min: FixedBuffer::new(band),
            max: FixedBuffer::new(band),
        }
    }

    /// Record `rssi` at `frequency`.
    pub fn record(&mut self, frequency: u16, rssi: i32) -> ScannerResult<ScanPoint> {
        let min = self.min.at(frequency).flatten().map_or(rssi, |m| m.min(rssi));
        let max = self.max.at(frequency).flatten().map_or(rssi, |m| m.max(rssi));
        self.live.set(frequency, Some(rssi))?;
        self.min.set(frequency, Some(min))?;
        self.max.set(frequency, Some(max))?;
        Ok(ScanPoint {
            frequency,
            live: rssi,
            min,
            max,
        })
    }

    /// Latest rssi at `frequency`.
    pub fn live(&self, frequency: u16) -> Option<i32> {
        self.live.at(frequency).flatten()
    }

    /// Minimum rssi observed at `frequency`.
    pub fn min(&self, frequency: u16) -> Option<i32> {
        self.min.at(frequency).flatten()
    }

    /// Maximum rssi observed at `frequency`.
    pub fn max(&self, frequency: u16) -> Option<i32> {
        self.max.at(frequency).flatten()
    }

    /// Copy for publication.
    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            live: self.live.clone(),
            min: self.min.clone(),
            max: self.max.clone(),
        }
    }
}

/// Outcome of one scan exchange sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReading {
    /// Frequency the node reported.
    pub frequency: u16,
    /// Rssi at that frequency.
    pub rssi: i32,
    /// Frequency written for the next tick.
    pub next: u16,
}

/// The sweep routine and its buffers.
pub struct ScanRoutine {
    band: FrequencyBand,
    period: Duration,
    series: ScanSeries,
}

impl ScanRoutine {
    /// Fresh sweep over `band`.
    pub fn new(band: FrequencyBand, period: Duration) -> Self {
        Self {
            band,
            period,
            series: ScanSeries::new(band),
        }
    }

    /// Buffers recorded so far.
    pub fn series(&self) -> &ScanSeries {
        &self.series
    }
}

impl Routine for ScanRoutine {
    type Context = FrequencyBand;
    type Reading = ScanReading;

    fn mode(&self) -> Mode {
        Mode::Scan
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn context(&self) -> FrequencyBand {
        self.band
    }

    fn poll(
        band: FrequencyBand,
        link: &mut DeviceLink<DynTransport>,
        cancel: &CancellationToken,
        now_ms: i64,
    ) -> ScannerResult<ScanReading> {
        let frequency = link.read_frequency()?;
        ensure_live(cancel)?;
        let stats = link.read_lap_stats(now_ms)?;
        let next = band.next_scan_frequency(frequency);
        ensure_live(cancel)?;
        link.write_frequency(next)?;
        Ok(ScanReading {
            frequency,
            rssi: stats.rssi,
            next,
        })
    }

    fn apply(&mut self, reading: ScanReading, _now_ms: i64) -> Tick {
        // outside the band: nothing to record, the sweep restarts at min
        let point = self.series.record(reading.frequency, reading.rssi).ok();
        trace!(
            frequency = reading.frequency,
            rssi = reading.rssi,
            next = reading.next,
            "scan tick"
        );
        Tick {
            frequency: Some(reading.next),
            delta: BufferDelta::Scan {
                probed: reading.frequency,
                point,
                next: reading.next,
            },
        }
    }

    fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot::Scan(self.series.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{MAX_FREQ, MIN_FREQ};
    use crate::error::ScannerError;
    use crate::transport::MockDevice;

    fn routine() -> ScanRoutine {
        ScanRoutine::new(FrequencyBand::default(), DEFAULT_SCAN_PERIOD)
    }

    fn link(frequency: u16) -> (DeviceLink<DynTransport>, crate::transport::MockHandle) {
        let device = MockDevice::new(frequency);
        let handle = device.handle();
        let transport: DynTransport = Box::new(device);
        (DeviceLink::new(transport), handle)
    }

    #[test]
    fn first_sample_sets_min_and_max() {
        let mut series = ScanSeries::new(FrequencyBand::default());
        assert_eq!(series.min(5800), None);

        let point = series.record(5800, 40).unwrap();
        assert_eq!((point.min, point.max), (40, 40));

        series.record(5800, 70).unwrap();
        series.record(5800, 55).unwrap();
        assert_eq!(series.live(5800), Some(55));
        assert_eq!(series.min(5800), Some(40));
        assert_eq!(series.max(5800), Some(70));
        assert_eq!(series.live(5802), None);
    }

    #[test]
    fn zero_rssi_is_a_real_minimum() {
        let mut series = ScanSeries::new(FrequencyBand::default());
        series.record(5700, 0).unwrap();
        series.record(5700, 30).unwrap();
        assert_eq!(series.min(5700), Some(0));
        assert_eq!(series.max(5700), Some(30));
    }

    #[test]
    fn tick_at_top_of_band_wraps_to_min() {
        let (mut link, handle) = link(MAX_FREQ);
        let mut routine = routine();

        let reading =
            ScanRoutine::poll(routine.context(), &mut link, &CancellationToken::new(), 0).unwrap();
        assert_eq!(reading.frequency, MAX_FREQ);
        assert_eq!(reading.next, MIN_FREQ);
        assert_eq!(handle.frequency(), MIN_FREQ);

        let tick = routine.apply(reading, 0);
        assert_eq!(tick.frequency, Some(MIN_FREQ));
        assert!(routine.series().live(MAX_FREQ).is_some());
    }

    #[test]
    fn out_of_band_reading_records_nothing() {
        let (mut link, handle) = link(5500);
        let mut routine = routine();

        let reading =
            ScanRoutine::poll(routine.context(), &mut link, &CancellationToken::new(), 0).unwrap();
        assert_eq!(handle.frequency(), MIN_FREQ);

        let tick = routine.apply(reading, 0);
        assert!(matches!(
            tick.delta,
            BufferDelta::Scan {
                probed: 5500,
                point: None,
                next: MIN_FREQ
            }
        ));
    }

    #[test]
    fn cancelled_tick_does_not_retune() {
        let (mut link, handle) = link(5800);
        let routine = routine();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ScanRoutine::poll(routine.context(), &mut link, &cancel, 0);
        assert!(matches!(result, Err(ScannerError::Cancelled)));
        assert!(handle.written_frequencies().is_empty());
        assert_eq!(handle.frequency(), 5800);
    }

    #[test]
    fn consecutive_ticks_step_through_band() {
        let (mut link, handle) = link(MIN_FREQ);
        let mut routine = routine();
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            let reading = ScanRoutine::poll(routine.context(), &mut link, &cancel, 0).unwrap();
            routine.apply(reading, 0);
        }
        assert_eq!(handle.written_frequencies(), vec![5647, 5649, 5651]);
        assert!(routine.series().max(5649).is_some());
        assert!(routine.series().max(5651).is_none());
    }
}
