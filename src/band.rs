//! The frequency band a node can be tuned across.
//!
//! Frequencies are whole MHz values. The scan sweep steps through the band by
//! a fixed increment, wrapping from the top back to the bottom.

use crate::error::{ScannerError, ScannerResult};

/// Lowest frequency the node accepts (MHz).
pub const MIN_FREQ: u16 = 5645;
/// Highest frequency the node accepts (MHz).
pub const MAX_FREQ: u16 = 5945;
/// Sweep increment (MHz).
pub const SCAN_STEP: u16 = 2;

/// Inclusive frequency range plus sweep step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyBand {
    /// Lowest frequency (MHz), also the slot offset.
    pub min: u16,
    /// Highest frequency (MHz).
    pub max: u16,
    /// Sweep increment (MHz).
    pub step: u16,
}

impl Default for FrequencyBand {
    fn default() -> Self {
        Self {
            min: MIN_FREQ,
            max: MAX_FREQ,
            step: SCAN_STEP,
        }
    }
}

impl FrequencyBand {
    /// Create a band, checking that it can hold at least two slots.
    pub fn new(min: u16, max: u16, step: u16) -> ScannerResult<Self> {
        if step == 0 {
            return Err(ScannerError::Configuration(
                "scan step must be non-zero".to_string(),
            ));
        }
        if min >= max {
            return Err(ScannerError::Configuration(format!(
                "min frequency {min} must be below max frequency {max}"
            )));
        }
        if step > max - min {
            return Err(ScannerError::Configuration(format!(
                "scan step {step} exceeds band width {}",
                max - min
            )));
        }
        Ok(Self { min, max, step })
    }

    /// Number of addressable slots: `(max - min) / step + 1`.
    pub fn slot_count(&self) -> usize {
        usize::from((self.max - self.min) / self.step) + 1
    }

    /// Whether `frequency` lies inside `[min, max]`.
    pub fn contains(&self, frequency: u16) -> bool {
        (self.min..=self.max).contains(&frequency)
    }

    /// Slot index for `frequency`, or `None` outside the band.
    ///
    /// Off-step frequencies truncate onto the slot below them.
    pub fn slot_of(&self, frequency: u16) -> Option<usize> {
        self.contains(frequency)
            .then(|| usize::from((frequency - self.min) / self.step))
    }

    /// Frequency addressed by `slot`, or `None` past the last slot.
    pub fn frequency_at(&self, slot: usize) -> Option<u16> {
        if slot >= self.slot_count() {
            return None;
        }
        // slot < slot_count so the product stays within max - min
        Some(self.min + self.step * slot as u16)
    }

    /// Reject frequencies outside the band before any device I/O.
    pub fn validate(&self, frequency: u16) -> ScannerResult<u16> {
        if self.contains(frequency) {
            Ok(frequency)
        } else {
            Err(ScannerError::Range {
                frequency,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Next probe frequency of the sweep.
    ///
    /// Advances by one step; anything that would pass `max` (or starts outside
    /// the band) wraps to `min`.
    pub fn next_scan_frequency(&self, frequency: u16) -> u16 {
        if !self.contains(frequency) {
            return self.min;
        }
        match frequency.checked_add(self.step) {
            Some(next) if next <= self.max => next,
            _ => self.min,
        }
    }
}
