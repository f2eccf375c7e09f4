//! Frequency-indexed buffer.

use crate::band::FrequencyBand;
use crate::error::{ScannerError, ScannerResult};

/// One value per slot of a [`FrequencyBand`].
///
/// A frequency addresses slot `(frequency - band.min) / band.step`. Every
/// in-band frequency maps to exactly one slot; anything outside the band is
/// rejected with [`ScannerError::Range`] rather than wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedBuffer<T> {
    band: FrequencyBand,
    slots: Vec<T>,
}

impl<T: Clone + Default> FixedBuffer<T> {
    /// Allocate `band.slot_count()` default-valued slots.
    pub fn new(band: FrequencyBand) -> Self {
        Self {
            band,
            slots: vec![T::default(); band.slot_count()],
        }
    }

    /// Value stored for `frequency`, cloned.
    pub fn at(&self, frequency: u16) -> Option<T> {
        self.get(frequency).cloned()
    }
}

impl<T> FixedBuffer<T> {
    /// Number of addressable slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: a band has at least one slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Band this buffer is indexed by.
    pub fn band(&self) -> FrequencyBand {
        self.band
    }

    fn slot(&self, frequency: u16) -> ScannerResult<usize> {
        self.band.slot_of(frequency).ok_or(ScannerError::Range {
            frequency,
            min: self.band.min,
            max: self.band.max,
        })
    }

    /// Store `value` in the slot for `frequency`.
    pub fn set(&mut self, frequency: u16, value: T) -> ScannerResult<()> {
        let slot = self.slot(frequency)?;
        self.slots[slot] = value;
        Ok(())
    }

    /// Borrow the value for `frequency`; `None` outside the band.
    pub fn get(&self, frequency: u16) -> Option<&T> {
        self.band.slot_of(frequency).map(|slot| &self.slots[slot])
    }

    /// Mutably borrow the value for `frequency`.
    pub fn get_mut(&mut self, frequency: u16) -> ScannerResult<&mut T> {
        let slot = self.slot(frequency)?;
        Ok(&mut self.slots[slot])
    }

    /// `(slot frequency, value)` pairs in ascending frequency order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &T)> + '_ {
        let band = self.band;
        self.slots
            .iter()
            .enumerate()
            .map(move |(slot, value)| (band.min + band.step * slot as u16, value))
    }
}
