//! Bounded sample containers.
//!
//! - [`FixedBuffer`]: one slot per frequency of a band; scan mode
//! - [`CircularBuffer`]: most recent N samples, oldest first; signal mode
//!
//! Neither grows: the fixed buffer's size is set by its band and the ring
//! overwrites its oldest element once full.

pub mod circular;
pub mod fixed;

pub use circular::CircularBuffer;
pub use fixed::FixedBuffer;

/// Time-domain sample: `(x = ms, y = rssi)`.
pub type TimedSample = (i64, i32);
