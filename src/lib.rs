//! # RSSI Scanner Core Library
//!
//! Talks to an RSSI lap-timer node over a serial link: reads and sets its
//! tuned frequency and polls its lap statistics, either sweeping the band
//! (scan mode) or monitoring one frequency over time (signal mode).
//!
//! ## Crate Structure
//!
//! - **`protocol`**: Frame codec for the node's binary command/response
//!   protocol, opcode table and the lap statistics record.
//! - **`transport`**: The duplex byte stream the protocol runs over: a real
//!   serial port or the in-memory `MockDevice`.
//! - **`link`**: `DeviceLink`, one blocking request/response exchange at a
//!   time with timeout and round-trip timestamp compensation.
//! - **`band`**: The frequency band and sweep stepping.
//! - **`buffers`**: The frequency-indexed `FixedBuffer` and the rolling
//!   `CircularBuffer`.
//! - **`acquisition`**: Scan and signal routines and the worker that runs
//!   them periodically on a single background context.
//! - **`controller`**: `ModeController`, the single owner of the active mode.
//! - **`channels`**: Watch/mpsc hub through which results reach a
//!   presentation layer.
//! - **`config`**: Figment-based configuration (TOML + environment).
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: `ScannerError` and its transport/protocol sources.

pub mod acquisition;
pub mod band;
pub mod buffers;
pub mod channels;
pub mod config;
pub mod controller;
pub mod error;
pub mod link;
pub mod logging;
pub mod protocol;
pub mod transport;

pub use acquisition::Mode;
pub use controller::ModeController;
pub use error::{ScannerError, ScannerResult};
