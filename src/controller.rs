//! Mode controller: the one place that decides which acquisition mode runs.
//!
//! The controller owns the active-mode state and forwards transitions to the
//! acquisition worker as commands, waiting for each to complete. Its methods
//! block; call them from plain threads (UI event handlers, the CLI), not from
//! inside an async runtime.
//!
//! # Example
//!
//! ```no_run
//! use rssi_scanner::config::ScannerConfig;
//! use rssi_scanner::controller::ModeController;
//! use rssi_scanner::transport::{DynTransport, MockDevice};
//!
//! # fn main() -> rssi_scanner::error::ScannerResult<()> {
//! let config = ScannerConfig::default();
//! let (mut controller, mut channels) =
//!     ModeController::connect(&config, || Ok(Box::new(MockDevice::new(5800)) as DynTransport))?;
//! controller.start_default_mode()?;
//! println!("{:?}", channels.state());
//! controller.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::acquisition::scheduler::{spawn_worker, WorkerStartup};
use crate::acquisition::{DisplayState, Mode, SchedulerSettings, WorkerCommand};
use crate::band::FrequencyBand;
use crate::channels::{create_channels, PresentationChannels, COMMAND_CHANNEL_CAPACITY};
use crate::config::ScannerConfig;
use crate::error::{ScannerError, ScannerResult};
use crate::transport::DynTransport;

/// Session handle: active mode plus the command side of the worker.
pub struct ModeController {
    commands: mpsc::Sender<WorkerCommand>,
    mode: Option<Mode>,
    band: FrequencyBand,
    jobs: Arc<AtomicUsize>,
    state_rx: watch::Receiver<DisplayState>,
    startup: WorkerStartup,
    worker: Option<JoinHandle<()>>,
}

impl ModeController {
    /// Open the device on a new worker thread.
    ///
    /// Blocks through the device settle time. A failure to open is fatal for
    /// the session and returned as [`ScannerError::DeviceOpen`]; nothing is
    /// left running in that case.
    pub fn connect<F>(config: &ScannerConfig, open: F) -> ScannerResult<(Self, PresentationChannels)>
    where
        F: FnOnce() -> ScannerResult<DynTransport> + Send + 'static,
    {
        let settings = config.scheduler_settings()?;
        let (channels, handle) = create_channels();
        let state_rx = handle.subscribe_state();
        let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let jobs = Arc::new(AtomicUsize::new(0));

        let (worker, startup) = spawn_worker(
            open,
            config.open_settings(),
            settings,
            handle,
            jobs.clone(),
            command_rx,
        )?;

        Ok((
            Self {
                commands,
                mode: None,
                band: settings.band,
                jobs,
                state_rx,
                startup,
                worker: Some(worker),
            },
            channels,
        ))
    }

    /// Mode currently scheduled.
    pub fn active_mode(&self) -> Option<Mode> {
        self.mode
    }

    /// Number of periodic jobs currently scheduled on the worker.
    pub fn scheduled_jobs(&self) -> usize {
        self.jobs.load(Ordering::SeqCst)
    }

    /// Frequency and API level read when the device was opened.
    pub fn startup(&self) -> WorkerStartup {
        self.startup
    }

    /// Latest display status.
    pub fn state(&self) -> DisplayState {
        self.state_rx.borrow().clone()
    }

    /// Band accepted by [`ModeController::set_frequency_manually`].
    pub fn band(&self) -> FrequencyBand {
        self.band
    }

    fn send(&self, command: WorkerCommand) -> ScannerResult<()> {
        self.commands
            .blocking_send(command)
            .map_err(|_| ScannerError::WorkerUnavailable)
    }

    fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> WorkerCommand) -> ScannerResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply))?;
        response
            .blocking_recv()
            .map_err(|_| ScannerError::WorkerUnavailable)
    }

    /// Start `mode`, replacing whatever runs now.
    pub fn start(&mut self, mode: Mode) -> ScannerResult<()> {
        self.request(|reply| WorkerCommand::Start { mode, reply })?;
        info!(%mode, previous = ?self.mode, "Mode started");
        self.mode = Some(mode);
        Ok(())
    }

    /// Start the default mode (scan). Used when a session resumes.
    pub fn start_default_mode(&mut self) -> ScannerResult<()> {
        self.start(Mode::default())
    }

    /// Switch to the other mode. With nothing running, starts the default.
    pub fn toggle_mode(&mut self) -> ScannerResult<Mode> {
        let next = self.mode.map_or(Mode::default(), Mode::other);
        self.start(next)?;
        Ok(next)
    }

    /// Stop acquisition. Returns the mode that was running.
    pub fn stop(&mut self) -> ScannerResult<Option<Mode>> {
        let stopped = self.request(|reply| WorkerCommand::Stop { reply })?;
        self.mode = None;
        Ok(stopped)
    }

    /// Apply a user-entered frequency.
    ///
    /// Returns `Ok(None)` without touching the device while scan mode drives
    /// the frequency. Otherwise validates the range (before any I/O), writes
    /// the frequency with read-back, and restarts signal acquisition with
    /// empty buffers. Returns the frequency the node confirmed.
    pub fn set_frequency_manually(&mut self, frequency: u16) -> ScannerResult<Option<u16>> {
        if self.mode == Some(Mode::Scan) {
            debug!(frequency, "Ignoring manual frequency while scanning");
            return Ok(None);
        }
        self.band.validate(frequency)?;
        let confirmed = self.request(|reply| WorkerCommand::SetFrequency { frequency, reply })??;
        Ok(Some(confirmed))
    }

    /// Stop acquisition and join the worker thread.
    pub fn shutdown(mut self) -> ScannerResult<()> {
        self.close()
    }

    fn close(&mut self) -> ScannerResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // a closed queue means the worker already exited
        let _ = self.commands.blocking_send(WorkerCommand::Shutdown);
        self.mode = None;
        worker.join().map_err(|_| ScannerError::WorkerUnavailable)
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
