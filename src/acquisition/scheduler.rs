//! Acquisition worker: one background context for all device access.
//!
//! The worker runs in a dedicated std::thread with its own current-thread
//! tokio runtime. That thread opens the device, lets it settle, reads the
//! initial frequency and then services [`WorkerCommand`]s. Each acquisition
//! mode runs as one periodic task; starting a mode always cancels the previous
//! task first, so at most one job is ever scheduled.
//!
//! Device exchanges run on the blocking pool behind [`SharedLink`]. A tick
//! awaits its exchange before the next tick can fire, and a cancelled job
//! abandons the in-flight exchange and drops its result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::scan::{ScanRoutine, DEFAULT_SCAN_PERIOD};
use super::signal::{SignalRoutine, DEFAULT_NUM_SAMPLES, DEFAULT_SIGNAL_PERIOD};
use super::{ensure_live, AcquisitionEvent, Mode, Routine, SeriesSnapshot};
use crate::band::FrequencyBand;
use crate::channels::WorkerHandle;
use crate::error::{ScannerError, ScannerResult};
use crate::link::{DeviceLink, DEFAULT_SET_ATTEMPTS, DEFAULT_TIMEOUT};
use crate::transport::DynTransport;

/// The device link shared between the worker and the blocking pool.
pub type SharedLink = Arc<Mutex<DeviceLink<DynTransport>>>;

/// Name of the worker thread.
pub const WORKER_THREAD_NAME: &str = "rssi-acquisition";

/// Device settle time after open.
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(2);

/// Periods and buffer sizes for both modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    /// Band swept in scan mode; also bounds manual frequency changes.
    pub band: FrequencyBand,
    /// Scan tick period.
    pub scan_period: Duration,
    /// Signal tick period.
    pub signal_period: Duration,
    /// Rolling buffer length in signal mode.
    pub num_samples: usize,
    /// Write/read-back rounds for a manual frequency change.
    pub set_attempts: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            band: FrequencyBand::default(),
            scan_period: DEFAULT_SCAN_PERIOD,
            signal_period: DEFAULT_SIGNAL_PERIOD,
            num_samples: DEFAULT_NUM_SAMPLES,
            set_attempts: DEFAULT_SET_ATTEMPTS,
        }
    }
}

/// Device open parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenSettings {
    /// Per-exchange timeout.
    pub timeout: Duration,
    /// Wait after open before the first exchange.
    pub settle: Duration,
    /// Query the firmware API level after settling.
    pub probe_api_level: bool,
}

impl Default for OpenSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            settle: DEFAULT_SETTLE_TIME,
            probe_api_level: false,
        }
    }
}

/// What the worker learned while opening the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStartup {
    /// Frequency read right after open, if the read succeeded.
    pub frequency: Option<u16>,
    /// Firmware API level, if probed and supported.
    pub api_level: Option<u8>,
}

/// Requests serviced by the worker, in order.
#[derive(Debug)]
pub enum WorkerCommand {
    /// Stop the current job (if any) and start `mode` with fresh buffers.
    Start {
        /// Mode to start.
        mode: Mode,
        /// Completion notice.
        reply: oneshot::Sender<()>,
    },
    /// Stop the current job.
    Stop {
        /// Mode that was stopped.
        reply: oneshot::Sender<Option<Mode>>,
    },
    /// Tune the node and restart the current job with fresh buffers.
    SetFrequency {
        /// Requested frequency (MHz).
        frequency: u16,
        /// Frequency confirmed by the node.
        reply: oneshot::Sender<ScannerResult<u16>>,
    },
    /// Stop everything and exit the worker loop.
    Shutdown,
}

/// Counts scheduled jobs; decrements when the job future is dropped.
struct JobGuard(Arc<AtomicUsize>);

impl JobGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ActiveJob {
    mode: Mode,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything a running job needs besides its routine.
struct JobContext {
    link: SharedLink,
    handle: WorkerHandle,
    cancel: CancellationToken,
    session_start: Instant,
}

impl JobContext {
    fn now_ms(&self) -> i64 {
        self.session_start.elapsed().as_millis() as i64
    }
}

/// Command loop owning the link and the single active job.
pub struct AcquisitionWorker {
    link: SharedLink,
    settings: SchedulerSettings,
    handle: WorkerHandle,
    session_start: Instant,
    jobs: Arc<AtomicUsize>,
    active: Option<ActiveJob>,
}

impl AcquisitionWorker {
    /// Create a worker over an opened link.
    ///
    /// `jobs` is incremented while a periodic job is scheduled.
    pub fn new(
        link: SharedLink,
        settings: SchedulerSettings,
        handle: WorkerHandle,
        jobs: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            link,
            settings,
            handle,
            session_start: Instant::now(),
            jobs,
            active: None,
        }
    }

    /// Mode of the scheduled job.
    pub fn active_mode(&self) -> Option<Mode> {
        self.active.as_ref().map(|job| job.mode)
    }

    /// Run the command loop until shutdown (call from a tokio runtime).
    pub async fn run(mut self, mut commands: mpsc::Receiver<WorkerCommand>) {
        info!("Acquisition worker starting");
        while let Some(command) = commands.recv().await {
            if !self.process_command(command).await {
                break;
            }
        }
        self.stop_job().await;
        self.handle.update_state(|state| state.mode = None);
        info!("Acquisition worker shutting down");
    }

    /// Process one command. Returns false if shutdown was requested.
    async fn process_command(&mut self, command: WorkerCommand) -> bool {
        match command {
            WorkerCommand::Start { mode, reply } => {
                self.start_job(mode).await;
                let _ = reply.send(());
            }
            WorkerCommand::Stop { reply } => {
                let stopped = self.stop_job().await;
                if stopped.is_some() {
                    self.announce_mode(None);
                }
                let _ = reply.send(stopped);
            }
            WorkerCommand::SetFrequency { frequency, reply } => {
                let result = self.set_frequency(frequency).await;
                let _ = reply.send(result);
            }
            WorkerCommand::Shutdown => return false,
        }
        true
    }

    fn announce_mode(&self, mode: Option<Mode>) {
        self.handle.update_state(|state| state.mode = mode);
        self.handle.send_event(AcquisitionEvent::ModeChanged { mode });
    }

    /// Replace whatever job is running with a fresh `mode` job.
    async fn start_job(&mut self, mode: Mode) {
        self.stop_job().await;
        let settings = self.settings;
        match mode {
            Mode::Scan => self.spawn(ScanRoutine::new(settings.band, settings.scan_period)),
            Mode::Signal => self.spawn(SignalRoutine::new(
                settings.signal_period,
                settings.num_samples,
            )),
        }
        self.announce_mode(Some(mode));
        info!(%mode, "Acquisition started");
    }

    fn spawn<R: Routine>(&mut self, routine: R) {
        let mode = routine.mode();
        self.handle.publish_series(routine.snapshot());

        let cancel = CancellationToken::new();
        let context = JobContext {
            link: self.link.clone(),
            handle: self.handle.clone(),
            cancel: cancel.clone(),
            session_start: self.session_start,
        };
        let guard = JobGuard::new(self.jobs.clone());
        let task = tokio::spawn(run_job(routine, context, guard));

        self.active = Some(ActiveJob { mode, cancel, task });
    }

    /// Cancel the active job and wait for its task to be dropped.
    async fn stop_job(&mut self) -> Option<Mode> {
        let job = self.active.take()?;
        job.cancel.cancel();
        job.task.abort();
        if let Err(e) = job.task.await {
            if !e.is_cancelled() {
                error!(mode = %job.mode, "Acquisition job panicked: {}", e);
            }
        }
        self.handle.publish_series(SeriesSnapshot::Empty);
        debug!(mode = %job.mode, "Acquisition job stopped");
        Some(job.mode)
    }

    /// Validated frequency change. Any running job restarts with empty buffers.
    async fn set_frequency(&mut self, frequency: u16) -> ScannerResult<u16> {
        self.settings.band.validate(frequency)?;

        let resume = self.stop_job().await;
        let link = self.link.clone();
        let attempts = self.settings.set_attempts;
        let result = tokio::task::spawn_blocking(move || {
            link.blocking_lock()
                .set_frequency_validated(frequency, attempts)
        })
        .await
        .map_err(|e| {
            error!("Frequency write task failed: {}", e);
            ScannerError::WorkerUnavailable
        })
        .and_then(|result| result);

        match &result {
            Ok(confirmed) => {
                let confirmed = *confirmed;
                info!(frequency = confirmed, "Frequency set");
                self.handle
                    .update_state(|state| state.frequency = Some(confirmed));
                self.handle
                    .send_event(AcquisitionEvent::FrequencyChanged {
                        frequency: confirmed,
                    });
            }
            Err(e) => {
                warn!(frequency, "Frequency change failed: {}", e);
                self.handle.report_error(resume, e.to_string());
            }
        }

        if let Some(mode) = resume {
            self.start_job(mode).await;
        }
        result
    }
}

/// Periodic loop for one routine.
///
/// The interval's first tick fires immediately. Missed ticks are delayed, not
/// bunched, and each tick awaits its exchange, so ticks never overlap.
async fn run_job<R: Routine>(mut routine: R, context: JobContext, _guard: JobGuard) {
    let mode = routine.mode();
    let mut ticker = tokio::time::interval(routine.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = context.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let params = routine.context();
        let link = context.link.clone();
        let now_ms = context.now_ms();
        let cancel = context.cancel.clone();
        let exchange = tokio::task::spawn_blocking(move || {
            let mut link = link.blocking_lock();
            // the job may have been stopped while this waited for the link
            ensure_live(&cancel)?;
            R::poll(params, &mut link, &cancel, now_ms)
        });

        let joined = tokio::select! {
            biased;
            _ = context.cancel.cancelled() => {
                debug!(%mode, "In-flight tick abandoned");
                break;
            }
            joined = exchange => joined,
        };
        if context.cancel.is_cancelled() {
            break;
        }

        match joined {
            Ok(Ok(reading)) => {
                let tick = routine.apply(reading, context.now_ms());
                context.handle.publish_series(routine.snapshot());
                context.handle.update_state(|state| {
                    if let Some(frequency) = tick.frequency {
                        state.frequency = Some(frequency);
                    }
                    state.ticks += 1;
                });
                context.handle.send_event(AcquisitionEvent::Tick {
                    mode,
                    frequency: tick.frequency,
                    delta: tick.delta,
                });
            }
            Ok(Err(e)) => {
                warn!(%mode, "Acquisition tick failed: {}", e);
                context.handle.report_error(Some(mode), e.to_string());
            }
            Err(e) => {
                error!(%mode, "Acquisition tick task failed: {}", e);
                context.handle.report_error(Some(mode), e.to_string());
            }
        }
    }
}

/// Open the device on the calling thread.
///
/// A failure to produce a transport is session-fatal and comes back as
/// [`ScannerError::DeviceOpen`]. Probe and initial-read failures are
/// reported and tolerated.
fn open_device<F>(
    open: F,
    settings: &OpenSettings,
    handle: &WorkerHandle,
) -> ScannerResult<(DeviceLink<DynTransport>, WorkerStartup)>
where
    F: FnOnce() -> ScannerResult<DynTransport>,
{
    let transport = open().map_err(|e| match e {
        ScannerError::DeviceOpen(_) => e,
        other => ScannerError::DeviceOpen(other.to_string()),
    })?;
    let mut link = DeviceLink::new(transport).with_timeout(settings.timeout);
    info!(device = %link.describe(), "Device opened");

    if !settings.settle.is_zero() {
        debug!(settle_ms = settings.settle.as_millis() as u64, "Waiting for device to settle");
        std::thread::sleep(settings.settle);
    }

    let api_level = if settings.probe_api_level {
        match link.read_api_level() {
            Ok(Some(level)) => {
                info!(api_level = level, "Node API level");
                Some(level)
            }
            Ok(None) => {
                warn!("Node does not report an API level");
                None
            }
            Err(e) => {
                warn!("API level probe failed: {}", e);
                None
            }
        }
    } else {
        None
    };

    let frequency = match link.read_frequency() {
        Ok(frequency) => {
            info!(frequency, "Initial frequency");
            Some(frequency)
        }
        Err(e) => {
            warn!("Initial frequency read failed: {}", e);
            handle.report_error(None, format!("Initial frequency read failed: {e}"));
            None
        }
    };

    handle.update_state(|state| {
        state.frequency = frequency;
        state.api_level = api_level;
    });
    Ok((link, WorkerStartup { frequency, api_level }))
}

/// Spawn the worker thread and wait for the device to open.
///
/// Blocks for the settle time. On success the thread keeps running until a
/// [`WorkerCommand::Shutdown`] arrives or `commands` closes.
pub fn spawn_worker<F>(
    open: F,
    open_settings: OpenSettings,
    settings: SchedulerSettings,
    handle: WorkerHandle,
    jobs: Arc<AtomicUsize>,
    commands: mpsc::Receiver<WorkerCommand>,
) -> ScannerResult<(std::thread::JoinHandle<()>, WorkerStartup)>
where
    F: FnOnce() -> ScannerResult<DynTransport> + Send + 'static,
{
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();

    let thread = std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create worker runtime: {}", e);
                    let _ = ready_tx.send(Err(ScannerError::WorkerUnavailable));
                    return;
                }
            };

            let (link, startup) = match open_device(open, &open_settings, &handle) {
                Ok(opened) => opened,
                Err(e) => {
                    error!("{}", e);
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(startup));

            let worker = AcquisitionWorker::new(Arc::new(Mutex::new(link)), settings, handle, jobs);
            runtime.block_on(worker.run(commands));
        })
        .map_err(|e| {
            error!("Failed to spawn worker thread: {}", e);
            ScannerError::WorkerUnavailable
        })?;

    match ready_rx.recv() {
        Ok(Ok(startup)) => Ok((thread, startup)),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => {
            let _ = thread.join();
            Err(ScannerError::WorkerUnavailable)
        }
    }
}
