//! Channel hub between the acquisition worker and the presentation layer.
//!
//! - `watch` channels for latest-only state (display status, buffer snapshot)
//! - Bounded `mpsc` for the per-tick event stream
//! - Non-blocking `try_send` with drop-on-full so a slow consumer never stalls
//!   acquisition
//!
//! Marshalling onto a UI thread is the consumer's business; every method here
//! is non-blocking and callable from any thread.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::acquisition::{AcquisitionEvent, DisplayState, Mode, SeriesSnapshot};

/// Capacity of the per-tick event stream.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
/// Capacity of the controller-to-worker command queue.
pub const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Receivers held by the presentation layer.
pub struct PresentationChannels {
    /// Latest display status (watch = always latest, no backlog)
    pub state_rx: watch::Receiver<DisplayState>,
    /// Latest buffer contents of the active mode
    pub series_rx: watch::Receiver<Arc<SeriesSnapshot>>,
    /// Tick deltas and error messages (bounded mpsc)
    pub event_rx: mpsc::Receiver<AcquisitionEvent>,
}

/// Senders held by the acquisition worker and its jobs.
#[derive(Clone)]
pub struct WorkerHandle {
    /// Display status updates
    pub state_tx: watch::Sender<DisplayState>,
    /// Buffer snapshot replacement
    pub series_tx: watch::Sender<Arc<SeriesSnapshot>>,
    /// Per-tick events
    pub event_tx: mpsc::Sender<AcquisitionEvent>,
}

/// Create a new pair of presentation and worker handles.
pub fn create_channels() -> (PresentationChannels, WorkerHandle) {
    let (state_tx, state_rx) = watch::channel(DisplayState::default());
    let (series_tx, series_rx) = watch::channel(Arc::new(SeriesSnapshot::Empty));
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    (
        PresentationChannels {
            state_rx,
            series_rx,
            event_rx,
        },
        WorkerHandle {
            state_tx,
            series_tx,
            event_tx,
        },
    )
}

impl PresentationChannels {
    /// Latest display status (non-blocking).
    pub fn state(&mut self) -> DisplayState {
        self.state_rx.borrow_and_update().clone()
    }

    /// Latest buffer snapshot (non-blocking). Cheap: clones the `Arc`.
    pub fn series(&mut self) -> Arc<SeriesSnapshot> {
        self.series_rx.borrow_and_update().clone()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv_event(&mut self) -> Option<AcquisitionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Drain all available events (non-blocking).
    pub fn drain_events(&mut self) -> Vec<AcquisitionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl WorkerHandle {
    /// Modify the display status in place.
    ///
    /// Applies even when no receiver is left, so the value stays current for
    /// receivers subscribed later.
    pub fn update_state(&self, modify: impl FnOnce(&mut DisplayState)) {
        self.state_tx.send_modify(modify);
    }

    /// Replace the published buffer snapshot.
    pub fn publish_series(&self, snapshot: SeriesSnapshot) {
        self.series_tx.send_replace(Arc::new(snapshot));
    }

    /// Send an event (non-blocking, drops if full).
    pub fn send_event(&self, event: AcquisitionEvent) -> bool {
        match self.event_tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(e)) => {
                warn!(event = ?e, "Event channel full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event channel closed");
                false
            }
        }
    }

    /// Record an error: replaces the displayed message and emits an event.
    pub fn report_error(&self, mode: Option<Mode>, message: String) {
        self.update_state(|state| state.last_error = Some(message.clone()));
        self.send_event(AcquisitionEvent::Error { mode, message });
    }

    /// Subscribe an additional display status receiver.
    pub fn subscribe_state(&self) -> watch::Receiver<DisplayState> {
        self.state_tx.subscribe()
    }
}
