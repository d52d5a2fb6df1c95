//! Observer plumbing for scanner lifecycle events.
//!
//! Callbacks implement [`ScannerCallback`] and override only the hooks they
//! care about. The scanner fans every event out through a [`CallbackList`];
//! a misbehaving callback can slow the scan loop, so push-style consumers
//! should go through [`StateBroadcaster`], which never blocks and drops
//! subscribers that stop draining their queue.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::debug;

/// How the queue of a broadcast subscriber may back up before the
/// subscriber is dropped.
const SUBSCRIBER_QUEUE_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackEvent {
    AdvanceStart,
    AdvanceEnd,
    ScanStart,
    ScanEnd,
    FrameCaptured,
    LightOn,
    LightOff,
    ZoomIn,
    ZoomOut,
    FastForwardStart,
    FastForwardEnd,
}

/// Terminal outcome of the most recent scan session.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEndInfo {
    Completed { frames: u32 },
    Stopped { frames: u32 },
    Failed { frame_index: u32, message: String },
}

/// Snapshot of the externally visible scanner state, taken at event time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannerState {
    pub is_scanning: bool,
    pub is_advancing: bool,
    pub is_fast_forwarding: bool,
    pub is_light_on: bool,
    pub is_zoomed: bool,
    pub current_frame_index: u32,
    pub n_frames: u32,
    pub output_directory: Option<PathBuf>,
    /// Rolling estimate of scan time left, in seconds.
    pub time_remaining_secs: Option<f64>,
    pub last_scan_end: Option<ScanEndInfo>,
}

pub trait ScannerCallback: Send + Sync {
    fn on_advance_start(&self, _state: &ScannerState) {}
    fn on_advance_end(&self, _state: &ScannerState) {}
    fn on_scan_start(&self, _state: &ScannerState) {}
    fn on_scan_end(&self, _state: &ScannerState) {}
    fn on_frame_captured(&self, _state: &ScannerState) {}
    fn on_light_on(&self, _state: &ScannerState) {}
    fn on_light_off(&self, _state: &ScannerState) {}
    fn on_zoom_in(&self, _state: &ScannerState) {}
    fn on_zoom_out(&self, _state: &ScannerState) {}
    fn on_fast_forward_start(&self, _state: &ScannerState) {}
    fn on_fast_forward_end(&self, _state: &ScannerState) {}

    /// Dispatch an event to the matching hook. Override to intercept every
    /// event uniformly.
    fn notify(&self, event: &CallbackEvent, state: &ScannerState) {
        match event {
            CallbackEvent::AdvanceStart => self.on_advance_start(state),
            CallbackEvent::AdvanceEnd => self.on_advance_end(state),
            CallbackEvent::ScanStart => self.on_scan_start(state),
            CallbackEvent::ScanEnd => self.on_scan_end(state),
            CallbackEvent::FrameCaptured => self.on_frame_captured(state),
            CallbackEvent::LightOn => self.on_light_on(state),
            CallbackEvent::LightOff => self.on_light_off(state),
            CallbackEvent::ZoomIn => self.on_zoom_in(state),
            CallbackEvent::ZoomOut => self.on_zoom_out(state),
            CallbackEvent::FastForwardStart => self.on_fast_forward_start(state),
            CallbackEvent::FastForwardEnd => self.on_fast_forward_end(state),
        }
    }
}

/// Ordered fan-out over registered callbacks.
#[derive(Default)]
pub struct CallbackList {
    callbacks: Vec<Arc<dyn ScannerCallback>>,
}

impl CallbackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, callback: Arc<dyn ScannerCallback>) {
        self.callbacks.push(callback);
    }

    pub fn notify(&self, event: &CallbackEvent, state: &ScannerState) {
        for callback in &self.callbacks {
            callback.notify(event, state);
        }
    }
}

/// One event pushed to a broadcast subscriber.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    pub event: CallbackEvent,
    pub state: ScannerState,
}

/// Non-blocking push distribution of state updates.
///
/// Each subscriber gets a bounded queue. A subscriber whose queue is full
/// is dropped on the next push rather than ever stalling the scan loop.
#[derive(Default)]
pub struct StateBroadcaster {
    subscribers: Mutex<Vec<Sender<StateUpdate>>>,
}

impl StateBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<StateUpdate> {
        let (tx, rx) = bounded(SUBSCRIBER_QUEUE_DEPTH);
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn push(&self, update: StateUpdate) {
        let Ok(mut subs) = self.subscribers.lock() else {
            return;
        };
        subs.retain(|tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("dropping stalled state subscriber");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl ScannerCallback for StateBroadcaster {
    fn notify(&self, event: &CallbackEvent, state: &ScannerState) {
        self.push(StateUpdate {
            event: *event,
            state: state.clone(),
        });
    }
}
