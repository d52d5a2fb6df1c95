//! Live view frame distribution.
//!
//! The feed holds only the most recent preview frame. Viewers block on a
//! one-slot notification channel and always read the latest frame when
//! woken, so a slow viewer skips frames instead of lagging behind. Viewers
//! that stop polling are pruned after an idle timeout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::debug;

struct ViewerSlot {
    tx: Sender<()>,
    last_access: Instant,
}

struct FeedState {
    current_frame: Option<Arc<Vec<u8>>>,
    viewers: HashMap<u64, ViewerSlot>,
    next_id: u64,
}

pub struct LiveViewFeed {
    state: Mutex<FeedState>,
    idle_timeout: Duration,
}

impl LiveViewFeed {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(FeedState {
                current_frame: None,
                viewers: HashMap::new(),
                next_id: 0,
            }),
            idle_timeout,
        }
    }

    /// Publish a new preview frame, waking current viewers and pruning idle
    /// ones.
    pub fn set_frame(&self, frame: Vec<u8>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.current_frame = Some(Arc::new(frame));

        let now = Instant::now();
        let idle = self.idle_timeout;
        state.viewers.retain(|id, slot| {
            if now.duration_since(slot.last_access) > idle {
                debug!(viewer = id, "pruning idle live view viewer");
                return false;
            }
            // Full just means this viewer has an unconsumed wakeup.
            let _ = slot.tx.try_send(());
            true
        });
    }

    pub fn viewer_count(&self) -> usize {
        self.state.lock().map(|s| s.viewers.len()).unwrap_or(0)
    }

    pub fn register(self: &Arc<Self>) -> LiveViewHandle {
        let (tx, rx) = bounded(1);
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = state.next_id;
        state.next_id += 1;
        state.viewers.insert(
            id,
            ViewerSlot {
                tx,
                last_access: Instant::now(),
            },
        );
        LiveViewHandle {
            feed: Arc::clone(self),
            rx,
            id,
        }
    }

    fn read_latest(&self, id: u64) -> Option<Arc<Vec<u8>>> {
        let mut state = self.state.lock().ok()?;
        if let Some(slot) = state.viewers.get_mut(&id) {
            slot.last_access = Instant::now();
        }
        state.current_frame.clone()
    }

    fn deregister(&self, id: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.viewers.remove(&id);
        }
    }
}

/// One registered viewer. Dropping the handle deregisters it immediately.
pub struct LiveViewHandle {
    feed: Arc<LiveViewFeed>,
    rx: Receiver<()>,
    id: u64,
}

impl LiveViewHandle {
    /// Wait for the next published frame. Returns the latest frame at wake
    /// time, or `None` if nothing arrives within `timeout`.
    pub fn next_frame(&self, timeout: Duration) -> Option<Arc<Vec<u8>>> {
        self.rx.recv_timeout(timeout).ok()?;
        self.feed.read_latest(self.id)
    }
}

impl Drop for LiveViewHandle {
    fn drop(&mut self) {
        self.feed.deregister(self.id);
    }
}
