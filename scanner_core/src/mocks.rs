//! Shipped test doubles for the hardware seams.
//!
//! These live in the library (not behind `cfg(test)`) so integration tests
//! and downstream consumers can drive the full engine without devices.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scanner_traits::{Camera, Direction, FrameSensor, FrameWriter, HwResult, Light, Notifier,
    RampSegment, StepDriver};

/// One recorded driver interaction, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverAction {
    Enabled(bool),
    Direction(Direction),
    Ramp(Vec<RampSegment>),
}

/// Step driver that records every call for later assertions.
#[derive(Default)]
pub struct RecordingDriver {
    actions: Arc<Mutex<Vec<DriverAction>>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded actions; stays valid after the driver
    /// is boxed and moved into the engine.
    pub fn actions(&self) -> Arc<Mutex<Vec<DriverAction>>> {
        Arc::clone(&self.actions)
    }

    fn record(&self, action: DriverAction) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }
}

impl StepDriver for RecordingDriver {
    fn set_enabled(&mut self, enabled: bool) -> HwResult<()> {
        self.record(DriverAction::Enabled(enabled));
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> HwResult<()> {
        self.record(DriverAction::Direction(direction));
        Ok(())
    }

    fn transmit(&mut self, ramp: &[RampSegment]) -> HwResult<()> {
        self.record(DriverAction::Ramp(ramp.to_vec()));
        Ok(())
    }
}

/// Frame sensor following a script: each subscription consumes the next
/// entry, `Some(delay)` fires the handler once after `delay`, `None` never
/// fires. An exhausted script never fires either.
pub struct ScriptedSensor {
    script: VecDeque<Option<Duration>>,
    subscriptions: Arc<AtomicU32>,
}

impl ScriptedSensor {
    pub fn new(script: impl IntoIterator<Item = Option<Duration>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            subscriptions: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Sensor that triggers quickly on every subscription.
    pub fn always(delay: Duration) -> Self {
        let mut sensor = Self::new([]);
        sensor.script = std::iter::repeat(Some(delay)).take(10_000).collect();
        sensor
    }

    pub fn subscription_count(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.subscriptions)
    }
}

impl FrameSensor for ScriptedSensor {
    fn subscribe(&mut self, mut handler: Box<dyn FnMut() + Send>) -> HwResult<()> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        if let Some(Some(delay)) = self.script.pop_front() {
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                handler();
            });
        }
        Ok(())
    }

    fn unsubscribe(&mut self) -> HwResult<()> {
        Ok(())
    }
}

/// Camera returning a counter as frame bytes.
#[derive(Default)]
pub struct CountingCamera {
    captures: Arc<AtomicU32>,
}

impl CountingCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captures(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.captures)
    }
}

impl Camera for CountingCamera {
    fn capture_frame(&mut self) -> HwResult<Vec<u8>> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(n.to_le_bytes().to_vec())
    }

    fn set_resolution(&mut self, _width: u32, _height: u32) -> HwResult<()> {
        Ok(())
    }
}

/// Frame writer keeping saves in memory, with an optional artificial delay
/// to simulate a slow disk.
pub struct MemoryWriter {
    delay: Duration,
    saved: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl MemoryWriter {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            saved: Mutex::new(Vec::new()),
        })
    }

    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saved
            .lock()
            .map(|s| s.iter().map(|(p, _)| p.clone()).collect())
            .unwrap_or_default()
    }
}

impl FrameWriter for MemoryWriter {
    fn save(&self, bytes: &[u8], path: &Path) -> HwResult<()> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.saved
            .lock()
            .map_err(|_| "writer poisoned")?
            .push((path.to_path_buf(), bytes.to_vec()));
        Ok(())
    }
}

/// Notifier recording every message.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, message: &str) -> HwResult<()> {
        self.messages
            .lock()
            .map_err(|_| "notifier poisoned")?
            .push(message.to_string());
        Ok(())
    }
}

/// Notifier that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn send(&self, _message: &str) -> HwResult<()> {
        Ok(())
    }
}

/// Light that tracks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLight;

impl Light for NullLight {
    fn set_on(&mut self, _on: bool) -> HwResult<()> {
        Ok(())
    }
}
