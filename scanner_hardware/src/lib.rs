#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions)]
//! Device backends for the film scanner.
//!
//! Simulated devices are always available and good enough to run full scan
//! sessions without a transport attached. Real Raspberry Pi GPIO devices
//! live behind the `hardware` feature (Linux only, via `rppal`).

pub mod error;
pub mod pulse;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use scanner_traits::{Camera, Direction, FrameSensor, FrameWriter, HwResult, Light, Notifier,
    RampSegment, StepDriver};

use crate::error::HwError;

/// Simulated step driver: tracks enable/direction state and logs transmitted
/// ramps instead of pulsing a pin.
#[derive(Debug, Default)]
pub struct SimulatedStepDriver {
    enabled: bool,
    direction: Option<Direction>,
}

impl SimulatedStepDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StepDriver for SimulatedStepDriver {
    fn set_enabled(&mut self, enabled: bool) -> HwResult<()> {
        self.enabled = enabled;
        tracing::debug!(enabled, "simulated driver enable");
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> HwResult<()> {
        self.direction = Some(direction);
        tracing::debug!(?direction, "simulated driver direction");
        Ok(())
    }

    fn transmit(&mut self, ramp: &[RampSegment]) -> HwResult<()> {
        let steps: u32 = ramp.iter().map(|s| s.step_count).sum();
        tracing::debug!(segments = ramp.len(), steps, "simulated ramp transmitted");
        Ok(())
    }
}

/// Simulated frame sensor: fires the subscribed handler once per
/// subscription after a fixed delay, as if the sprocket magnet passed the
/// Hall sensor. `None` never triggers (simulates a jammed transport).
pub struct SimulatedFrameSensor {
    trigger_after: Option<Duration>,
}

impl SimulatedFrameSensor {
    pub fn new(trigger_after: Option<Duration>) -> Self {
        Self { trigger_after }
    }

    /// Sensor that triggers comfortably inside the advance window for the
    /// given frame period.
    pub fn for_frame_period(frame_period: Duration) -> Self {
        Self::new(Some(frame_period.mul_f64(0.25)))
    }
}

impl FrameSensor for SimulatedFrameSensor {
    fn subscribe(&mut self, mut handler: Box<dyn FnMut() + Send>) -> HwResult<()> {
        if let Some(delay) = self.trigger_after {
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

/// Simulated camera producing small deterministic frames with an embedded
/// frame counter.
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    counter: AtomicU32,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            width: 1024,
            height: 768,
            counter: AtomicU32::new(0),
        }
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for SimulatedCamera {
    fn capture_frame(&mut self) -> HwResult<Vec<u8>> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut bytes = Vec::with_capacity(1024);
        bytes.extend_from_slice(b"SIMFRAME");
        bytes.extend_from_slice(&n.to_le_bytes());
        bytes.extend_from_slice(&self.width.to_le_bytes());
        bytes.extend_from_slice(&self.height.to_le_bytes());
        bytes.resize(1024, 0x55);
        Ok(bytes)
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> HwResult<()> {
        self.width = width;
        self.height = height;
        Ok(())
    }
}

/// Simulated backlight.
#[derive(Debug, Default)]
pub struct SimulatedLight {
    on: bool,
}

impl SimulatedLight {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Light for SimulatedLight {
    fn set_on(&mut self, on: bool) -> HwResult<()> {
        self.on = on;
        tracing::debug!(on, "simulated light");
        Ok(())
    }
}

/// Frame writer persisting to the local filesystem.
///
/// Writes to a `.part` file and renames into place so an aborted save never
/// leaves a garbage frame under the final name.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFrameWriter;

impl FsFrameWriter {
    pub fn new() -> Self {
        Self
    }
}

impl FrameWriter for FsFrameWriter {
    fn save(&self, bytes: &[u8], path: &Path) -> HwResult<()> {
        let tmp = path.with_extension("part");
        std::fs::write(&tmp, bytes)
            .map_err(|e| HwError::Write(format!("{}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| HwError::Write(format!("{}: {e}", path.display())))?;
        Ok(())
    }
}

/// Notifier that reports through the process log instead of an external
/// channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &str) -> HwResult<()> {
        tracing::info!(message, "scanner notification");
        Ok(())
    }
}
