pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::path::Path;

/// Boxed error type used at every hardware trait boundary. Implementations
/// choose their own concrete error types; the core maps them to typed errors.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Rotation direction of the transport stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// One level of a stepper speed ramp: hold `frequency_hz` for `step_count`
/// pulses before moving to the next level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampSegment {
    pub frequency_hz: f64,
    pub step_count: u32,
}

impl RampSegment {
    /// Half-period of the square wave for this segment, in microseconds.
    /// A full step pulse is one on-phase plus one off-phase of this width.
    #[inline]
    pub fn half_period_us(&self) -> u64 {
        (500_000.0 / self.frequency_hz) as u64
    }
}

/// Step/direction/enable driver for the transport stepper motor.
///
/// `transmit` renders the ramp into a pulse program, hands it to the step
/// output and returns without waiting for the motion to finish; a new ramp
/// or `set_enabled(false)` supersedes a running one. The driver does not
/// retain the ramp after transmission.
pub trait StepDriver {
    fn set_enabled(&mut self, enabled: bool) -> HwResult<()>;
    fn set_direction(&mut self, direction: Direction) -> HwResult<()>;
    fn transmit(&mut self, ramp: &[RampSegment]) -> HwResult<()>;
}

/// Rising-edge frame sensor input (Hall-effect sensor in the reference
/// hardware).
///
/// The handler runs on the sensor's interrupt context and must only signal
/// (no blocking, no long work); the subscription stays active until
/// `unsubscribe` is called.
pub trait FrameSensor {
    fn subscribe(&mut self, handler: Box<dyn FnMut() + Send>) -> HwResult<()>;
    fn unsubscribe(&mut self) -> HwResult<()>;
}

/// Frame capture collaborator. Returns opaque encoded image bytes; exposure
/// and gain are configured outside the engine.
pub trait Camera {
    fn capture_frame(&mut self) -> HwResult<Vec<u8>>;
    fn set_resolution(&mut self, width: u32, height: u32) -> HwResult<()>;
}

/// Backlight behind the film gate.
pub trait Light {
    fn set_on(&mut self, on: bool) -> HwResult<()>;
}

/// Persistence collaborator invoked by the save-pipeline worker. A save
/// failure is fatal to the running scan session.
pub trait FrameWriter: Send + Sync {
    fn save(&self, bytes: &[u8], path: &Path) -> HwResult<()>;
}

/// Notification collaborator, invoked on scan completion and on
/// unrecoverable advance failure. Delivery is the implementation's concern.
pub trait Notifier: Send + Sync {
    fn send(&self, message: &str) -> HwResult<()>;
}
