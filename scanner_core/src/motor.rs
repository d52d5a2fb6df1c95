//! Transport motor control on top of a [`StepDriver`].

use scanner_traits::{Direction, StepDriver};
use tracing::debug;

use crate::error::Result;
use crate::hw_error::classify;
use crate::ramp::{make_decel_ramp, make_ramp};

/// Steps to hold the target speed per `start` call. Long enough to carry a
/// frame past the sensor; `stop` cuts it short.
pub const STAY_STEPS: u32 = 10_000;

/// Owns the step driver and tracks the commanded speed so deceleration
/// mirrors the last acceleration.
pub struct MotorController {
    driver: Box<dyn StepDriver + Send>,
    enabled: bool,
    current_speed_rpm: f64,
}

impl MotorController {
    pub fn new(driver: Box<dyn StepDriver + Send>) -> Self {
        Self {
            driver,
            enabled: false,
            current_speed_rpm: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_speed_rpm(&self) -> f64 {
        self.current_speed_rpm
    }

    pub fn enable(&mut self) -> Result<()> {
        self.driver.set_enabled(true).map_err(classify)?;
        self.enabled = true;
        Ok(())
    }

    /// Cuts holding torque. The driver stops pulsing regardless of any
    /// ramp still queued.
    pub fn disable(&mut self) -> Result<()> {
        self.driver.set_enabled(false).map_err(classify)?;
        self.enabled = false;
        self.current_speed_rpm = 0.0;
        Ok(())
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<()> {
        self.driver.set_direction(direction).map_err(classify)
    }

    /// Accelerate to `speed_rpm` and keep running there.
    ///
    /// # Panics
    /// Panics if the motor is not enabled; starting a disabled motor is a
    /// programming error, not a runtime condition.
    pub fn start(&mut self, speed_rpm: f64, acceleration: f64) -> Result<()> {
        assert!(self.enabled, "cannot start a disabled motor");
        let ramp = make_ramp(speed_rpm, acceleration, STAY_STEPS);
        debug!(speed_rpm, acceleration, segments = ramp.len(), "motor start");
        self.driver.transmit(&ramp).map_err(classify)?;
        self.current_speed_rpm = speed_rpm;
        Ok(())
    }

    /// Decelerate from the current speed to standstill. No-op when already
    /// stopped.
    pub fn stop(&mut self, deceleration: f64) -> Result<()> {
        if self.current_speed_rpm == 0.0 {
            return Ok(());
        }
        let ramp = make_decel_ramp(self.current_speed_rpm, deceleration);
        debug!(from_rpm = self.current_speed_rpm, "motor stop");
        self.driver.transmit(&ramp).map_err(classify)?;
        self.current_speed_rpm = 0.0;
        Ok(())
    }
}
