//! Frame advance protocol and bounded recovery.
//!
//! A single advance runs the motor forward at the transport speed, waits
//! out a quarter of the expected frame period so the departing magnet
//! clears the sensor, then arms the gate for the remaining three quarters.
//! The motor is stopped and de-energized on every exit path so a wedged
//! transport never keeps pulling film.

use std::sync::Arc;
use std::time::Duration;

use scanner_traits::{Clock, Direction};
use tracing::{debug, info, warn};

use crate::error::{Result, ScannerError};
use crate::motor::MotorController;
use crate::sensor::{AdvanceOutcome, FrameSensorGate};

#[derive(Debug, Clone, Copy)]
pub struct TransportCfg {
    /// Forward transport speed in rpm.
    pub speed_rpm: f64,
    /// Acceleration and deceleration in rpm per second.
    pub acceleration: f64,
    /// Nominal time for one frame to pass the sensor at `speed_rpm`.
    pub frame_period: Duration,
    /// Fractional safety margin on top of `frame_period`.
    pub period_margin: f64,
}

impl TransportCfg {
    /// Full detection window: nominal period plus margin.
    pub fn threshold(&self) -> Duration {
        self.frame_period.mul_f64(1.0 + self.period_margin)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryCfg {
    /// Recovery attempts per advance before giving up. Zero disables
    /// recovery entirely.
    pub max_attempts: u32,
    /// Reverse nudge speed in rpm.
    pub nudge_speed_rpm: f64,
    /// Acceleration for the nudge in rpm per second.
    pub nudge_acceleration: f64,
    /// Upper bound on the reverse nudge.
    pub nudge_timeout: Duration,
    /// Pause after the nudge so the film settles before retrying.
    pub resettle: Duration,
    /// Delay before the first recovery attempt; doubles per attempt.
    pub backoff_start: Duration,
}

pub struct Transport {
    motor: MotorController,
    gate: FrameSensorGate,
    cfg: TransportCfg,
    recovery: RecoveryCfg,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Transport {
    pub fn new(
        motor: MotorController,
        gate: FrameSensorGate,
        cfg: TransportCfg,
        recovery: RecoveryCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            motor,
            gate,
            cfg,
            recovery,
            clock,
        }
    }

    pub fn cfg(&self) -> &TransportCfg {
        &self.cfg
    }

    /// Run one forward advance attempt. Stops, disarms and de-energizes on
    /// every path, including device errors.
    pub fn advance_once(&mut self) -> Result<AdvanceOutcome> {
        self.motor.enable()?;
        let outcome = self.forward_pass();
        if self.gate.is_armed() {
            let _ = self.gate.disarm();
        }
        let stopped = self.motor.stop(self.cfg.acceleration);
        let disabled = self.motor.disable();
        let outcome = outcome?;
        stopped?;
        disabled?;
        debug!(?outcome, "advance attempt finished");
        Ok(outcome)
    }

    fn forward_pass(&mut self) -> Result<AdvanceOutcome> {
        let threshold = self.cfg.threshold();
        self.motor.set_direction(Direction::Forward)?;
        self.motor.start(self.cfg.speed_rpm, self.cfg.acceleration)?;
        // Let the departing magnet clear the sensor before arming.
        self.clock.sleep(threshold.mul_f64(0.25));
        self.gate.arm()?;
        Ok(self.gate.wait(threshold.mul_f64(0.75)))
    }

    /// Advance exactly one frame, running the bounded recovery sequence on
    /// timeouts.
    pub fn advance(&mut self) -> Result<()> {
        if self.advance_once()? == AdvanceOutcome::Detected {
            return Ok(());
        }
        if self.recovery.max_attempts == 0 {
            return Err(ScannerError::FrameTimeout);
        }

        let mut backoff = self.recovery.backoff_start;
        for attempt in 1..=self.recovery.max_attempts {
            warn!(attempt, "advance timed out, recovering");
            // The first recovery runs immediately; the backoff only
            // separates renewed attempts after a failed retry.
            if attempt > 1 {
                self.clock.sleep(backoff);
                backoff *= 2;
            }
            self.nudge_reverse()?;
            if self.advance_once()? == AdvanceOutcome::Detected {
                info!(attempt, "advance recovered");
                return Ok(());
            }
        }
        Err(ScannerError::RecoveryExhausted {
            attempts: self.recovery.max_attempts,
        })
    }

    /// Back the film off the jam, bounded by the nudge timeout, then let it
    /// resettle.
    fn nudge_reverse(&mut self) -> Result<()> {
        self.motor.enable()?;
        self.motor.set_direction(Direction::Reverse)?;
        self.motor.start(self.recovery.nudge_speed_rpm, self.recovery.nudge_acceleration)?;
        self.gate.arm()?;
        // An edge during the nudge just means the sprocket moved; either
        // way the nudge ends here.
        let _ = self.gate.wait(self.recovery.nudge_timeout);
        let disarmed = self.gate.disarm();
        let stopped = self.motor.stop(self.recovery.nudge_acceleration);
        let disabled = self.motor.disable();
        disarmed?;
        stopped?;
        disabled?;
        self.clock.sleep(self.recovery.resettle);
        Ok(())
    }
}
