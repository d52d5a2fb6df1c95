#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the film scanner.
//!
//! `Config` and its sections are deserialized from TOML and validated.
//! Timing defaults come from the calibrated reference hardware; every value
//! can be overridden, which also lets tests run with millisecond-scale
//! periods.

use serde::Deserialize;

/// GPIO pin assignments (Broadcom numbering).
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    pub motor_enable: u8,
    pub motor_direction: u8,
    pub motor_step: u8,
    pub sensor_input: u8,
    pub light_switch: u8,
}

impl Default for Pins {
    fn default() -> Self {
        // Reference machine wiring.
        Self {
            motor_enable: 16,
            motor_direction: 21,
            motor_step: 20,
            sensor_input: 26,
            light_switch: 6,
        }
    }
}

/// Transport motion parameters for a single-frame advance.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Transport {
    /// Target advance speed in RPM.
    pub speed_rpm: f64,
    /// Acceleration/deceleration used for the advance ramps, in RPM per second.
    pub acceleration_rpm_per_s: f64,
    /// Calibrated nominal time for one frame advance, in seconds.
    pub frame_period_s: f64,
    /// Safety margin added to the frame period for the trigger window
    /// (0.025 = 2.5%).
    pub period_margin: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            speed_rpm: 300.0,
            acceleration_rpm_per_s: 24.0,
            frame_period_s: 0.487,
            period_margin: 0.025,
        }
    }
}

/// Recovery maneuver parameters for a missed frame trigger.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Recovery {
    /// Maximum recovery attempts before the advance fails for good.
    /// 0 disables recovery entirely.
    pub max_attempts: u32,
    /// Speed of the reverse re-seating nudge in RPM.
    pub nudge_speed_rpm: f64,
    /// Acceleration of the nudge ramp in RPM per second.
    pub nudge_acceleration_rpm_per_s: f64,
    /// How long the nudge waits for a trigger, in milliseconds.
    pub nudge_timeout_ms: u64,
    /// Pause after restoring forward direction, in milliseconds.
    pub resettle_ms: u64,
    /// Initial backoff after a failed retry, in milliseconds; doubles per
    /// attempt.
    pub backoff_start_ms: u64,
}

impl Default for Recovery {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            nudge_speed_rpm: 1.0,
            nudge_acceleration_rpm_per_s: 1.0,
            nudge_timeout_ms: 1000,
            resettle_ms: 1000,
            backoff_start_ms: 1000,
        }
    }
}

/// Scan session parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Scan {
    /// Inter-frame settle delay letting mechanical vibration die down, in
    /// milliseconds.
    pub settle_ms: u64,
    /// Delay between session start and the first frame, in milliseconds.
    pub lead_in_ms: u64,
    /// File extension for saved frames.
    pub frame_extension: String,
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            settle_ms: 200,
            lead_in_ms: 5000,
            frame_extension: "dng".to_string(),
        }
    }
}

/// Live preview feed parameters.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct LiveView {
    /// Viewers idle longer than this are pruned, in seconds.
    pub viewer_idle_timeout_s: u64,
    /// Pause between preview captures, in milliseconds.
    pub frame_interval_ms: u64,
}

impl Default for LiveView {
    fn default() -> Self {
        Self {
            viewer_idle_timeout_s: 30,
            frame_interval_ms: 33,
        }
    }
}

/// Capture resolution applied at startup.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CameraCfg {
    pub width: u32,
    pub height: u32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub transport: Transport,
    pub recovery: Recovery,
    pub scan: Scan,
    pub live_view: LiveView,
    pub camera: CameraCfg,
    pub logging: Logging,
}

impl Config {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> eyre::Result<()> {
        if !(self.transport.speed_rpm > 0.0) {
            eyre::bail!("transport.speed_rpm must be positive");
        }
        if !(self.transport.acceleration_rpm_per_s > 0.0) {
            eyre::bail!("transport.acceleration_rpm_per_s must be positive");
        }
        if !(self.transport.frame_period_s > 0.0) {
            eyre::bail!("transport.frame_period_s must be positive");
        }
        if !(0.0..=1.0).contains(&self.transport.period_margin) {
            eyre::bail!("transport.period_margin must be within [0, 1]");
        }
        if !(self.recovery.nudge_speed_rpm > 0.0) {
            eyre::bail!("recovery.nudge_speed_rpm must be positive");
        }
        if !(self.recovery.nudge_acceleration_rpm_per_s > 0.0) {
            eyre::bail!("recovery.nudge_acceleration_rpm_per_s must be positive");
        }
        if self.recovery.max_attempts > 0 && self.recovery.backoff_start_ms == 0 {
            eyre::bail!("recovery.backoff_start_ms must be positive when recovery is enabled");
        }
        if self.scan.frame_extension.is_empty()
            || self.scan.frame_extension.contains(std::path::MAIN_SEPARATOR)
        {
            eyre::bail!("scan.frame_extension must be a bare extension");
        }
        if self.live_view.frame_interval_ms == 0 {
            eyre::bail!("live_view.frame_interval_ms must be positive");
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            eyre::bail!("camera resolution must be non-zero");
        }
        Ok(())
    }
}

/// Load and validate a config file.
pub fn load_config(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read config {}: {e}", path.display()))?;
    let cfg: Config =
        toml::from_str(&text).map_err(|e| eyre::eyre!("failed to parse config: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}
