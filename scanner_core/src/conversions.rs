//! Conversions from the TOML config schemas to the engine's runtime
//! parameter structs.

use std::time::Duration;

use crate::scanner::{LiveViewCfg, ScanCfg};
use crate::transport::{RecoveryCfg, TransportCfg};

impl From<&scanner_config::Transport> for TransportCfg {
    fn from(cfg: &scanner_config::Transport) -> Self {
        Self {
            speed_rpm: cfg.speed_rpm,
            acceleration: cfg.acceleration_rpm_per_s,
            frame_period: Duration::from_secs_f64(cfg.frame_period_s),
            period_margin: cfg.period_margin,
        }
    }
}

impl From<&scanner_config::Recovery> for RecoveryCfg {
    fn from(cfg: &scanner_config::Recovery) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            nudge_speed_rpm: cfg.nudge_speed_rpm,
            nudge_acceleration: cfg.nudge_acceleration_rpm_per_s,
            nudge_timeout: Duration::from_millis(cfg.nudge_timeout_ms),
            resettle: Duration::from_millis(cfg.resettle_ms),
            backoff_start: Duration::from_millis(cfg.backoff_start_ms),
        }
    }
}

impl From<&scanner_config::Scan> for ScanCfg {
    fn from(cfg: &scanner_config::Scan) -> Self {
        Self {
            settle: Duration::from_millis(cfg.settle_ms),
            lead_in: Duration::from_millis(cfg.lead_in_ms),
            frame_extension: cfg.frame_extension.clone(),
        }
    }
}

impl From<&scanner_config::LiveView> for LiveViewCfg {
    fn from(cfg: &scanner_config::LiveView) -> Self {
        Self {
            idle_timeout: Duration::from_secs(cfg.viewer_idle_timeout_s),
            frame_interval: Duration::from_millis(cfg.frame_interval_ms),
        }
    }
}
