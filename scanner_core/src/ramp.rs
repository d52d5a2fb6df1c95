//! Pulse ramp generation for the transport stepper.
//!
//! The driver only produces clean waveforms at a fixed ladder of pulse
//! frequencies, so a ramp is a staircase: every supported frequency below
//! the target for a few steps each, then the target held for the requested
//! stay. Deceleration is the same staircase reversed.

use scanner_traits::RampSegment;

/// Full steps per motor revolution.
pub const STEPS_PER_REVOLUTION: f64 = 200.0;

/// Pulse frequencies the driver can hold cleanly, ascending.
pub const SUPPORTED_FREQUENCIES_HZ: [f64; 6] = [320.0, 500.0, 800.0, 1000.0, 1600.0, 2000.0];

/// Convert a shaft speed in rpm to the step pulse frequency in Hz.
pub fn rpm_to_hz(rpm: f64) -> f64 {
    STEPS_PER_REVOLUTION * rpm / 60.0
}

/// Build the acceleration staircase towards `speed_rpm`, holding the top
/// frequency for `stay_steps` steps.
///
/// Each intermediate level lasts `floor(frequency / |acceleration|)` steps.
/// Targets below the lowest supported frequency creep at that lowest
/// frequency instead.
pub fn make_ramp(speed_rpm: f64, acceleration: f64, stay_steps: u32) -> Vec<RampSegment> {
    let target_hz = rpm_to_hz(speed_rpm);
    let accel = acceleration.abs();

    let mut levels: Vec<f64> = SUPPORTED_FREQUENCIES_HZ
        .iter()
        .copied()
        .filter(|f| *f <= target_hz)
        .collect();
    if levels.is_empty() {
        levels.push(SUPPORTED_FREQUENCIES_HZ[0]);
    }

    let stay_hz = levels[levels.len() - 1];
    let climb = &levels[..levels.len() - 1];

    let mut ramp: Vec<RampSegment> = climb
        .iter()
        .map(|&frequency_hz| RampSegment {
            frequency_hz,
            step_count: (frequency_hz / accel) as u32,
        })
        .collect();
    if stay_steps > 0 {
        ramp.push(RampSegment {
            frequency_hz: stay_hz,
            step_count: stay_steps,
        });
    } else if ramp.is_empty() {
        // A single-level staircase with no stay still needs one segment;
        // stopping the low-speed creep must move through the same level.
        ramp.push(RampSegment {
            frequency_hz: stay_hz,
            step_count: (stay_hz / accel) as u32,
        });
    }
    ramp
}

/// Build the deceleration staircase from `speed_rpm` down to standstill.
pub fn make_decel_ramp(speed_rpm: f64, deceleration: f64) -> Vec<RampSegment> {
    let mut ramp = make_ramp(speed_rpm, deceleration, 0);
    ramp.reverse();
    ramp
}
