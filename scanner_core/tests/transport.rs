//! Advance protocol and recovery behavior against recorded mock devices.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use scanner_core::mocks::{DriverAction, RecordingDriver, ScriptedSensor};
use scanner_core::motor::MotorController;
use scanner_core::sensor::FrameSensorGate;
use scanner_core::transport::{RecoveryCfg, Transport, TransportCfg};
use scanner_core::ScannerError;
use scanner_traits::{Clock, Direction, FrameSensor, HwResult, MonotonicClock};

fn test_transport_cfg() -> TransportCfg {
    TransportCfg {
        speed_rpm: 300.0,
        acceleration: 24.0,
        frame_period: Duration::from_millis(40),
        period_margin: 0.0,
    }
}

fn test_recovery_cfg(max_attempts: u32) -> RecoveryCfg {
    RecoveryCfg {
        max_attempts,
        nudge_speed_rpm: 1.0,
        nudge_acceleration: 1.0,
        nudge_timeout: Duration::from_millis(10),
        resettle: Duration::from_millis(2),
        backoff_start: Duration::from_millis(2),
    }
}

fn make_transport(
    sensor: ScriptedSensor,
    max_attempts: u32,
) -> (Transport, Arc<Mutex<Vec<DriverAction>>>) {
    let driver = RecordingDriver::new();
    let actions = driver.actions();
    let transport = Transport::new(
        MotorController::new(Box::new(driver)),
        FrameSensorGate::new(Box::new(sensor)),
        test_transport_cfg(),
        test_recovery_cfg(max_attempts),
        Arc::new(MonotonicClock::new()),
    );
    (transport, actions)
}

#[test]
fn clean_advance_enables_runs_and_disables() {
    let sensor = ScriptedSensor::new([Some(Duration::from_millis(5))]);
    let (mut transport, actions) = make_transport(sensor, 3);

    transport.advance().unwrap();

    let actions = actions.lock().unwrap();
    assert_eq!(actions.first(), Some(&DriverAction::Enabled(true)));
    assert_eq!(actions.last(), Some(&DriverAction::Enabled(false)));
    assert!(actions.contains(&DriverAction::Direction(Direction::Forward)));
    assert!(!actions.contains(&DriverAction::Direction(Direction::Reverse)));

    // One acceleration ramp, one mirrored deceleration ramp.
    let ramps: Vec<_> = actions
        .iter()
        .filter_map(|a| match a {
            DriverAction::Ramp(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(ramps.len(), 2);
    let accel = ramps[0];
    let decel = ramps[1];
    assert_eq!(accel.len(), 4);
    assert_eq!(accel[3].step_count, 10_000);
    assert_eq!(decel.len(), 3);
    assert_eq!(decel[0].frequency_hz, accel[2].frequency_hz);
}

#[test]
fn missed_frame_recovers_with_reverse_nudge() {
    // Advance 1 misses, the nudge consumes a subscription, advance 2 hits.
    let sensor = ScriptedSensor::new([None, None, Some(Duration::from_millis(5))]);
    let subs = sensor.subscription_count();
    let (mut transport, actions) = make_transport(sensor, 3);

    transport.advance().unwrap();

    assert_eq!(subs.load(std::sync::atomic::Ordering::SeqCst), 3);

    let actions = actions.lock().unwrap();
    assert!(actions.contains(&DriverAction::Direction(Direction::Reverse)));
    assert_eq!(actions.last(), Some(&DriverAction::Enabled(false)));

    // Reverse happens between the first timed-out forward pass and the
    // retried forward pass.
    let reverse_pos = actions
        .iter()
        .position(|a| *a == DriverAction::Direction(Direction::Reverse))
        .unwrap();
    let last_forward = actions
        .iter()
        .rposition(|a| *a == DriverAction::Direction(Direction::Forward))
        .unwrap();
    assert!(reverse_pos < last_forward);
}

#[test]
fn recovery_is_bounded() {
    // Never fires: initial try, then per attempt a nudge plus a retry.
    let sensor = ScriptedSensor::new([]);
    let subs = sensor.subscription_count();
    let (mut transport, actions) = make_transport(sensor, 2);

    let err = transport.advance().unwrap_err();
    assert!(matches!(err, ScannerError::RecoveryExhausted { attempts: 2 }));
    assert_eq!(subs.load(std::sync::atomic::Ordering::SeqCst), 5);
    assert_eq!(
        actions.lock().unwrap().last(),
        Some(&DriverAction::Enabled(false))
    );
}

#[test]
fn zero_attempts_disables_recovery() {
    let sensor = ScriptedSensor::new([]);
    let subs = sensor.subscription_count();
    let (mut transport, actions) = make_transport(sensor, 0);

    let err = transport.advance().unwrap_err();
    assert!(matches!(err, ScannerError::FrameTimeout));
    assert_eq!(subs.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(
        actions.lock().unwrap().last(),
        Some(&DriverAction::Enabled(false))
    );
}

/// Clock whose sleeps return immediately but are kept for inspection.
struct RecordingClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Clock for RecordingClock {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, d: Duration) {
        self.sleeps.lock().unwrap().push(d);
    }
}

fn make_backoff_transport(
    sensor: ScriptedSensor,
    max_attempts: u32,
    backoff_start: Duration,
) -> (Transport, Arc<Mutex<Vec<Duration>>>) {
    let sleeps = Arc::new(Mutex::new(Vec::new()));
    let mut recovery = test_recovery_cfg(max_attempts);
    recovery.backoff_start = backoff_start;
    let transport = Transport::new(
        MotorController::new(Box::new(RecordingDriver::new())),
        FrameSensorGate::new(Box::new(sensor)),
        test_transport_cfg(),
        recovery,
        Arc::new(RecordingClock {
            sleeps: Arc::clone(&sleeps),
        }),
    );
    (transport, sleeps)
}

#[test]
fn first_recovery_attempt_skips_the_backoff() {
    let backoff = Duration::from_millis(777);
    let sensor = ScriptedSensor::new([None, None, Some(Duration::from_millis(5))]);
    let (mut transport, sleeps) = make_backoff_transport(sensor, 3, backoff);

    transport.advance().unwrap();

    assert!(!sleeps.lock().unwrap().contains(&backoff));
}

#[test]
fn backoff_separates_renewed_attempts() {
    let backoff = Duration::from_millis(777);
    let sensor = ScriptedSensor::new([]);
    let (mut transport, sleeps) = make_backoff_transport(sensor, 2, backoff);

    let err = transport.advance().unwrap_err();
    assert!(matches!(err, ScannerError::RecoveryExhausted { attempts: 2 }));

    // One backoff between attempt 1 and attempt 2, none before the first.
    let backoffs = sleeps
        .lock()
        .unwrap()
        .iter()
        .filter(|d| **d == backoff)
        .count();
    assert_eq!(backoffs, 1);
}

/// Sensor handing its handler back to the test so edges can be injected.
struct ManualSensor {
    handler: Arc<Mutex<Option<Box<dyn FnMut() + Send>>>>,
}

impl FrameSensor for ManualSensor {
    fn subscribe(&mut self, handler: Box<dyn FnMut() + Send>) -> HwResult<()> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn unsubscribe(&mut self) -> HwResult<()> {
        *self.handler.lock().unwrap() = None;
        Ok(())
    }
}

#[test]
fn gate_latches_only_the_first_edge() {
    let handler = Arc::new(Mutex::new(None));
    let mut gate = FrameSensorGate::new(Box::new(ManualSensor {
        handler: Arc::clone(&handler),
    }));

    gate.arm().unwrap();
    {
        let mut slot = handler.lock().unwrap();
        let h = slot.as_mut().unwrap();
        h();
        h(); // bounce edge, must be swallowed
    }
    assert_eq!(
        gate.wait(Duration::from_millis(50)),
        scanner_core::AdvanceOutcome::Detected
    );
    // No second event latched.
    assert_eq!(
        gate.wait(Duration::from_millis(20)),
        scanner_core::AdvanceOutcome::TimedOut
    );
    gate.disarm().unwrap();
    assert!(handler.lock().unwrap().is_none());
}

#[test]
#[should_panic(expected = "cannot arm an armed frame sensor")]
fn arming_twice_is_a_programming_error() {
    let mut gate = FrameSensorGate::new(Box::new(ManualSensor {
        handler: Arc::new(Mutex::new(None)),
    }));
    gate.arm().unwrap();
    let _ = gate.arm();
}

#[test]
#[should_panic(expected = "cannot disarm a disarmed frame sensor")]
fn disarming_an_idle_gate_is_a_programming_error() {
    let mut gate = FrameSensorGate::new(Box::new(ManualSensor {
        handler: Arc::new(Mutex::new(None)),
    }));
    let _ = gate.disarm();
}

#[test]
#[should_panic(expected = "cannot wait on a disarmed frame sensor")]
fn waiting_on_an_idle_gate_is_a_programming_error() {
    let gate = FrameSensorGate::new(Box::new(ManualSensor {
        handler: Arc::new(Mutex::new(None)),
    }));
    let _ = gate.wait(Duration::from_millis(1));
}
