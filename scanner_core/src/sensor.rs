//! Arm/disarm gating over the Hall-effect frame sensor.
//!
//! The raw sensor fires on every magnet pass; the gate latches only the
//! first edge after arming so stray edges from the departing magnet or
//! sensor bounce never count twice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, bounded};
use scanner_traits::FrameSensor;

use crate::error::Result;
use crate::hw_error::classify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Detected,
    TimedOut,
}

pub struct FrameSensorGate {
    sensor: Box<dyn FrameSensor + Send>,
    armed: Option<Receiver<()>>,
}

impl FrameSensorGate {
    pub fn new(sensor: Box<dyn FrameSensor + Send>) -> Self {
        Self {
            sensor,
            armed: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Start listening for the next frame edge.
    ///
    /// # Panics
    /// Panics when already armed; arming twice without a disarm is a
    /// sequencing bug in the caller.
    pub fn arm(&mut self) -> Result<()> {
        assert!(self.armed.is_none(), "cannot arm an armed frame sensor");
        let (tx, rx) = bounded::<()>(1);
        let latched = Arc::new(AtomicBool::new(false));
        self.sensor.subscribe(Box::new(move || {
            if !latched.swap(true, Ordering::SeqCst) {
                let _ = tx.try_send(());
            }
        }))
        .map_err(classify)?;
        self.armed = Some(rx);
        Ok(())
    }

    /// Block until the latched edge arrives or `timeout` elapses. The gate
    /// stays armed either way; callers disarm when the advance settles.
    ///
    /// # Panics
    /// Panics when not armed.
    pub fn wait(&self, timeout: Duration) -> AdvanceOutcome {
        let Some(rx) = self.armed.as_ref() else {
            panic!("cannot wait on a disarmed frame sensor");
        };
        match rx.recv_timeout(timeout) {
            Ok(()) => AdvanceOutcome::Detected,
            Err(_) => AdvanceOutcome::TimedOut,
        }
    }

    /// Stop listening and release the sensor registration.
    ///
    /// # Panics
    /// Panics when not armed.
    pub fn disarm(&mut self) -> Result<()> {
        assert!(self.armed.is_some(), "cannot disarm a disarmed frame sensor");
        self.sensor.unsubscribe().map_err(classify)?;
        self.armed = None;
        Ok(())
    }
}
