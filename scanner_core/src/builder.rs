//! Runtime assembly of a [`Scanner`] from device implementations and
//! configuration.

use std::sync::Arc;

use scanner_traits::{Camera, Clock, FrameSensor, FrameWriter, Light, MonotonicClock, Notifier,
    StepDriver};
use thiserror::Error;

use crate::events::{CallbackList, ScannerCallback};
use crate::mocks::{NullLight, NullNotifier};
use crate::motor::MotorController;
use crate::scanner::{LiveViewCfg, ScanCfg, Scanner};
use crate::sensor::FrameSensorGate;
use crate::transport::{RecoveryCfg, Transport, TransportCfg};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no step driver provided")]
    MissingDriver,
    #[error("no frame sensor provided")]
    MissingSensor,
    #[error("no camera provided")]
    MissingCamera,
    #[error("no frame writer provided")]
    MissingWriter,
}

pub struct ScannerBuilder {
    driver: Option<Box<dyn StepDriver + Send>>,
    sensor: Option<Box<dyn FrameSensor + Send>>,
    camera: Option<Box<dyn Camera + Send>>,
    writer: Option<Arc<dyn FrameWriter>>,
    light: Box<dyn Light + Send>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock + Send + Sync>,
    callbacks: CallbackList,
    transport_cfg: TransportCfg,
    recovery_cfg: RecoveryCfg,
    scan_cfg: ScanCfg,
    liveview_cfg: LiveViewCfg,
}

impl Default for ScannerBuilder {
    fn default() -> Self {
        let defaults = scanner_config::Config::default();
        Self {
            driver: None,
            sensor: None,
            camera: None,
            writer: None,
            light: Box::new(NullLight),
            notifier: Arc::new(NullNotifier),
            clock: Arc::new(MonotonicClock::new()),
            callbacks: CallbackList::new(),
            transport_cfg: TransportCfg::from(&defaults.transport),
            recovery_cfg: RecoveryCfg::from(&defaults.recovery),
            scan_cfg: ScanCfg::from(&defaults.scan),
            liveview_cfg: LiveViewCfg::from(&defaults.live_view),
        }
    }
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(mut self, driver: Box<dyn StepDriver + Send>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn sensor(mut self, sensor: Box<dyn FrameSensor + Send>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn camera(mut self, camera: Box<dyn Camera + Send>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn writer(mut self, writer: Arc<dyn FrameWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn light(mut self, light: Box<dyn Light + Send>) -> Self {
        self.light = light;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn callback(mut self, callback: Arc<dyn ScannerCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn transport_cfg(mut self, cfg: TransportCfg) -> Self {
        self.transport_cfg = cfg;
        self
    }

    pub fn recovery_cfg(mut self, cfg: RecoveryCfg) -> Self {
        self.recovery_cfg = cfg;
        self
    }

    pub fn scan_cfg(mut self, cfg: ScanCfg) -> Self {
        self.scan_cfg = cfg;
        self
    }

    pub fn liveview_cfg(mut self, cfg: LiveViewCfg) -> Self {
        self.liveview_cfg = cfg;
        self
    }

    pub fn build(self) -> Result<Scanner, BuildError> {
        let driver = self.driver.ok_or(BuildError::MissingDriver)?;
        let sensor = self.sensor.ok_or(BuildError::MissingSensor)?;
        let camera = self.camera.ok_or(BuildError::MissingCamera)?;
        let writer = self.writer.ok_or(BuildError::MissingWriter)?;

        let transport = Transport::new(
            MotorController::new(driver),
            FrameSensorGate::new(sensor),
            self.transport_cfg,
            self.recovery_cfg,
            Arc::clone(&self.clock),
        );
        Ok(Scanner::assemble(
            transport,
            camera,
            self.light,
            writer,
            self.notifier,
            self.callbacks,
            self.clock,
            self.scan_cfg,
            self.liveview_cfg,
        ))
    }
}
