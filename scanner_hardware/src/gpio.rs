//! Raspberry Pi GPIO backends built on `rppal`.
//!
//! The step driver pulses the step pin in software on a background
//! [`PulseTrain`], so `transmit` returns immediately and the next ramp or a
//! disable cuts the running stay segment short. The frame sensor registers
//! a rising-edge interrupt on the Hall-effect pin.

use std::sync::{Arc, Mutex};

use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};

use scanner_traits::{Direction, FrameSensor, HwResult, Light, RampSegment, StepDriver};

use crate::error::HwError;
use crate::pulse::PulseTrain;

fn gpio_err(e: rppal::gpio::Error) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(HwError::Gpio(e.to_string()))
}

/// Stepper driver wired to enable, direction and step pins.
///
/// The enable input of the driver board is active low.
pub struct GpioStepDriver {
    enable: OutputPin,
    direction: OutputPin,
    step: Arc<Mutex<OutputPin>>,
    train: Option<PulseTrain>,
}

impl GpioStepDriver {
    pub fn new(enable_pin: u8, direction_pin: u8, step_pin: u8) -> HwResult<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut enable = gpio.get(enable_pin).map_err(gpio_err)?.into_output();
        let mut direction = gpio.get(direction_pin).map_err(gpio_err)?.into_output();
        let step = gpio.get(step_pin).map_err(gpio_err)?.into_output();
        enable.set_high();
        direction.set_low();
        Ok(Self {
            enable,
            direction,
            step: Arc::new(Mutex::new(step)),
            train: None,
        })
    }

    fn abort_train(&mut self) {
        if let Some(mut train) = self.train.take() {
            train.abort();
        }
    }
}

impl StepDriver for GpioStepDriver {
    fn set_enabled(&mut self, enabled: bool) -> HwResult<()> {
        if enabled {
            self.enable.set_low();
        } else {
            // Cut any running motion before the driver board drops its coils.
            self.abort_train();
            self.enable.set_high();
        }
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> HwResult<()> {
        match direction {
            Direction::Forward => self.direction.set_low(),
            Direction::Reverse => self.direction.set_high(),
        }
        Ok(())
    }

    fn transmit(&mut self, ramp: &[RampSegment]) -> HwResult<()> {
        // A new ramp supersedes the running one (a deceleration ramp ends
        // the stay segment early).
        self.abort_train();
        let pin = Arc::clone(&self.step);
        self.train = Some(PulseTrain::spawn(ramp.to_vec(), move |half| {
            let mut pin = match pin.lock() {
                Ok(pin) => pin,
                Err(poisoned) => poisoned.into_inner(),
            };
            pin.set_high();
            std::thread::sleep(half);
            pin.set_low();
            std::thread::sleep(half);
        }));
        Ok(())
    }
}

impl Drop for GpioStepDriver {
    fn drop(&mut self) {
        self.abort_train();
    }
}

/// Hall-effect frame sensor on a single input pin with an internal pull-up.
pub struct GpioFrameSensor {
    pin: InputPin,
}

impl GpioFrameSensor {
    pub fn new(sensor_pin: u8) -> HwResult<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let pin = gpio.get(sensor_pin).map_err(gpio_err)?.into_input_pullup();
        Ok(Self { pin })
    }
}

impl FrameSensor for GpioFrameSensor {
    fn subscribe(&mut self, mut handler: Box<dyn FnMut() + Send>) -> HwResult<()> {
        self.pin
            .set_async_interrupt(Trigger::RisingEdge, move |_| handler())
            .map_err(gpio_err)
    }

    fn unsubscribe(&mut self) -> HwResult<()> {
        self.pin.clear_async_interrupt().map_err(gpio_err)
    }
}

/// Backlight on a single output pin.
pub struct GpioLight {
    pin: OutputPin,
}

impl GpioLight {
    pub fn new(light_pin: u8) -> HwResult<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let pin = gpio.get(light_pin).map_err(gpio_err)?.into_output();
        Ok(Self { pin })
    }
}

impl Light for GpioLight {
    fn set_on(&mut self, on: bool) -> HwResult<()> {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}
