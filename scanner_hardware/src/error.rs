use thiserror::Error;

/// Typed hardware errors shared by the simulated and GPIO device backends.
#[derive(Debug, Error, Clone)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("sensor trigger timeout")]
    Timeout,
    #[error("camera error: {0}")]
    Camera(String),
    #[error("write error: {0}")]
    Write(String),
}
