use thiserror::Error;

/// Errors surfaced by transport and scan operations.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// Another exclusive operation (scan, advance or fast-forward) is
    /// already running.
    #[error("scanner is busy: {0} in progress")]
    Busy(&'static str),

    /// The frame sensor did not fire within the advance window.
    #[error("timed out waiting for the next frame")]
    FrameTimeout,

    /// A frame advance kept timing out after all recovery attempts.
    #[error("frame advance failed after {attempts} recovery attempt(s)")]
    RecoveryExhausted { attempts: u32 },

    #[error("camera error: {0}")]
    Camera(String),

    #[error("failed to save frame: {0}")]
    Save(String),

    /// Uncategorized device failure.
    #[error("hardware error: {0}")]
    Hardware(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, ScannerError>;
