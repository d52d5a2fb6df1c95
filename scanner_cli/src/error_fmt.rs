//! Human-readable error descriptions and structured JSON error formatting.

use scanner_core::{BuildError, ScannerError};

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingDriver => {
                "What happened: No step driver was provided to the engine.\nLikely causes: GPIO init failed or the builder was not given a driver.\nHow to fix: Check the [pins] motor entries in the config, or run without --hardware.".to_string()
            }
            BuildError::MissingSensor => {
                "What happened: No frame sensor was provided to the engine.\nLikely causes: Sensor pin failed to open or was not wired into the builder.\nHow to fix: Check pins.sensor_input in the config, or run without --hardware.".to_string()
            }
            BuildError::MissingCamera => {
                "What happened: No camera was provided to the engine.\nLikely causes: Camera init failed or was not wired into the builder.\nHow to fix: Check the camera connection and the [camera] config section.".to_string()
            }
            BuildError::MissingWriter => {
                "What happened: No frame writer was provided to the engine.\nLikely causes: The output backend was not wired into the builder.\nHow to fix: Provide a frame writer (the CLI uses the filesystem writer by default).".to_string()
            }
        };
    }

    if let Some(se) = err.downcast_ref::<ScannerError>() {
        return match se {
            ScannerError::Busy(op) => format!(
                "What happened: The transport is already running a {op}.\nLikely causes: A scan or fast-forward is still in progress.\nHow to fix: Stop the running operation first, then retry."
            ),
            ScannerError::FrameTimeout => {
                "What happened: The frame sensor never fired during an advance.\nLikely causes: Film not loaded, sprocket slipping, or sensor misaligned.\nHow to fix: Check the film path and the Hall sensor position, then retry.".to_string()
            }
            ScannerError::RecoveryExhausted { attempts } => format!(
                "What happened: A frame advance kept timing out after {attempts} recovery attempt(s).\nLikely causes: Jammed or torn film, or a seized transport.\nHow to fix: Clear the film path by hand before restarting the scan."
            ),
            ScannerError::Camera(msg) => format!(
                "What happened: The camera failed ({msg}).\nLikely causes: Camera disconnected or out of memory.\nHow to fix: Check the camera connection and rerun."
            ),
            ScannerError::Save(msg) => format!(
                "What happened: A frame could not be saved ({msg}).\nLikely causes: Disk full, missing permissions, or a bad output path.\nHow to fix: Free disk space or pick another --output directory."
            ),
            ScannerError::Hardware(e) => format!(
                "What happened: A device failed ({e}).\nLikely causes: Wiring or GPIO permission problems.\nHow to fix: Check the [pins] config and GPIO access, then retry."
            ),
        };
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {err}"
    )
}

/// Stable exit codes per error class; unknown errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(se) = err.downcast_ref::<ScannerError>() {
        return match se {
            ScannerError::Busy(_) => 2,
            ScannerError::FrameTimeout => 3,
            ScannerError::RecoveryExhausted { .. } => 4,
            ScannerError::Camera(_) => 5,
            ScannerError::Save(_) => 6,
            ScannerError::Hardware(_) => 7,
        };
    }
    1
}

fn error_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<ScannerError>() {
        Some(ScannerError::Busy(_)) => "Busy",
        Some(ScannerError::FrameTimeout) => "FrameTimeout",
        Some(ScannerError::RecoveryExhausted { .. }) => "RecoveryExhausted",
        Some(ScannerError::Camera(_)) => "Camera",
        Some(ScannerError::Save(_)) => "Save",
        Some(ScannerError::Hardware(_)) => "Hardware",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": error_name(err),
        "message": humanize(err),
    })
    .to_string()
}
