//! Classification of boxed device errors into [`ScannerError`].
//!
//! Device traits return `Box<dyn Error + Send + Sync>` so backends stay
//! decoupled from this crate. With the `hardware-errors` feature (default)
//! errors from the bundled backends are downcast and mapped onto the typed
//! taxonomy; anything else stays an opaque [`ScannerError::Hardware`].

use crate::error::ScannerError;

pub fn classify(err: Box<dyn std::error::Error + Send + Sync>) -> ScannerError {
    #[cfg(feature = "hardware-errors")]
    if let Some(hw) = err.downcast_ref::<scanner_hardware::error::HwError>() {
        use scanner_hardware::error::HwError;
        match hw {
            HwError::Timeout => return ScannerError::FrameTimeout,
            HwError::Camera(msg) => return ScannerError::Camera(msg.clone()),
            HwError::Write(msg) => return ScannerError::Save(msg.clone()),
            HwError::Gpio(_) => {}
        }
    }
    ScannerError::Hardware(err)
}

#[cfg(all(test, feature = "hardware-errors"))]
mod tests {
    use super::*;
    use scanner_hardware::error::HwError;

    #[test]
    fn camera_errors_are_classified() {
        let err = classify(Box::new(HwError::Camera("sensor gain".into())));
        assert!(matches!(err, ScannerError::Camera(msg) if msg == "sensor gain"));
    }

    #[test]
    fn unknown_errors_stay_opaque() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "nope");
        assert!(matches!(classify(Box::new(io)), ScannerError::Hardware(_)));
    }
}
