//! Per-session log file written next to the scanned frames.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use tracing::warn;

use crate::error::{Result, ScannerError};

pub const SESSION_LOG_NAME: &str = "scanner.log";

/// Append-only session log, one timestamped line per entry.
pub struct SessionLog {
    file: Mutex<File>,
}

impl SessionLog {
    pub fn create(directory: &Path) -> Result<Self> {
        let path = directory.join(SESSION_LOG_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ScannerError::Save(format!("{}: {e}", path.display())))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Best effort: a failing log write never aborts a running scan.
    pub fn record(&self, message: &str) {
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        if let Err(e) = writeln!(file, "{stamp} - {message}") {
            warn!(error = %e, "session log write failed");
        }
    }
}
