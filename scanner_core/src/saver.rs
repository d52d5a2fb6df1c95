//! Depth-one frame save pipeline.
//!
//! Saving overlaps with the next transport advance, but at most one frame
//! is ever in flight: the scan loop waits for the previous save before
//! capturing again, so a slow disk backs the whole loop off instead of
//! queueing frames in memory.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded};
use scanner_traits::FrameWriter;
use tracing::debug;

use crate::error::{Result, ScannerError};
use crate::hw_error::classify;

struct SaveJob {
    bytes: Vec<u8>,
    path: PathBuf,
}

pub struct FrameSaver {
    job_tx: Option<Sender<SaveJob>>,
    done_rx: Receiver<Result<()>>,
    in_flight: bool,
    handle: Option<JoinHandle<()>>,
}

impl FrameSaver {
    pub fn spawn(writer: Arc<dyn FrameWriter>) -> Self {
        let (job_tx, job_rx) = bounded::<SaveJob>(1);
        let (done_tx, done_rx) = bounded::<Result<()>>(1);
        let handle = std::thread::spawn(move || {
            for job in job_rx {
                let res = writer.save(&job.bytes, &job.path).map_err(classify);
                debug!(path = %job.path.display(), ok = res.is_ok(), "frame saved");
                if done_tx.send(res).is_err() {
                    break;
                }
            }
        });
        Self {
            job_tx: Some(job_tx),
            done_rx,
            in_flight: false,
            handle: Some(handle),
        }
    }

    /// Block until the previously submitted save (if any) finishes,
    /// surfacing its result.
    pub fn wait_for_previous(&mut self) -> Result<()> {
        if !self.in_flight {
            return Ok(());
        }
        self.in_flight = false;
        match self.done_rx.recv() {
            Ok(res) => res,
            Err(_) => Err(ScannerError::Save("saver thread terminated".into())),
        }
    }

    /// Hand a frame to the saver thread. Callers must have waited for the
    /// previous save first.
    pub fn submit(&mut self, bytes: Vec<u8>, path: PathBuf) -> Result<()> {
        assert!(!self.in_flight, "a frame save is already in flight");
        let tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| ScannerError::Save("saver already shut down".into()))?;
        tx.send(SaveJob { bytes, path })
            .map_err(|_| ScannerError::Save("saver thread terminated".into()))?;
        self.in_flight = true;
        Ok(())
    }

    /// Drain the pipeline at the end of a session.
    pub fn finish(&mut self) -> Result<()> {
        self.wait_for_previous()
    }
}

impl Drop for FrameSaver {
    fn drop(&mut self) {
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
