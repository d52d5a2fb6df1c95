//! Background square-wave generation for software-timed step outputs.
//!
//! The original hardware chained pulse waveforms through DMA, so handing a
//! ramp to the driver returned immediately and a stop request could cut the
//! stay segment short. A [`PulseTrain`] reproduces that contract in
//! software: the segments run on their own thread and the train aborts
//! between steps.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use scanner_traits::RampSegment;

/// One ramp transmission in flight on a background thread.
pub struct PulseTrain {
    abort: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PulseTrain {
    /// Start pulsing `segments`, invoking `step` once per step with the
    /// segment's half period. Returns as soon as the thread is running.
    pub fn spawn<F>(segments: Vec<RampSegment>, mut step: F) -> Self
    where
        F: FnMut(Duration) + Send + 'static,
    {
        let abort = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&abort);
        let handle = std::thread::spawn(move || {
            'segments: for segment in &segments {
                let half = Duration::from_micros(segment.half_period_us());
                for _ in 0..segment.step_count {
                    if flag.load(Ordering::Relaxed) {
                        break 'segments;
                    }
                    step(half);
                }
            }
        });
        Self {
            abort,
            handle: Some(handle),
        }
    }

    /// Stop pulsing between steps and wait for the thread to exit.
    pub fn abort(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
        self.join();
    }

    /// Wait for the remaining segments to finish.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PulseTrain {
    fn drop(&mut self) {
        self.abort();
    }
}
