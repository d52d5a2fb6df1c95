//! Scan session worker: the capture/advance loop that runs on its own
//! thread for the duration of a session.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use scanner_traits::{Clock, FrameWriter};
use tracing::{error, info};

use crate::error::ScannerError;
use crate::events::{CallbackEvent, CallbackList, ScanEndInfo};
use crate::hw_error::classify;
use crate::saver::FrameSaver;
use crate::scanner::{Devices, ScanCfg, Shared};
use crate::session_log::SessionLog;

/// Number of recent per-frame durations the time estimate averages over.
const ETA_WINDOW: usize = 100;

pub(crate) struct SessionCtx {
    pub devices: Arc<Mutex<Devices>>,
    pub shared: Arc<Shared>,
    pub callbacks: Arc<CallbackList>,
    pub writer: Arc<dyn FrameWriter>,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub cfg: ScanCfg,
    pub output_directory: PathBuf,
    pub n_frames: u32,
    pub start_index: u32,
}

impl SessionCtx {
    fn emit(&self, event: CallbackEvent) {
        self.callbacks.notify(&event, &self.shared.snapshot());
    }

    fn lock_devices(&self) -> std::sync::MutexGuard<'_, Devices> {
        match self.devices.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub(crate) fn run_session(ctx: SessionCtx) -> ScanEndInfo {
    if let Err(e) = std::fs::create_dir_all(&ctx.output_directory) {
        error!(error = %e, "could not create output directory");
        return ScanEndInfo::Failed {
            frame_index: 0,
            message: format!("{}: {e}", ctx.output_directory.display()),
        };
    }
    let log = match SessionLog::create(&ctx.output_directory) {
        Ok(log) => log,
        Err(e) => {
            error!(error = %e, "could not create session log");
            return ScanEndInfo::Failed {
                frame_index: 0,
                message: e.to_string(),
            };
        }
    };

    log.record(&format!(
        "Start scanning frames {} to {} into \"{}\"",
        ctx.start_index,
        ctx.n_frames,
        ctx.output_directory.display()
    ));
    info!(
        start_index = ctx.start_index,
        n_frames = ctx.n_frames,
        dir = %ctx.output_directory.display(),
        "scan session started"
    );
    ctx.emit(CallbackEvent::ScanStart);

    ctx.clock.sleep(ctx.cfg.lead_in);

    let mut saver = FrameSaver::spawn(Arc::clone(&ctx.writer));
    let t_start = ctx.clock.now();
    let mut t_last = t_start;
    let mut dts: VecDeque<f64> = VecDeque::with_capacity(ETA_WINDOW);

    let mut end = ScanEndInfo::Completed {
        frames: ctx.n_frames,
    };

    for i in ctx.start_index..ctx.n_frames {
        // Let the freshly advanced frame settle in the gate.
        ctx.clock.sleep(ctx.cfg.settle);

        // The previous save must land before the camera buffer is reused;
        // a slow disk throttles the loop here.
        if let Err(e) = saver.wait_for_previous() {
            end = fail(&log, i, &e);
            break;
        }

        let bytes = match ctx.lock_devices().camera.capture_frame() {
            Ok(bytes) => bytes,
            Err(e) => {
                end = fail(&log, i, &classify(e));
                break;
            }
        };

        let path = ctx
            .output_directory
            .join(format!("frame-{i:05}.{}", ctx.cfg.frame_extension));
        if let Err(e) = saver.submit(bytes, path) {
            end = fail(&log, i, &e);
            break;
        }

        ctx.shared.current_frame_index.store(i + 1, Ordering::SeqCst);

        let t_now = ctx.clock.now();
        let dt = t_now.duration_since(t_last).as_secs_f64();
        t_last = t_now;
        // The first frame carries the lead-in; it would skew the estimate.
        if i > ctx.start_index {
            if dts.len() == ETA_WINDOW {
                dts.pop_front();
            }
            dts.push_back(dt);
            let mean = dts.iter().sum::<f64>() / dts.len() as f64;
            let remaining = f64::from(ctx.n_frames - (i + 1)) * mean;
            if let Ok(mut t) = ctx.shared.time_remaining.lock() {
                *t = Some(remaining);
            }
        }

        ctx.emit(CallbackEvent::FrameCaptured);

        ctx.emit(CallbackEvent::AdvanceStart);
        if let Err(e) = ctx.lock_devices().transport.advance() {
            end = fail(&log, i + 1, &e);
            break;
        }
        ctx.emit(CallbackEvent::AdvanceEnd);

        if ctx.shared.stop_requested.load(Ordering::SeqCst) {
            log.record(&format!("Stopped after {} frames", i + 1));
            end = ScanEndInfo::Stopped { frames: i + 1 };
            break;
        }
    }

    // Drain the pipeline; a completed loop can still fail on the last save.
    if let Err(e) = saver.finish() {
        if matches!(end, ScanEndInfo::Completed { .. } | ScanEndInfo::Stopped { .. }) {
            let frames = ctx.shared.current_frame_index.load(Ordering::SeqCst);
            end = fail(&log, frames, &e);
        }
    }

    let frames = ctx.shared.current_frame_index.load(Ordering::SeqCst);
    let elapsed = ctx.clock.now().duration_since(t_start).as_secs_f64();
    if elapsed > 0.0 {
        log.record(&format!(
            "Scanned {frames} frames in {elapsed:.2} seconds ({:.2} fps)",
            f64::from(frames) / elapsed
        ));
    }
    info!(frames, elapsed, "scan session finished");
    end
}

fn fail(log: &SessionLog, frame_index: u32, err: &ScannerError) -> ScanEndInfo {
    error!(frame_index, error = %err, "scan session failed");
    log.record(&format!("Failed at frame {frame_index}: {err}"));
    ScanEndInfo::Failed {
        frame_index,
        message: err.to_string(),
    }
}
