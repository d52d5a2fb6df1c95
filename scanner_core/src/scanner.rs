//! Scanner facade: owns the devices, enforces mutual exclusion between
//! transport operations and runs the background live view loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use scanner_traits::{Camera, Clock, FrameWriter, Light, Notifier};
use tracing::{info, warn};

use crate::error::{Result, ScannerError};
use crate::events::{CallbackEvent, CallbackList, ScanEndInfo, ScannerState};
use crate::hw_error::classify;
use crate::liveview::{LiveViewFeed, LiveViewHandle};
use crate::session::{SessionCtx, run_session};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct ScanCfg {
    /// Pause after each advance before capturing, letting the frame settle.
    pub settle: Duration,
    /// Pause between session start and the first capture.
    pub lead_in: Duration,
    /// File extension for saved frames, without the dot.
    pub frame_extension: String,
}

#[derive(Debug, Clone, Copy)]
pub struct LiveViewCfg {
    /// Viewers silent for longer than this are pruned.
    pub idle_timeout: Duration,
    /// Interval between preview captures.
    pub frame_interval: Duration,
}

pub(crate) struct Devices {
    pub transport: Transport,
    pub camera: Box<dyn Camera + Send>,
    pub light: Box<dyn Light + Send>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Scan,
    Advance,
    FastForward,
}

#[derive(Default)]
struct OpFlags {
    scanning: bool,
    advancing: bool,
    fast_forwarding: bool,
}

/// State shared between the facade, the scan session thread and the live
/// view loop.
pub(crate) struct Shared {
    ops: Mutex<OpFlags>,
    pub stop_requested: AtomicBool,
    is_light_on: AtomicBool,
    is_zoomed: AtomicBool,
    pub liveview_paused: AtomicBool,
    pub current_frame_index: AtomicU32,
    n_frames: AtomicU32,
    output_directory: Mutex<Option<PathBuf>>,
    pub time_remaining: Mutex<Option<f64>>,
    last_scan_end: Mutex<Option<ScanEndInfo>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            ops: Mutex::new(OpFlags::default()),
            stop_requested: AtomicBool::new(false),
            is_light_on: AtomicBool::new(false),
            is_zoomed: AtomicBool::new(false),
            liveview_paused: AtomicBool::new(false),
            current_frame_index: AtomicU32::new(0),
            n_frames: AtomicU32::new(0),
            output_directory: Mutex::new(None),
            time_remaining: Mutex::new(None),
            last_scan_end: Mutex::new(None),
        }
    }

    fn lock_ops(&self) -> MutexGuard<'_, OpFlags> {
        match self.ops.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claim exclusive use of the transport for `op`.
    fn try_begin(&self, op: Op) -> Result<()> {
        let mut flags = self.lock_ops();
        if flags.scanning {
            return Err(ScannerError::Busy("scan"));
        }
        if flags.advancing {
            return Err(ScannerError::Busy("advance"));
        }
        if flags.fast_forwarding {
            return Err(ScannerError::Busy("fast-forward"));
        }
        match op {
            Op::Scan => flags.scanning = true,
            Op::Advance => flags.advancing = true,
            Op::FastForward => flags.fast_forwarding = true,
        }
        Ok(())
    }

    fn end(&self, op: Op) {
        let mut flags = self.lock_ops();
        match op {
            Op::Scan => flags.scanning = false,
            Op::Advance => flags.advancing = false,
            Op::FastForward => flags.fast_forwarding = false,
        }
    }

    pub fn snapshot(&self) -> ScannerState {
        let flags = self.lock_ops();
        ScannerState {
            is_scanning: flags.scanning,
            is_advancing: flags.advancing,
            is_fast_forwarding: flags.fast_forwarding,
            is_light_on: self.is_light_on.load(Ordering::SeqCst),
            is_zoomed: self.is_zoomed.load(Ordering::SeqCst),
            current_frame_index: self.current_frame_index.load(Ordering::SeqCst),
            n_frames: self.n_frames.load(Ordering::SeqCst),
            output_directory: self
                .output_directory
                .lock()
                .ok()
                .and_then(|dir| dir.clone()),
            time_remaining_secs: self.time_remaining.lock().ok().and_then(|t| *t),
            last_scan_end: self.last_scan_end.lock().ok().and_then(|e| e.clone()),
        }
    }
}

/// See [`Scanner::stop_handle`].
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    pub fn stop(&self) {
        info!("stop requested");
        self.shared.stop_requested.store(true, Ordering::SeqCst);
    }
}

pub struct Scanner {
    devices: Arc<Mutex<Devices>>,
    shared: Arc<Shared>,
    callbacks: Arc<CallbackList>,
    writer: Arc<dyn FrameWriter>,
    notifier: Arc<dyn Notifier>,
    liveview: Arc<LiveViewFeed>,
    clock: Arc<dyn Clock + Send + Sync>,
    scan_cfg: ScanCfg,
    liveview_cfg: LiveViewCfg,
    liveview_running: Arc<AtomicBool>,
    liveview_thread: Option<JoinHandle<()>>,
    scan_thread: Option<JoinHandle<()>>,
    ff_thread: Option<JoinHandle<()>>,
}

impl Scanner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        transport: Transport,
        camera: Box<dyn Camera + Send>,
        light: Box<dyn Light + Send>,
        writer: Arc<dyn FrameWriter>,
        notifier: Arc<dyn Notifier>,
        callbacks: CallbackList,
        clock: Arc<dyn Clock + Send + Sync>,
        scan_cfg: ScanCfg,
        liveview_cfg: LiveViewCfg,
    ) -> Self {
        Self {
            devices: Arc::new(Mutex::new(Devices {
                transport,
                camera,
                light,
            })),
            shared: Arc::new(Shared::new()),
            callbacks: Arc::new(callbacks),
            writer,
            notifier,
            liveview: Arc::new(LiveViewFeed::new(liveview_cfg.idle_timeout)),
            clock,
            scan_cfg,
            liveview_cfg,
            liveview_running: Arc::new(AtomicBool::new(false)),
            liveview_thread: None,
            scan_thread: None,
            ff_thread: None,
        }
    }

    fn lock_devices(devices: &Arc<Mutex<Devices>>) -> MutexGuard<'_, Devices> {
        match devices.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: CallbackEvent) {
        self.callbacks.notify(&event, &self.shared.snapshot());
    }

    /// Externally visible state snapshot.
    pub fn state(&self) -> ScannerState {
        self.shared.snapshot()
    }

    /// Advance the film by exactly one frame. Blocks until done.
    pub fn advance(&self) -> Result<()> {
        self.shared.try_begin(Op::Advance)?;
        self.emit(CallbackEvent::AdvanceStart);

        let result = Self::lock_devices(&self.devices).transport.advance();

        self.shared.end(Op::Advance);
        match result {
            Ok(()) => {
                self.emit(CallbackEvent::AdvanceEnd);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run the transport forward frame by frame until [`Self::stop`] is
    /// called or an advance fails. Returns immediately; the work happens on
    /// a background thread.
    pub fn fast_forward(&mut self) -> Result<()> {
        self.shared.try_begin(Op::FastForward)?;
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.emit(CallbackEvent::FastForwardStart);

        let devices = Arc::clone(&self.devices);
        let shared = Arc::clone(&self.shared);
        let callbacks = Arc::clone(&self.callbacks);
        self.ff_thread = Some(std::thread::spawn(move || {
            let mut frames: u64 = 0;
            while !shared.stop_requested.load(Ordering::SeqCst) {
                // Lock per advance so the live view loop can interleave.
                if let Err(e) = Self::lock_devices(&devices).transport.advance() {
                    warn!(error = %e, "fast-forward stopped on advance failure");
                    break;
                }
                frames += 1;
            }
            info!(frames, "fast-forward finished");
            shared.end(Op::FastForward);
            callbacks.notify(&CallbackEvent::FastForwardEnd, &shared.snapshot());
        }));
        Ok(())
    }

    /// Request the running scan or fast-forward to stop at the next frame
    /// boundary.
    pub fn stop(&self) {
        info!("stop requested");
        self.shared.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Cloneable handle for requesting a stop from another thread (signal
    /// handlers, network servers).
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Toggle the backlight; returns the new state.
    pub fn toggle_light(&self) -> Result<bool> {
        let on = !self.shared.is_light_on.load(Ordering::SeqCst);
        Self::lock_devices(&self.devices)
            .light
            .set_on(on)
            .map_err(classify)?;
        self.shared.is_light_on.store(on, Ordering::SeqCst);
        self.emit(if on {
            CallbackEvent::LightOn
        } else {
            CallbackEvent::LightOff
        });
        Ok(on)
    }

    /// Toggle the preview zoom flag; returns the new state.
    pub fn toggle_zoom(&self) -> bool {
        let zoomed = !self.shared.is_zoomed.load(Ordering::SeqCst);
        self.shared.is_zoomed.store(zoomed, Ordering::SeqCst);
        self.emit(if zoomed {
            CallbackEvent::ZoomIn
        } else {
            CallbackEvent::ZoomOut
        });
        zoomed
    }

    /// Start a scan session of frames `start_index..n_frames` into
    /// `output_directory`. A `start_index` above zero resumes a partial
    /// reel, continuing the frame numbering. Returns once the session
    /// thread is running; use [`Self::wait_scan`] to block for the outcome.
    pub fn start_scan(
        &mut self,
        output_directory: PathBuf,
        n_frames: u32,
        start_index: u32,
    ) -> Result<()> {
        self.shared.try_begin(Op::Scan)?;
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared.liveview_paused.store(true, Ordering::SeqCst);
        self.shared
            .current_frame_index
            .store(start_index, Ordering::SeqCst);
        self.shared.n_frames.store(n_frames, Ordering::SeqCst);
        if let Ok(mut dir) = self.shared.output_directory.lock() {
            *dir = Some(output_directory.clone());
        }

        let ctx = SessionCtx {
            devices: Arc::clone(&self.devices),
            shared: Arc::clone(&self.shared),
            callbacks: Arc::clone(&self.callbacks),
            writer: Arc::clone(&self.writer),
            clock: Arc::clone(&self.clock),
            cfg: self.scan_cfg.clone(),
            output_directory,
            n_frames,
            start_index,
        };
        let shared = Arc::clone(&self.shared);
        let callbacks = Arc::clone(&self.callbacks);
        let notifier = Arc::clone(&self.notifier);
        self.scan_thread = Some(std::thread::spawn(move || {
            let end = run_session(ctx);

            if let Ok(mut slot) = shared.last_scan_end.lock() {
                *slot = Some(end.clone());
            }
            if let Ok(mut t) = shared.time_remaining.lock() {
                *t = None;
            }
            shared.end(Op::Scan);
            callbacks.notify(&CallbackEvent::ScanEnd, &shared.snapshot());

            let message = match &end {
                ScanEndInfo::Completed { frames } => {
                    Some(format!("Finished scanning {frames} frames!"))
                }
                ScanEndInfo::Failed {
                    frame_index,
                    message,
                } => Some(format!("Scan failed at frame {frame_index}: {message}")),
                ScanEndInfo::Stopped { .. } => None,
            };
            if let Some(message) = message {
                if let Err(e) = notifier.send(&message) {
                    warn!(error = %e, "notification failed");
                }
            }

            shared.liveview_paused.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    /// Block until the current scan session finishes and return its outcome.
    pub fn wait_scan(&mut self) -> Option<ScanEndInfo> {
        if let Some(handle) = self.scan_thread.take() {
            let _ = handle.join();
        }
        self.shared
            .last_scan_end
            .lock()
            .ok()
            .and_then(|e| e.clone())
    }

    /// Request a stop and block until the scan worker has acknowledged it
    /// and exited; no scan work races the caller's next action.
    pub fn stop_scan(&mut self) -> Option<ScanEndInfo> {
        self.stop();
        self.wait_scan()
    }

    /// Register a live view consumer. The first registration starts the
    /// background preview capture loop; the loop exits on its own once the
    /// last viewer is dropped or pruned.
    pub fn register_viewer(&mut self) -> LiveViewHandle {
        let handle = self.liveview.register();
        self.ensure_live_view();
        handle
    }

    /// Spawn the preview capture loop unless one is already running.
    /// Captures only while no scan holds the camera.
    fn ensure_live_view(&mut self) {
        if self.liveview_running.swap(true, Ordering::SeqCst) {
            return;
        }
        // A previous loop may have exited when its registry emptied.
        if let Some(handle) = self.liveview_thread.take() {
            let _ = handle.join();
        }
        let running = Arc::clone(&self.liveview_running);
        let devices = Arc::clone(&self.devices);
        let shared = Arc::clone(&self.shared);
        let feed = Arc::clone(&self.liveview);
        let clock = Arc::clone(&self.clock);
        let interval = self.liveview_cfg.frame_interval;
        self.liveview_thread = Some(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                if feed.viewer_count() == 0 {
                    running.store(false, Ordering::SeqCst);
                    // A viewer may have registered between the check and
                    // the store; reclaim the flag instead of exiting.
                    if feed.viewer_count() > 0 && !running.swap(true, Ordering::SeqCst) {
                        continue;
                    }
                    break;
                }
                if shared.liveview_paused.load(Ordering::SeqCst) {
                    clock.sleep(interval);
                    continue;
                }
                let frame = Self::lock_devices(&devices).camera.capture_frame();
                match frame {
                    Ok(bytes) => feed.set_frame(bytes),
                    Err(e) => warn!(error = %e, "live view capture failed"),
                }
                clock.sleep(interval);
            }
        }));
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.liveview_running.store(false, Ordering::SeqCst);
        for handle in [
            self.scan_thread.take(),
            self.ff_thread.take(),
            self.liveview_thread.take(),
        ]
        .into_iter()
        .flatten()
        {
            let _ = handle.join();
        }
    }
}
