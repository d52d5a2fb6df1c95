//! Full scan sessions against mock devices: naming, backpressure, stop
//! semantics, mutual exclusion, events and notifications.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use scanner_core::mocks::{
    CountingCamera, DriverAction, MemoryWriter, RecordingDriver, RecordingNotifier,
    ScriptedSensor,
};
use scanner_core::{
    CallbackEvent, LiveViewCfg, RecoveryCfg, ScanCfg, ScanEndInfo, Scanner, ScannerBuilder,
    ScannerCallback, ScannerError, ScannerState, StopHandle, TransportCfg,
};
use scanner_traits::{Camera, Direction, HwResult, Notifier};

fn fast_builder() -> ScannerBuilder {
    ScannerBuilder::new()
        .transport_cfg(TransportCfg {
            speed_rpm: 300.0,
            acceleration: 24.0,
            frame_period: Duration::from_millis(40),
            period_margin: 0.0,
        })
        .recovery_cfg(RecoveryCfg {
            max_attempts: 1,
            nudge_speed_rpm: 1.0,
            nudge_acceleration: 1.0,
            nudge_timeout: Duration::from_millis(5),
            resettle: Duration::from_millis(1),
            backoff_start: Duration::from_millis(1),
        })
        .scan_cfg(ScanCfg {
            settle: Duration::from_millis(2),
            lead_in: Duration::ZERO,
            frame_extension: "dng".to_string(),
        })
        .liveview_cfg(LiveViewCfg {
            idle_timeout: Duration::from_secs(30),
            frame_interval: Duration::from_millis(5),
        })
        .driver(Box::new(RecordingDriver::new()))
        .sensor(Box::new(ScriptedSensor::always(Duration::from_millis(3))))
        .camera(Box::new(CountingCamera::new()))
}

#[test]
fn scan_names_frames_and_writes_session_log() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MemoryWriter::new();
    let notifier = RecordingNotifier::new();
    let mut scanner = fast_builder()
        .writer(writer.clone())
        .notifier(notifier.clone())
        .build()
        .unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 3, 0).unwrap();
    let end = scanner.wait_scan().unwrap();

    assert_eq!(end, ScanEndInfo::Completed { frames: 3 });
    assert_eq!(
        writer.saved_paths(),
        vec![
            dir.path().join("frame-00000.dng"),
            dir.path().join("frame-00001.dng"),
            dir.path().join("frame-00002.dng"),
        ]
    );
    assert_eq!(notifier.messages(), vec!["Finished scanning 3 frames!"]);

    let log = std::fs::read_to_string(dir.path().join("scanner.log")).unwrap();
    assert!(log.contains("Start scanning frames 0 to 3"));
    assert!(log.contains("Scanned 3 frames"));
}

#[test]
fn every_captured_frame_is_followed_by_an_advance() {
    let dir = tempfile::tempdir().unwrap();
    let driver = RecordingDriver::new();
    let actions = driver.actions();
    let mut scanner = fast_builder()
        .driver(Box::new(driver))
        .writer(MemoryWriter::new())
        .build()
        .unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 3, 0).unwrap();
    assert_eq!(scanner.wait_scan().unwrap(), ScanEndInfo::Completed { frames: 3 });

    // The transport moves off the final frame too.
    let forward_passes = actions
        .lock()
        .unwrap()
        .iter()
        .filter(|a| matches!(a, DriverAction::Direction(Direction::Forward)))
        .count();
    assert_eq!(forward_passes, 3);
}

#[test]
fn resumed_scan_continues_the_frame_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MemoryWriter::new();
    let mut scanner = fast_builder().writer(writer.clone()).build().unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 5, 3).unwrap();
    let end = scanner.wait_scan().unwrap();

    assert_eq!(end, ScanEndInfo::Completed { frames: 5 });
    assert_eq!(
        writer.saved_paths(),
        vec![
            dir.path().join("frame-00003.dng"),
            dir.path().join("frame-00004.dng"),
        ]
    );

    let log = std::fs::read_to_string(dir.path().join("scanner.log")).unwrap();
    assert!(log.contains("Start scanning frames 3 to 5"));
}

#[test]
fn slow_writer_throttles_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MemoryWriter::with_delay(Duration::from_millis(60));
    let mut scanner = fast_builder().writer(writer.clone()).build().unwrap();

    let t0 = Instant::now();
    scanner.start_scan(dir.path().to_path_buf(), 3, 0).unwrap();
    let end = scanner.wait_scan().unwrap();

    assert_eq!(end, ScanEndInfo::Completed { frames: 3 });
    assert_eq!(writer.saved_paths().len(), 3);
    // Captures 2 and 3 each wait out the previous save.
    assert!(t0.elapsed() >= Duration::from_millis(120));
}

/// Camera and writer sharing one journal so the interleaving is observable.
struct ProbeCamera {
    journal: Arc<Mutex<Vec<String>>>,
    frame: u32,
}

impl scanner_traits::Camera for ProbeCamera {
    fn capture_frame(&mut self) -> HwResult<Vec<u8>> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("capture {}", self.frame));
        self.frame += 1;
        Ok(vec![0u8; 16])
    }

    fn set_resolution(&mut self, _width: u32, _height: u32) -> HwResult<()> {
        Ok(())
    }
}

struct ProbeWriter {
    journal: Arc<Mutex<Vec<String>>>,
}

impl scanner_traits::FrameWriter for ProbeWriter {
    fn save(&self, _bytes: &[u8], path: &std::path::Path) -> HwResult<()> {
        std::thread::sleep(Duration::from_millis(30));
        self.journal
            .lock()
            .unwrap()
            .push(format!("save {}", path.file_name().unwrap().to_string_lossy()));
        Ok(())
    }
}

#[test]
fn next_capture_waits_for_the_previous_save() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut scanner = fast_builder()
        .camera(Box::new(ProbeCamera {
            journal: Arc::clone(&journal),
            frame: 0,
        }))
        .writer(Arc::new(ProbeWriter {
            journal: Arc::clone(&journal),
        }))
        .build()
        .unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 3, 0).unwrap();
    assert_eq!(scanner.wait_scan().unwrap(), ScanEndInfo::Completed { frames: 3 });

    let journal = journal.lock().unwrap();
    let pos = |entry: &str| {
        journal
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("missing journal entry {entry:?}"))
    };
    assert!(pos("capture 1") > pos("save frame-00000.dng"));
    assert!(pos("capture 2") > pos("save frame-00001.dng"));
}

struct StopAfter {
    frames: u32,
    handle: OnceLock<StopHandle>,
}

impl ScannerCallback for StopAfter {
    fn on_frame_captured(&self, state: &ScannerState) {
        if state.current_frame_index >= self.frames {
            if let Some(h) = self.handle.get() {
                h.stop();
            }
        }
    }
}

#[test]
fn stop_lands_on_a_frame_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MemoryWriter::new();
    let stopper = Arc::new(StopAfter {
        frames: 2,
        handle: OnceLock::new(),
    });
    let mut scanner = fast_builder()
        .writer(writer.clone())
        .callback(stopper.clone())
        .build()
        .unwrap();
    let _ = stopper.handle.set(scanner.stop_handle());

    scanner.start_scan(dir.path().to_path_buf(), 100, 0).unwrap();
    let end = scanner.wait_scan().unwrap();

    assert_eq!(end, ScanEndInfo::Stopped { frames: 2 });
    assert_eq!(writer.saved_paths().len(), 2);
}

#[test]
fn stop_scan_blocks_until_the_worker_exits() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MemoryWriter::new();
    let mut scanner = fast_builder().writer(writer.clone()).build().unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 1000, 0).unwrap();
    let end = scanner.stop_scan().unwrap();

    let frames = match end {
        ScanEndInfo::Stopped { frames } => frames,
        other => panic!("expected a stopped session, got {other:?}"),
    };
    assert!(frames >= 1);
    assert_eq!(writer.saved_paths().len(), frames as usize);
    assert!(!scanner.state().is_scanning);
}

#[test]
fn transport_is_exclusive_while_scanning() {
    let dir = tempfile::tempdir().unwrap();
    let stopper = Arc::new(StopAfter {
        frames: 3,
        handle: OnceLock::new(),
    });
    let mut scanner = fast_builder()
        .writer(MemoryWriter::new())
        .callback(stopper.clone())
        .build()
        .unwrap();
    let _ = stopper.handle.set(scanner.stop_handle());

    scanner.start_scan(dir.path().to_path_buf(), 1000, 0).unwrap();

    assert!(matches!(
        scanner.advance(),
        Err(ScannerError::Busy("scan"))
    ));
    assert!(matches!(
        scanner.fast_forward(),
        Err(ScannerError::Busy("scan"))
    ));

    let end = scanner.wait_scan().unwrap();
    assert_eq!(end, ScanEndInfo::Stopped { frames: 3 });

    // Transport is free again once the session ends.
    scanner.advance().unwrap();
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<(CallbackEvent, ScannerState)>>,
}

impl ScannerCallback for EventLog {
    fn notify(&self, event: &CallbackEvent, state: &ScannerState) {
        self.events
            .lock()
            .unwrap()
            .push((event.clone(), state.clone()));
    }
}

#[test]
fn events_bracket_the_session_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(EventLog::default());
    let mut scanner = fast_builder()
        .writer(MemoryWriter::new())
        .callback(log.clone())
        .build()
        .unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 3, 0).unwrap();
    scanner.wait_scan().unwrap();

    let events = log.events.lock().unwrap();
    assert_eq!(events.first().map(|(e, _)| *e), Some(CallbackEvent::ScanStart));
    assert_eq!(events.last().map(|(e, _)| *e), Some(CallbackEvent::ScanEnd));

    // Frame counts advance monotonically through the capture events.
    let captured: Vec<u32> = events
        .iter()
        .filter(|(e, _)| *e == CallbackEvent::FrameCaptured)
        .map(|(_, s)| s.current_frame_index)
        .collect();
    assert_eq!(captured, vec![1, 2, 3]);

    // One advance per captured frame, each bracketed by its own start/end
    // pair, including the advance off the final frame.
    let advances: Vec<CallbackEvent> = events
        .iter()
        .map(|(e, _)| *e)
        .filter(|e| matches!(e, CallbackEvent::AdvanceStart | CallbackEvent::AdvanceEnd))
        .collect();
    assert_eq!(
        advances,
        vec![
            CallbackEvent::AdvanceStart,
            CallbackEvent::AdvanceEnd,
            CallbackEvent::AdvanceStart,
            CallbackEvent::AdvanceEnd,
            CallbackEvent::AdvanceStart,
            CallbackEvent::AdvanceEnd,
        ]
    );

    // State snapshots during the session report a running scan and, from
    // the second frame on, a time estimate.
    let (_, mid) = &events[2];
    assert!(mid.is_scanning);
    let with_eta = events.iter().any(|(e, s)| {
        *e == CallbackEvent::FrameCaptured
            && s.current_frame_index >= 2
            && s.time_remaining_secs.is_some()
    });
    assert!(with_eta);

    // The ScanEnd snapshot carries the terminal outcome and no estimate.
    let (_, last) = events.last().unwrap();
    assert_eq!(last.last_scan_end, Some(ScanEndInfo::Completed { frames: 3 }));
    assert!(last.time_remaining_secs.is_none());
    assert!(!last.is_scanning);
}

struct FailingCamera {
    fail_at: u32,
    inner: CountingCamera,
}

impl Camera for FailingCamera {
    fn capture_frame(&mut self) -> HwResult<Vec<u8>> {
        let n = self.inner.captures().load(Ordering::SeqCst);
        if n >= self.fail_at {
            return Err("sensor desync".into());
        }
        self.inner.capture_frame()
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> HwResult<()> {
        self.inner.set_resolution(width, height)
    }
}

#[test]
fn camera_failure_fails_the_session_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MemoryWriter::new();
    let notifier = RecordingNotifier::new();
    let mut scanner = fast_builder()
        .camera(Box::new(FailingCamera {
            fail_at: 1,
            inner: CountingCamera::new(),
        }))
        .writer(writer.clone())
        .notifier(notifier.clone())
        .build()
        .unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 5, 0).unwrap();
    let end = scanner.wait_scan().unwrap();

    match end {
        ScanEndInfo::Failed { frame_index, .. } => assert_eq!(frame_index, 1),
        other => panic!("expected failure, got {other:?}"),
    }
    // The first frame still landed.
    assert_eq!(writer.saved_paths(), vec![dir.path().join("frame-00000.dng")]);
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Scan failed at frame 1"));
}

struct FailingWriter;

impl scanner_traits::FrameWriter for FailingWriter {
    fn save(&self, _bytes: &[u8], _path: &std::path::Path) -> HwResult<()> {
        Err("read-only filesystem".into())
    }
}

#[test]
fn save_failure_fails_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut scanner = fast_builder().writer(Arc::new(FailingWriter)).build().unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 3, 0).unwrap();
    let end = scanner.wait_scan().unwrap();

    assert!(matches!(end, ScanEndInfo::Failed { .. }));
}

#[test]
fn toggles_update_state_and_emit_events() {
    let log = Arc::new(EventLog::default());
    let scanner = fast_builder()
        .writer(MemoryWriter::new())
        .callback(log.clone())
        .build()
        .unwrap();

    assert!(scanner.toggle_light().unwrap());
    assert!(scanner.toggle_zoom());
    assert!(!scanner.toggle_zoom());

    let state = scanner.state();
    assert!(state.is_light_on);
    assert!(!state.is_zoomed);

    let events: Vec<CallbackEvent> = log.events.lock().unwrap().iter().map(|(e, _)| *e).collect();
    assert_eq!(
        events,
        vec![
            CallbackEvent::LightOn,
            CallbackEvent::ZoomIn,
            CallbackEvent::ZoomOut,
        ]
    );
}

#[test]
fn fast_forward_runs_until_stopped() {
    let mut scanner = fast_builder().writer(MemoryWriter::new()).build().unwrap();

    scanner.fast_forward().unwrap();
    assert!(scanner.state().is_fast_forwarding);

    std::thread::sleep(Duration::from_millis(100));
    scanner.stop();

    let deadline = Instant::now() + Duration::from_secs(5);
    while scanner.state().is_fast_forwarding {
        assert!(Instant::now() < deadline, "fast-forward never stopped");
        std::thread::sleep(Duration::from_millis(10));
    }

    // Transport is free again.
    scanner.advance().unwrap();
}

struct BlockingNotifier;

impl Notifier for BlockingNotifier {
    fn send(&self, _message: &str) -> HwResult<()> {
        Err("smtp unreachable".into())
    }
}

#[test]
fn notification_failure_does_not_fail_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MemoryWriter::new();
    let mut scanner = fast_builder()
        .writer(writer.clone())
        .notifier(Arc::new(BlockingNotifier))
        .build()
        .unwrap();

    scanner.start_scan(dir.path().to_path_buf(), 2, 0).unwrap();
    let end = scanner.wait_scan().unwrap();

    assert_eq!(end, ScanEndInfo::Completed { frames: 2 });
    assert_eq!(writer.saved_paths().len(), 2);
}
