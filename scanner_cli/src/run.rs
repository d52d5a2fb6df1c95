//! Command execution: config mapping, device assembly and dispatch.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tracing::info;

use scanner_config::Config;
use scanner_traits::Camera;
use scanner_core::{ScanEndInfo, Scanner, ScannerBuilder, ScannerCallback, ScannerState};
use scanner_hardware::{FsFrameWriter, LogNotifier, SimulatedCamera, SimulatedFrameSensor,
    SimulatedLight, SimulatedStepDriver};

use crate::cli::{Cli, Commands};

pub fn execute(cli: Cli, cfg: Config) -> Result<()> {
    cfg.validate()?;
    let mut scanner = build_scanner(&cli, &cfg)?;

    match cli.cmd {
        Commands::SelfCheck => {
            scanner.advance()?;
            let state = scanner.state();
            println!(
                "self-check: ok (advanced 1 frame, {} mode)",
                if cli.hardware { "hardware" } else { "sim" }
            );
            info!(?state, "self-check passed");
            Ok(())
        }

        Commands::Status => {
            let s = scanner.state();
            let obj = serde_json::json!({
                "is_scanning": s.is_scanning,
                "is_advancing": s.is_advancing,
                "is_fast_forwarding": s.is_fast_forwarding,
                "is_light_on": s.is_light_on,
                "is_zoomed": s.is_zoomed,
                "current_frame_index": s.current_frame_index,
                "n_frames": s.n_frames,
                "output_directory": s.output_directory,
                "time_remaining_secs": s.time_remaining_secs,
                "last_scan_end": s.last_scan_end.map(|e| format!("{e:?}")),
            });
            println!("{obj}");
            Ok(())
        }

        Commands::Light => {
            let on = scanner.toggle_light()?;
            println!("light {}", if on { "on" } else { "off" });
            Ok(())
        }

        Commands::Advance { frames } => {
            for _ in 0..frames {
                scanner.advance()?;
            }
            println!("advanced {frames} frame(s)");
            Ok(())
        }

        Commands::FastForward { seconds } => {
            let stop = scanner.stop_handle();
            ctrlc::set_handler(move || stop.stop())
                .wrap_err("failed to install Ctrl-C handler")?;
            scanner.fast_forward()?;
            if let Some(secs) = seconds {
                std::thread::sleep(Duration::from_secs(secs));
                scanner.stop();
            }
            // Dropping the scanner joins the fast-forward thread.
            drop(scanner);
            println!("fast-forward finished");
            Ok(())
        }

        Commands::Scan {
            output,
            frames,
            start_index,
        } => {
            if start_index >= frames {
                return Err(eyre::eyre!(
                    "start index {start_index} leaves nothing to scan (total frames: {frames})"
                ));
            }
            let stop = scanner.stop_handle();
            ctrlc::set_handler(move || stop.stop())
                .wrap_err("failed to install Ctrl-C handler")?;
            scanner.start_scan(output.clone(), frames, start_index)?;
            match scanner.wait_scan() {
                Some(ScanEndInfo::Completed { frames }) => {
                    println!("Finished scanning {frames} frames into {}", output.display());
                    Ok(())
                }
                Some(ScanEndInfo::Stopped { frames }) => {
                    println!("Stopped after {frames} frames");
                    Ok(())
                }
                Some(ScanEndInfo::Failed {
                    frame_index,
                    message,
                }) => Err(eyre::eyre!("scan failed at frame {frame_index}: {message}")),
                None => Err(eyre::eyre!("scan session never produced an outcome")),
            }
        }
    }
}

/// Per-frame progress lines for interactive scans.
struct ScanProgress;

impl ScannerCallback for ScanProgress {
    fn on_frame_captured(&self, state: &ScannerState) {
        match state.time_remaining_secs {
            Some(eta) => println!(
                "frame {}/{} (about {:.0}s left)",
                state.current_frame_index, state.n_frames, eta
            ),
            None => println!("frame {}/{}", state.current_frame_index, state.n_frames),
        }
    }
}

fn build_scanner(cli: &Cli, cfg: &Config) -> Result<Scanner> {
    let mut builder = ScannerBuilder::new()
        .transport_cfg((&cfg.transport).into())
        .recovery_cfg((&cfg.recovery).into())
        .scan_cfg((&cfg.scan).into())
        .liveview_cfg((&cfg.live_view).into())
        .writer(Arc::new(FsFrameWriter::new()))
        .notifier(Arc::new(LogNotifier));

    // Structured output keeps stdout machine-readable.
    if !cli.json {
        builder = builder.callback(Arc::new(ScanProgress));
    }

    let builder = if cli.hardware {
        attach_gpio(builder, cfg)?
    } else {
        attach_sim(builder, cfg)
    };

    Ok(builder.build()?)
}

fn attach_sim(builder: ScannerBuilder, cfg: &Config) -> ScannerBuilder {
    let mut camera = SimulatedCamera::new();
    let _ = camera.set_resolution(cfg.camera.width, cfg.camera.height);
    let frame_period = Duration::from_secs_f64(cfg.transport.frame_period_s);
    builder
        .driver(Box::new(SimulatedStepDriver::new()))
        .sensor(Box::new(SimulatedFrameSensor::for_frame_period(frame_period)))
        .camera(Box::new(camera))
        .light(Box::new(SimulatedLight::new()))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn attach_gpio(builder: ScannerBuilder, cfg: &Config) -> Result<ScannerBuilder> {
    use scanner_hardware::gpio::{GpioFrameSensor, GpioLight, GpioStepDriver};

    let driver = GpioStepDriver::new(
        cfg.pins.motor_enable,
        cfg.pins.motor_direction,
        cfg.pins.motor_step,
    )
    .map_err(|e| eyre::eyre!("failed to open motor pins: {e}"))?;
    let sensor = GpioFrameSensor::new(cfg.pins.sensor_input)
        .map_err(|e| eyre::eyre!("failed to open sensor pin: {e}"))?;
    let light = GpioLight::new(cfg.pins.light_switch)
        .map_err(|e| eyre::eyre!("failed to open light pin: {e}"))?;

    // No camera backend on GPIO yet; capture stays simulated.
    let mut camera = SimulatedCamera::new();
    let _ = camera.set_resolution(cfg.camera.width, cfg.camera.height);

    Ok(builder
        .driver(Box::new(driver))
        .sensor(Box::new(sensor))
        .camera(Box::new(camera))
        .light(Box::new(light)))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn attach_gpio(_builder: ScannerBuilder, _cfg: &Config) -> Result<ScannerBuilder> {
    eyre::bail!("this build has no hardware support; rebuild with --features hardware")
}
