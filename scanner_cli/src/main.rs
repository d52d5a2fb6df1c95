mod cli;
mod error_fmt;
mod run;

use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use cli::{Cli, FILE_GUARD, JSON_MODE};

fn main() {
    let code = match try_main() {
        Ok(()) => 0,
        Err(err) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", error_fmt::format_error_json(&err));
            } else {
                eprintln!("{}", error_fmt::humanize(&err));
            }
            error_fmt::exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}

fn try_main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    // A missing config file is fine; the calibrated defaults apply.
    let cfg = if cli.config.exists() {
        scanner_config::load_config(&cli.config)
            .wrap_err_with(|| format!("failed to load {}", cli.config.display()))?
    } else {
        scanner_config::Config::default()
    };

    init_tracing(&cli, &cfg.logging);
    run::execute(cli, cfg)
}

/// Console logging filtered by `--log-level` (RUST_LOG wins), plus an
/// optional JSON-lines file sink from the `[logging]` config section.
fn init_tracing(cli: &Cli, logging: &scanner_config::Logging) {
    let level = logging
        .level
        .clone()
        .unwrap_or_else(|| cli.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_pretty = (!cli.json).then(|| fmt::layer().with_target(false));
    let console_json = cli.json.then(|| fmt::layer().json());

    let file_layer = logging.file.as_ref().map(|file| {
        let path = Path::new(file);
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "filmscan.log".into());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_pretty)
        .with(console_json)
        .with(file_layer)
        .init();
}
