//! photoindex - keeps a photo catalog in sync with a set of folders.
//!
//! ## Usage
//!
//! ```bash
//! photoindex                       # Scan every hour until interrupted
//! photoindex --once                # Run a single scan cycle and exit
//! photoindex -c indexer.toml -f /mnt/photos
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use photoindex::{logging, shutdown_channel, Config, ScanLoop, ShutdownTrigger};

#[derive(Default)]
struct Args {
    config_path: Option<PathBuf>,
    extra_folders: Vec<PathBuf>,
    log_dir: Option<PathBuf>,
    once: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photoindex {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--once" | "-1" => {
                parsed.once = true;
            }
            "--config" | "-c" | "--folder" | "-f" | "--log-dir" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: {} requires a path argument", args[i]);
                    std::process::exit(1);
                };
                let value = PathBuf::from(value);
                match args[i].as_str() {
                    "--config" | "-c" => parsed.config_path = Some(value),
                    "--folder" | "-f" => parsed.extra_folders.push(value),
                    _ => parsed.log_dir = Some(value),
                }
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"photoindex - Background photo catalog indexer

USAGE:
    photoindex [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --folder, -f PATH   Additional root folder to scan (repeatable)
    --once, -1          Run one scan cycle and exit
    --log-dir PATH      Write logs to daily files in PATH
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOINDEX_CONFIG   Path to config file (overrides default location)
    PHOTOINDEX_LOG      Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photoindex/config.toml"#
    );
}

/// Fire `trigger` on Ctrl-C, or SIGTERM on unix.
async fn forward_signals(trigger: ShutdownTrigger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown requested, finishing current file");
    trigger.trigger();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    logging::init(args.log_dir.clone())?;

    let mut config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.folders.extend(args.extra_folders);
    config.validate().context("Invalid configuration")?;

    info!(
        "photoindex {} starting: database {:?}, thumbnails {:?}",
        env!("CARGO_PKG_VERSION"),
        config.db_path,
        config.thumbnails_path
    );

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(forward_signals(trigger));

    let mut scan_loop = ScanLoop::new(&config);
    let totals = if args.once {
        scan_loop.run_once(shutdown).await?
    } else {
        scan_loop.run(shutdown).await?
    };

    info!("photoindex stopped ({})", totals);
    Ok(())
}
