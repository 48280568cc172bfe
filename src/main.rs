//! globalxact-recover - administrative recovery entry point
//!
//! Two modes:
//!   globalxact-recover <log-file>              resolve one txnset log
//!   globalxact-recover --scan <data-dir>        resolve every log under
//!                                               <data-dir>/extglobalxact/
//!
//! This binary exists for the case the background worker spawned
//! in-process by [`globalxact::Coordinator`] never got a chance to run to
//! completion (e.g. the host process was killed outright). Pointing it at
//! a stale log or data directory is always safe: an already-resolved log
//! is simply gone, and resolving an in-progress one is idempotent.

use std::path::PathBuf;
use std::thread::JoinHandle;

use log::{error, info};

use globalxact::log::LOG_DIR_NAME;
use globalxact::{RecoveryConfig, RecoveryWorker};

fn print_usage() {
    println!("globalxact-recover - resolve an incomplete txnset log");
    println!();
    println!("Usage:");
    println!("  globalxact-recover <log-file>");
    println!("  globalxact-recover --scan <data-dir>");
    println!();
    println!("Options:");
    println!("  -i, --retry-interval-ms MS   Pause between retry passes (default: 1000)");
    println!("  -h, --help                   Show this help");
}

fn spawn_for_path(path: PathBuf, config: RecoveryConfig) -> JoinHandle<()> {
    std::thread::spawn(move || match RecoveryWorker::from_log(path.clone(), config) {
        Ok(worker) => worker.run(),
        Err(e) => error!("could not parse {}: {}", path.display(), e),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut retry_interval_ms: u64 = 1000;
    let mut scan_dir: Option<PathBuf> = None;
    let mut log_file: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scan" => {
                if i + 1 < args.len() {
                    scan_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--retry-interval-ms" | "-i" => {
                if i + 1 < args.len() {
                    retry_interval_ms = args[i + 1].parse()?;
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                if log_file.is_none() {
                    log_file = Some(PathBuf::from(other));
                }
            }
        }
        i += 1;
    }

    let config = RecoveryConfig {
        retry_interval: std::time::Duration::from_millis(retry_interval_ms),
    };

    let mut handles = Vec::new();

    if let Some(dir) = scan_dir {
        let log_dir = dir.join(LOG_DIR_NAME);
        let entries = std::fs::read_dir(&log_dir)?;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                info!("scanning {}", entry.path().display());
                handles.push(spawn_for_path(entry.path(), config.clone()));
            }
        }
        if handles.is_empty() {
            info!("no txnset logs found under {}", log_dir.display());
        }
    } else if let Some(path) = log_file {
        handles.push(spawn_for_path(path, config));
    } else {
        print_usage();
        return Ok(());
    }

    for handle in handles {
        if handle.join().is_err() {
            error!("a recovery worker thread panicked");
        }
    }

    Ok(())
}
