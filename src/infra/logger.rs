// ============================================================
// Layer 6 — Logger
// ============================================================
// One tracing subscriber per process, installed from the run
// config. Everything logged afterwards goes to two places:
//
//   stderr                                      (coloured)
//   <log_dir>/<model>-<dataset>-<timestamp>.log (plain)
//
// The level comes from RUST_LOG when set, otherwise from the
// config key `state` (INFO, DEBUG, ...).

use colored::{Color, Colorize};
use std::{
    fs,
    path::PathBuf,
    sync::{Mutex, OnceLock},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::RecResult;
use crate::infra::config::Config;

static LOG_FILE: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Install the process-wide subscriber. Returns the log file path.
///
/// Only the first call installs anything; later calls return the
/// path chosen by the first one.
pub fn init_logger(config: &Config) -> RecResult<Option<PathBuf>> {
    if let Some(existing) = LOG_FILE.get() {
        return Ok(existing.clone());
    }

    fs::create_dir_all(&config.log_dir)?;
    let stamp = chrono::Local::now().format("%b-%d-%Y_%H-%M-%S");
    let path  = config
        .log_dir
        .join(format!("{}-{}-{}.log", config.model, config.dataset, stamp));
    let file  = fs::File::create(&path)?;

    let level  = config.state.to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,fairrec={level}")));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .is_ok();

    let chosen = if installed {
        Some(path)
    } else {
        // Someone else owns the global subscriber
        fs::remove_file(&path).ok();
        None
    };
    let _ = LOG_FILE.set(chosen);
    Ok(LOG_FILE.get().cloned().flatten())
}

/// Wrap `text` in a bold ANSI colour. Unknown colour names render white.
pub fn set_color(text: &str, color: &str) -> String {
    text.color(Color::from(color)).bold().to_string()
}
