//! Console logging for kpipe
//!
//! Two outputs share one verbosity level: the colored user-facing helpers in
//! this crate, and `tracing` events from the library crates, which go through
//! the subscriber installed by [`init_with_verbosity`]. Everything is written
//! to stderr so stdout stays a clean document stream.

use colored::Colorize;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static VERBOSITY: Mutex<u8> = Mutex::new(0);
static QUIET: Mutex<bool> = Mutex::new(false);

/// Get the current verbosity level
pub fn get_verbosity() -> u8 {
    VERBOSITY.lock().ok().map(|v| *v).unwrap_or(0)
}

pub fn set_verbosity(verbosity: u8) {
    if let Ok(mut v) = VERBOSITY.lock() {
        *v = verbosity;
    }
}

/// Whether non-error output is suppressed
pub fn get_quiet() -> bool {
    QUIET.lock().ok().map(|v| *v).unwrap_or(false)
}

pub fn set_quiet(quiet: bool) {
    if let Ok(mut v) = QUIET.lock() {
        *v = quiet;
    }
}

/// Default `tracing` filter for a verbosity level.
/// 0 = warn only, 1 = debug (-v), 2 = trace (-vv)
pub fn verbosity_to_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "kpipe=debug,kpipe_kio=debug,kpipe_yaml=debug,warn",
        _ => "trace",
    }
}

/// Record the verbosity and install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity-derived filter. Fails if a
/// subscriber is already installed.
pub fn init_with_verbosity(verbosity: u8, quiet: bool) -> Result<(), String> {
    set_verbosity(verbosity);
    set_quiet(quiet);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_filter(verbosity)));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| format!("Failed to initialize logger: {}", e))
}

/// Log an informational message (to console if verbose >= 1)
pub fn info(message: &str) {
    if get_verbosity() >= 1 {
        eprintln!("{}", message);
    }
}

/// Log a debug message (to console if verbose >= 1)
pub fn debug(message: &str) {
    if get_verbosity() >= 1 {
        eprintln!("{} {}", "DEBUG:".blue().bold(), message);
    }
}

/// Log a warning message unless quiet
pub fn warn(message: &str) {
    if !get_quiet() {
        eprintln!("{} {}", "warning:".yellow().bold(), message);
    }
}

/// Log an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// Log a success message unless quiet
pub fn success(message: &str) {
    if !get_quiet() {
        let check = "\u{2714}".green().bold();
        eprintln!("{} {}", check, message);
    }
}
