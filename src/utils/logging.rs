//! Module-gated logging macros and a scope timer.
//!
//! Each module that logs through these macros defines its own switch:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_info};
//! ```
//! so noisy modules can be silenced without touching `RUST_LOG`.

use std::time::Instant;

use log::LevelFilter;

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Logs how long a named phase took when dropped.
///
/// ```ignore
/// let _scope = ScopeTimer::new("zoom:getting-states");
/// ```
pub struct ScopeTimer {
    label: &'static str,
    started: Instant,
}

impl ScopeTimer {
    pub fn new(label: &'static str) -> Self {
        log::trace!("{label}: start");
        Self {
            label,
            started: Instant::now(),
        }
    }
}

impl Drop for ScopeTimer {
    fn drop(&mut self) {
        log::debug!(
            "{}: {}us",
            self.label,
            self.started.elapsed().as_micros()
        );
    }
}

/// Initializes `env_logger` from `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    init_logging_at(LevelFilter::Info);
}

/// Like [`init_logging`] with another default level. `RUST_LOG` still wins.
pub fn init_logging_at(level: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
