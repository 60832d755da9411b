//! Logging setup for the Weft query engine.
//!
//! The engine emits structured `tracing` events: relationship resolution,
//! chain partitioning, compiled SQL, row counts per statement and link
//! conflicts. Nothing is printed unless a subscriber is installed, either by
//! the application or through [`init`] (requires the `tracing-subscriber`
//! feature).
//!
//! # Environment Variables
//!
//! - `WEFT_DEBUG=true|1|yes` - enable debug-level logging
//! - `WEFT_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `WEFT_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! use weft_query::logging;
//!
//! logging::init();
//! ```

use std::env;
use std::str::FromStr;
use std::sync::Once;

static INIT: Once = Once::new();

/// Output format of the bundled subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            _ => Err(()),
        }
    }
}

/// Logging settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Whether `WEFT_DEBUG` is switched on.
    pub debug: bool,
    /// Explicitly requested level, if any.
    pub level: Option<&'static str>,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = lookup("WEFT_DEBUG")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        let level = lookup("WEFT_LOG_LEVEL").and_then(|v| parse_level(&v));
        let format = lookup("WEFT_LOG_FORMAT")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Self {
            debug,
            level,
            format,
        }
    }

    /// The effective level: explicit level, else `debug` when debugging, else `warn`.
    pub fn effective_level(&self) -> &'static str {
        match self.level {
            Some(level) => level,
            None if self.debug => "debug",
            None => "warn",
        }
    }

    /// Whether the user asked for any logging at all.
    pub fn is_requested(&self) -> bool {
        self.debug || self.level.is_some()
    }
}

fn parse_level(value: &str) -> Option<&'static str> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// Check if debug logging is enabled via `WEFT_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    LogSettings::from_env().debug
}

/// Initialize the Weft logging system.
///
/// Subsequent calls are no-ops. Without `WEFT_DEBUG` or `WEFT_LOG_LEVEL`
/// nothing is installed, so an application subscriber is left alone.
pub fn init() {
    INIT.call_once(|| {
        let settings = LogSettings::from_env();
        if !settings.is_requested() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = settings.effective_level();
            let filter = EnvFilter::try_new(format!("weft={},weft_query={}", level, level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match settings.format {
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                LogFormat::Compact => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                LogFormat::Pretty => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level = level, format = ?settings.format, "Weft logging initialized");
            }
        }
    });
}

/// Initialize logging at an explicit level, ignoring `WEFT_LOG_LEVEL`.
///
/// Unknown level names fall back to `warn`.
#[cfg(feature = "tracing-subscriber")]
pub fn init_with_level(level: &str) {
    INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let level = parse_level(level).unwrap_or("warn");
        let filter = EnvFilter::new(format!("weft={},weft_query={}", level, level));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init();
    });
}

/// Initialize debug-level logging.
#[cfg(feature = "tracing-subscriber")]
pub fn init_debug() {
    init_with_level("debug");
}

/// Debug event that is only emitted when `WEFT_DEBUG` is enabled at runtime.
#[macro_export]
macro_rules! weft_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Trace event that is only emitted when `WEFT_DEBUG` is enabled at runtime.
#[macro_export]
macro_rules! weft_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}
