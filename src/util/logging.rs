//! Structured logging setup for irisflow
//!
//! Wraps `tracing-subscriber` with a small configuration struct. Output is
//! either human-readable or JSON, and `RUST_LOG` always wins when set.
//!
//! ```no_run
//! use irisflow::util::logging;
//!
//! logging::init_from_env();
//! tracing::info!(stage = "STEP1", "Stage started");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Noisy HTTP internals are held at warn unless `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: &str = "h2=warn,hyper=warn,hyper_util=warn,reqwest=warn";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for irisflow's own events
    pub level: Level,

    /// One JSON object per line instead of the console format
    pub use_json: bool,

    pub include_target: bool,

    /// File and line number of each event
    pub include_location: bool,

    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full event metadata, for log shipping.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            ..Default::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "irisflow={},{}",
                self.level.as_str().to_lowercase(),
                QUIET_DEPENDENCIES
            ))
        })
    }
}

/// Parses a level name case-insensitively. Unknown names fall back to INFO.
///
/// ```
/// use irisflow::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("DEBUG"), Level::DEBUG);
/// assert_eq!(parse_level("chatty"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Installs the global subscriber. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = config.filter();

        // events go to stderr so JSON reports on stdout stay machine-readable
        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Reads `IRISFLOW_LOG_LEVEL` and `IRISFLOW_LOG_JSON`.
pub fn init_from_env() {
    init_logging(config_from_env());
}

fn config_from_env() -> LoggingConfig {
    let level = env::var("IRISFLOW_LOG_LEVEL")
        .map(|v| parse_level(&v))
        .unwrap_or(Level::INFO);

    let use_json = env::var("IRISFLOW_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    LoggingConfig {
        level,
        use_json,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_presets() {
        let production = LoggingConfig::production();
        assert!(production.use_json);
        assert!(production.include_location);

        let development = LoggingConfig::development();
        assert_eq!(development.level, Level::DEBUG);
        assert!(!development.use_json);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("IRISFLOW_LOG_LEVEL", "trace");
        env::set_var("IRISFLOW_LOG_JSON", "true");
        let config = config_from_env();
        env::remove_var("IRISFLOW_LOG_LEVEL");
        env::remove_var("IRISFLOW_LOG_JSON");

        assert_eq!(config.level, Level::TRACE);
        assert!(config.use_json);

        let config = config_from_env();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
    }
}
