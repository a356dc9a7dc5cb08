//! Centralized logging configuration for the Pagecast binaries
//!
//! Provides consistent logging setup with support for:
//! - Text, JSON, and pretty-printed output
//! - Environment variable configuration
//! - An optional append-only log file alongside stderr
//!
//! # Examples
//!
//! ```no_run
//! use libpagecast::logging::{LoggingConfig, LogFormat};
//!
//! let config = LoggingConfig::new(LogFormat::Json, "info".to_string(), false);
//! config.init().expect("logging");
//! ```

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSection;

pub const ENV_LOG_FORMAT: &str = "PAGECAST_LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "PAGECAST_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Configuration for logging initialization
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
    /// Append to this file instead of writing to stderr
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Create a new logging configuration
    ///
    /// # Arguments
    ///
    /// * `format` - Log output format (text, json, or pretty)
    /// * `level` - Minimum log level (error, warn, info, debug, trace)
    /// * `verbose` - If true, defaults to debug level
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
            file: None,
        }
    }

    pub fn with_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }

    fn filter(&self) -> EnvFilter {
        let fallback = if self.verbose { "debug" } else { self.level.as_str() };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    }

    /// Initialize logging with the configured settings
    ///
    /// Call once at the start of the program. Events always go to stderr and
    /// are also appended to the log file when one is set. Fails only when the
    /// log file cannot be opened.
    ///
    /// # Panics
    ///
    /// Panics if the logging subscriber has already been initialized
    pub fn init(&self) -> std::io::Result<()> {
        let filter = self.filter();

        let (writer, ansi) = match &self.file {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                // Every event goes to stderr and the file
                (BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file))), false)
            }
            None => (BoxMakeWriter::new(std::io::stderr), true),
        };

        match self.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_target(true)
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(ansi)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
                    .with_level(true)
                    .init();
            }
        }

        Ok(())
    }
}

/// Read format and level from `PAGECAST_LOG_FORMAT` / `PAGECAST_LOG_LEVEL`
///
/// Falls back to text format with info level if not set.
pub fn config_from_env() -> LoggingConfig {
    config_from_section(&LoggingSection::default())
}

/// Combine the `[logging]` config section with the environment
///
/// Environment variables win over the file; an unparseable format falls
/// back to text.
pub fn config_from_section(section: &LoggingSection) -> LoggingConfig {
    let format = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .or_else(|| section.format.clone())
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level = std::env::var(ENV_LOG_LEVEL)
        .ok()
        .or_else(|| section.level.clone())
        .unwrap_or_else(|| "info".to_string());

    LoggingConfig::new(format, level, false).with_file(section.file.as_deref().map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_from_str_invalid() {
        let result = "xml".parse::<LogFormat>();
        assert!(result.unwrap_err().contains("Invalid log format: 'xml'"));
    }

    #[test]
    fn test_log_format_display_round_trips() {
        for format in [LogFormat::Text, LogFormat::Json, LogFormat::Pretty] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_logging_config_with_file() {
        let config = LoggingConfig::new(LogFormat::Text, "warn".to_string(), true)
            .with_file(Some(PathBuf::from("/tmp/pagecast.log")));
        assert!(config.verbose);
        assert_eq!(config.level, "warn");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/pagecast.log")));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var(ENV_LOG_FORMAT, "json");
        std::env::set_var(ENV_LOG_LEVEL, "debug");

        let config = config_from_env();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "debug");

        std::env::remove_var(ENV_LOG_FORMAT);
        std::env::remove_var(ENV_LOG_LEVEL);

        let config = config_from_env();
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.level, "info");
    }

    #[test]
    #[serial]
    fn test_config_from_section_env_wins() {
        std::env::remove_var(ENV_LOG_FORMAT);
        std::env::set_var(ENV_LOG_LEVEL, "trace");

        let section = LoggingSection {
            format: Some("json".to_string()),
            level: Some("warn".to_string()),
            file: Some("/var/log/pagecast.log".to_string()),
        };
        let config = config_from_section(&section);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "trace");
        assert_eq!(config.file, Some(PathBuf::from("/var/log/pagecast.log")));

        std::env::remove_var(ENV_LOG_LEVEL);
    }
}
