//! Line-oriented logging for the connectivity monitor
//!
//! Every entry is rendered once as `[yyyy-MM-dd HH:mm:ss] [LEVEL] message`.
//! The plain rendering is appended to the session log file and flushed
//! immediately; the console gets the same line colored by level, with
//! warnings and errors on stderr.

use crate::error::{AppError, Result};
use crate::models::{Config, Finding, Verdict};
use crate::output::ColorScheme;
use crate::types::Severity;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Console-only diagnostics, shown with `--debug`
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    fn to_stderr(&self) -> bool {
        *self >= LogLevel::Warning
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "SUCCESS" => Ok(LogLevel::Success),
            "WARN" | "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

impl From<Severity> for LogLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Success => LogLevel::Success,
            Severity::Warning => LogLevel::Warning,
            Severity::Error => LogLevel::Error,
            Severity::Info => LogLevel::Info,
        }
    }
}

/// One log line before rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    /// Trailing `key=value` pairs
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    fn body(&self) -> String {
        if self.fields.is_empty() {
            return self.message.clone();
        }
        let fields: Vec<String> = self.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{} ({})", self.message, fields.join(", "))
    }

    fn stamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Plain rendering, as written to the log file
    pub fn render(&self) -> String {
        format!("[{}] [{}] {}", self.stamp(), self.level.as_str(), self.body())
    }
}

/// Session logger writing to the console and an append-only file
pub struct Logger {
    use_color: bool,
    debug: bool,
    /// Mirror entries to the terminal
    echo: bool,
    scheme: ColorScheme,
    session_id: String,
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
    /// Set once the file sink has failed and stderr was told
    file_failed: AtomicBool,
}

impl Logger {
    /// Console-only logger
    pub fn new(use_color: bool, debug: bool) -> Self {
        Self {
            use_color,
            debug,
            echo: true,
            scheme: ColorScheme::default(),
            session_id: Uuid::new_v4().to_string(),
            file: None,
            path: None,
            file_failed: AtomicBool::new(false),
        }
    }

    /// Logger that also appends to `path`, creating it if needed
    pub fn with_file<P: AsRef<Path>>(path: P, use_color: bool, debug: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::io(format!("Cannot open log file {}: {}", path.display(), e)))?;

        Ok(Self {
            file: Some(Mutex::new(file)),
            path: Some(path),
            ..Self::new(use_color, debug)
        })
    }

    /// Session logger for a run of the monitor: `AVD_Monitor_<yyyyMMdd_HHmmss>.log`
    /// in the configured log directory
    pub fn for_config(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.log_dir).map_err(|e| {
            AppError::io(format!("Cannot create log directory {}: {}", config.log_dir.display(), e))
        })?;
        let name = format!("AVD_Monitor_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        Self::with_file(config.log_dir.join(name), config.enable_color, config.debug)
    }

    /// Stop mirroring entries to the terminal
    pub fn silent(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    pub fn scheme(&self) -> &ColorScheme {
        &self.scheme
    }

    /// Create a log entry builder
    pub fn log<S: Into<String>>(&self, level: LogLevel, message: S) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.into())
    }

    pub fn debug<S: Into<String>>(&self, message: S) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info<S: Into<String>>(&self, message: S) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn success<S: Into<String>>(&self, message: S) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Success, message)
    }

    pub fn warning<S: Into<String>>(&self, message: S) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warning, message)
    }

    pub fn error<S: Into<String>>(&self, message: S) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Write one line at `level` with no extra fields
    pub fn log_line(&self, message: &str, level: LogLevel) {
        self.log(level, message).log();
    }

    /// Log a classified verdict at the level its severity maps to
    pub fn verdict(&self, context: &str, verdict: &Verdict) {
        self.log(verdict.severity.into(), format!("{} - {}", context, verdict.label))
            .log();
    }

    pub fn finding(&self, finding: &Finding) {
        self.log(finding.severity.into(), finding.message.as_str()).log();
    }

    /// Whether a level would be output anywhere
    pub fn would_log(&self, level: LogLevel) -> bool {
        level != LogLevel::Debug || self.debug
    }

    fn write_entry(&self, entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        // debug output never reaches the file
        if entry.level != LogLevel::Debug {
            if let Some(file) = &self.file {
                let written = match file.lock() {
                    Ok(mut file) => writeln!(file, "{}", entry.render())
                        .and_then(|_| file.flush())
                        .map_err(|e| e.to_string()),
                    Err(_) => Err("log file lock poisoned".to_string()),
                };
                if let Err(reason) = written {
                    self.report_file_failure(&reason);
                }
            }
        }

        if self.echo {
            let output = self.format_console(&entry);
            if entry.level.to_stderr() {
                let _ = writeln!(io::stderr(), "{}", output);
            } else {
                let _ = writeln!(io::stdout(), "{}", output);
            }
        }
    }

    /// Tell stderr about the first failed file write; later ones stay quiet
    fn report_file_failure(&self, reason: &str) {
        if self.file_failed.swap(true, Ordering::Relaxed) {
            return;
        }
        let path = self
            .path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let _ = writeln!(io::stderr(), "Cannot write to log file {}: {}", path, reason);
    }

    /// Format log entry for console output
    fn format_console(&self, entry: &LogEntry) -> String {
        if !self.use_color {
            return entry.render();
        }
        let level = format!("[{}]", entry.level.as_str());
        format!(
            "[{}] {} {}",
            entry.stamp(),
            self.scheme.paint(&level, entry.level, true),
            self.scheme.paint(&entry.body(), entry.level, true)
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Local::now(),
                level,
                message,
                fields: Vec::new(),
            },
        }
    }

    /// Append a `key=value` pair to the line
    pub fn field<T: Display>(mut self, key: &str, value: T) -> Self {
        self.entry.fields.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach an error's category and message
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("category", error.category()).field("error", error)
    }

    /// Finalize and write the log entry
    pub fn log(self) {
        self.logger.write_entry(self.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::types::{Measurement, MetricKind};
    use regex::Regex;
    use tempfile::TempDir;

    fn file_logger(dir: &TempDir) -> Logger {
        Logger::with_file(dir.path().join("test.log"), true, false)
            .unwrap()
            .silent()
    }

    fn read_lines(logger: &Logger) -> Vec<String> {
        fs::read_to_string(logger.path().unwrap())
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("SUCCESS".parse::<LogLevel>().unwrap(), LogLevel::Success);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_severity_maps_to_level() {
        assert_eq!(LogLevel::from(Severity::Success), LogLevel::Success);
        assert_eq!(LogLevel::from(Severity::Warning), LogLevel::Warning);
        assert_eq!(LogLevel::from(Severity::Error), LogLevel::Error);
        assert_eq!(LogLevel::from(Severity::Info), LogLevel::Info);
    }

    #[test]
    fn test_file_line_format() {
        let dir = TempDir::new().unwrap();
        let logger = file_logger(&dir);
        logger.log_line("Monitoring started", LogLevel::Info);
        logger.error("DNS resolution failed").log();

        let lines = read_lines(&logger);
        let pattern = Regex::new(r"^\[\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\] \[(INFO|ERROR)\] .+$").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| pattern.is_match(l)), "{:?}", lines);
        assert!(lines[0].ends_with("[INFO] Monitoring started"));
    }

    #[test]
    fn test_file_has_no_ansi_codes() {
        let dir = TempDir::new().unwrap();
        let logger = file_logger(&dir);
        logger.warning("Packet loss elevated").field("host", "a.example.com").log();

        let content = fs::read_to_string(logger.path().unwrap()).unwrap();
        assert!(!content.contains('\x1b'));
        assert!(content.contains("[WARNING] Packet loss elevated (host=a.example.com)"));
    }

    #[test]
    fn test_debug_lines_stay_off_the_file() {
        let dir = TempDir::new().unwrap();
        let debug_logger = Logger::with_file(dir.path().join("debug.log"), false, true)
            .unwrap()
            .silent();
        debug_logger.debug("probe detail").log();
        debug_logger.info("kept").log();

        let lines = read_lines(&debug_logger);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("kept"));
    }

    #[test]
    fn test_append_keeps_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("append.log");
        fs::write(&path, "existing line\n").unwrap();

        let logger = Logger::with_file(&path, false, false).unwrap().silent();
        logger.success("new line").log();

        let lines = read_lines(&logger);
        assert_eq!(lines[0], "existing line");
        assert!(lines[1].ends_with("[SUCCESS] new line"));
    }

    #[test]
    fn test_verdict_uses_severity_level() {
        let dir = TempDir::new().unwrap();
        let logger = file_logger(&dir);
        let verdict = classify(MetricKind::Latency, Some(Measurement::DurationMs(250.0)));
        logger.verdict("rdweb.wvd.microsoft.com", &verdict);

        let lines = read_lines(&logger);
        assert!(lines[0].ends_with("[ERROR] rdweb.wvd.microsoft.com - Latency: 250.00ms (POOR)"));
    }

    #[test]
    fn test_for_config_names_session_file() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            log_dir: dir.path().join("logs"),
            ..Config::default()
        };
        let logger = Logger::for_config(&config).unwrap().silent();
        let name = logger.path().unwrap().file_name().unwrap().to_string_lossy().into_owned();

        let pattern = Regex::new(r"^AVD_Monitor_\d{8}_\d{6}\.log$").unwrap();
        assert!(pattern.is_match(&name), "{}", name);
        assert_eq!(Uuid::parse_str(logger.session_id()).map(|_| ()).ok(), Some(()));
    }

    #[test]
    fn test_failed_file_write_is_flagged_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readonly.log");
        fs::write(&path, "").unwrap();
        let logger = Logger {
            file: Some(Mutex::new(File::open(&path).unwrap())),
            path: Some(path.clone()),
            ..Logger::new(false, false).silent()
        };

        logger.info("first").log();
        assert!(logger.file_failed.load(Ordering::Relaxed));
        logger.info("second").log();
        assert!(fs::read_to_string(&path).unwrap().is_empty());
    }

    #[test]
    fn test_healthy_file_sink_is_not_flagged() {
        let dir = TempDir::new().unwrap();
        let logger = file_logger(&dir);
        logger.info("ok").log();
        assert!(!logger.file_failed.load(Ordering::Relaxed));
    }
}
