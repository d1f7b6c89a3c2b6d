//! Run reporting: summary log lines, console colors and the daily CSV
//!
//! Per-probe lines are written by the runners as they go. This module adds
//! what is known only once a run is finished.

mod colored;
pub mod csv;

pub use self::colored::ColorScheme;
pub use csv::{CsvExporter, CsvSchema};

use crate::{
    logging::{LogLevel, Logger},
    models::{Config, TestSummary},
};
use std::path::PathBuf;
use std::sync::Arc;

/// Writes the end-of-run summary line and appends the CSV row
pub struct Reporter {
    logger: Arc<Logger>,
    exporter: CsvExporter,
}

impl Reporter {
    pub fn new(logger: Arc<Logger>, exporter: CsvExporter) -> Self {
        Self { logger, exporter }
    }

    /// Reporter writing into the configured log directory
    pub fn for_config(logger: Arc<Logger>, config: &Config) -> Self {
        let schema = CsvSchema::from_endpoints(&config.endpoints);
        Self::new(logger, CsvExporter::new(&config.log_dir, schema))
    }

    /// Report a finished run. Export failures are logged, never returned.
    pub fn report(&self, summary: &TestSummary, run_number: u32) -> Option<PathBuf> {
        let level = if summary.failed == 0 && summary.total > 0 {
            LogLevel::Success
        } else {
            LogLevel::Warning
        };
        self.logger
            .log(
                level,
                format!(
                    "Run {} complete: {}/{} ({:.1}%)",
                    run_number,
                    summary.passed,
                    summary.total,
                    summary.success_rate()
                ),
            )
            .log();

        for endpoint in summary.endpoints.iter().filter(|e| e.short_circuited) {
            self.logger
                .debug(format!("{} was skipped after DNS failure", endpoint.host))
                .log();
        }

        match self.exporter.export_summary(summary) {
            Ok(path) => {
                self.logger
                    .debug(format!("Summary appended to {}", path.display()))
                    .log();
                Some(path)
            }
            Err(e) => {
                self.logger.warning("CSV export failed").error_info(&e).log();
                None
            }
        }
    }
}

/// Startup banner lines: version, session, targets and output paths
pub fn banner_lines(config: &Config, logger: &Logger, csv_dir: &std::path::Path) -> Vec<String> {
    let log_path = logger
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(console only)".to_string());

    vec![
        crate::version_line(),
        format!("Session: {}", logger.session_id()),
        format!("Endpoints: {}", config.endpoints.join(", ")),
        format!("Interval: {} minute(s)", config.interval_minutes),
        format!("Log file: {}", log_path),
        format!("CSV directory: {}", csv_dir.display()),
    ]
}

/// Print the banner to the console header-colored and mirror it to the log
pub fn print_banner(config: &Config, logger: &Logger, csv_dir: &std::path::Path) {
    let lines = banner_lines(config, logger, csv_dir);
    if let Some(title) = lines.first() {
        println!("{}", logger.scheme().header(title, logger.use_color()));
    }
    for line in &lines {
        logger.info(line.as_str()).log();
    }
}
