//! Daily append-only CSV summary

use crate::{
    error::Result,
    models::{EndpointResult, TestSummary},
    types::{Measurement, MetricKind},
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const SUMMARY_COLUMNS: [&str; 5] = ["Timestamp", "TotalTests", "PassedTests", "FailedTests", "SuccessRate"];

/// Per-endpoint columns: suffix and the metric feeding it
const ENDPOINT_COLUMNS: [(&str, MetricKind); 7] = [
    ("DNS", MetricKind::Dns),
    ("TCP443", MetricKind::Tcp443),
    ("HTTPS", MetricKind::Https),
    ("LatencyMs", MetricKind::Latency),
    ("PacketLossPct", MetricKind::PacketLoss),
    ("JitterMs", MetricKind::Jitter),
    ("StabilityPct", MetricKind::ConnectionStability),
];

/// Column layout, fixed once from the configured endpoint list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSchema {
    endpoints: Vec<(String, String)>,
}

impl CsvSchema {
    /// Column prefixes are the first DNS label; colliding labels fall back
    /// to the full host with dots replaced.
    pub fn from_endpoints(endpoints: &[String]) -> Self {
        let label = |host: &str| host.split('.').next().unwrap_or(host).to_string();

        let endpoints = endpoints
            .iter()
            .map(|host| {
                let short = label(host);
                let collides = endpoints.iter().filter(|other| label(other) == short).count() > 1;
                let prefix = if collides { host.replace('.', "_") } else { short };
                (host.clone(), prefix)
            })
            .collect();

        Self { endpoints }
    }

    pub fn header(&self) -> Vec<String> {
        let mut columns: Vec<String> = SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect();
        for (_, prefix) in &self.endpoints {
            columns.extend(ENDPOINT_COLUMNS.iter().map(|(suffix, _)| format!("{}_{}", prefix, suffix)));
        }
        columns
    }

    /// One row for a finished run; unmeasured values are empty cells
    pub fn row(&self, summary: &TestSummary) -> Vec<String> {
        let mut cells = vec![
            summary.run_started.format("%Y-%m-%d %H:%M:%S").to_string(),
            summary.total.to_string(),
            summary.passed.to_string(),
            summary.failed.to_string(),
            format!("{:.2}", summary.success_rate()),
        ];

        for (host, _) in &self.endpoints {
            let result = summary.endpoint(host);
            cells.extend(ENDPOINT_COLUMNS.iter().map(|(_, metric)| cell(result, *metric)));
        }
        cells
    }
}

fn cell(result: Option<&EndpointResult>, metric: MetricKind) -> String {
    let Some(verdict) = result.and_then(|r| r.verdict(metric)) else {
        return String::new();
    };
    match verdict.measurement {
        Some(Measurement::Reachable(_)) => verdict.grade.as_str().to_string(),
        Some(Measurement::Bytes(v)) | Some(Measurement::Count(v)) => v.to_string(),
        Some(m) => format!("{:.2}", m.as_f64()),
        None => String::new(),
    }
}

/// Quote a field when it holds a separator, quote or line break
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn to_line(fields: &[String]) -> String {
    let escaped: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    escaped.join(",")
}

/// Appends one row per run to `AVD_Summary_<date>.csv` in the target dir
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
    schema: CsvSchema,
}

impl CsvExporter {
    pub fn new<P: Into<PathBuf>>(dir: P, schema: CsvSchema) -> Self {
        Self { dir: dir.into(), schema }
    }

    /// File a run started at the given time belongs to
    pub fn path_for(&self, summary: &TestSummary) -> PathBuf {
        self.dir
            .join(format!("AVD_Summary_{}.csv", summary.run_started.format("%Y-%m-%d")))
    }

    /// Append the run's row, writing the header first for a new file
    pub fn export_summary(&self, summary: &TestSummary) -> Result<PathBuf> {
        let path = self.path_for(summary);
        let is_new = !path.exists();

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut buffer = String::new();
        if is_new {
            buffer.push_str(&to_line(&self.schema.header()));
            buffer.push('\n');
        }
        buffer.push_str(&to_line(&self.schema.row(summary)));
        buffer.push('\n');

        file.write_all(buffer.as_bytes())?;
        file.flush()?;
        Ok(path)
    }
}
