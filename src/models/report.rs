//! Verdicts and the per-run report records built from them

use crate::types::{Grade, Measurement, MetricKind, Severity};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A graded, immutable classification of one measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub metric: MetricKind,
    pub measurement: Option<Measurement>,
    pub grade: Grade,
    pub severity: Severity,
    pub label: String,
}

impl Verdict {
    /// Whether a counted probe succeeded
    pub fn passed(&self) -> bool {
        self.severity == Severity::Success
    }

    /// True when the probe never produced a value
    pub fn is_unavailable(&self) -> bool {
        self.grade == Grade::Undetermined
    }
}

/// Free-form outcome of a suite-level probe that has no threshold table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub fn new<S: Into<String>>(severity: Severity, message: S) -> Self {
        Self { severity, message: message.into() }
    }

    pub fn info<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn success<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Error, message)
    }
}

/// Everything measured for one endpoint during one suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointResult {
    pub host: String,
    pub verdicts: Vec<Verdict>,
    /// Dependent probes were skipped because DNS failed
    pub short_circuited: bool,
}

impl EndpointResult {
    /// First verdict recorded for a metric
    pub fn verdict(&self, metric: MetricKind) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| v.metric == metric)
    }

    /// Measured value for a metric, if any
    pub fn measurement(&self, metric: MetricKind) -> Option<Measurement> {
        self.verdict(metric).and_then(|v| v.measurement)
    }

    /// (total, passed) over the counted probes that actually ran
    pub fn counted(&self) -> (u32, u32) {
        self.verdicts
            .iter()
            .filter(|v| v.metric.is_counted() && !v.is_unavailable())
            .fold((0, 0), |(total, passed), v| {
                (total + 1, passed + u32::from(v.passed()))
            })
    }
}

/// Results of the endpoint-independent probes of one suite run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedResults {
    pub verdicts: Vec<Verdict>,
    pub findings: Vec<Finding>,
}

impl AdvancedResults {
    pub fn verdict(&self, metric: MetricKind) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| v.metric == metric)
    }

    /// Fold another section's results into this one, keeping order
    pub fn extend(&mut self, other: AdvancedResults) {
        self.verdicts.extend(other.verdicts);
        self.findings.extend(other.findings);
    }
}

/// Finalized outcome of one suite run, handed to the reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub run_started: DateTime<Local>,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub endpoints: Vec<EndpointResult>,
    pub advanced: AdvancedResults,
}

impl TestSummary {
    /// Fold endpoint results into counters; advanced probes never count
    pub fn from_parts(
        run_started: DateTime<Local>,
        endpoints: Vec<EndpointResult>,
        advanced: AdvancedResults,
    ) -> Self {
        let (total, passed) = endpoints
            .iter()
            .map(EndpointResult::counted)
            .fold((0, 0), |(t, p), (et, ep)| (t + et, p + ep));

        Self {
            run_started,
            total,
            passed,
            failed: total - passed,
            endpoints,
            advanced,
        }
    }

    /// Overall success percentage, rounded to two decimals
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            crate::stats::round2(self.passed as f64 / self.total as f64 * 100.0)
        }
    }

    pub fn endpoint(&self, host: &str) -> Option<&EndpointResult> {
        self.endpoints.iter().find(|e| e.host == host)
    }
}
