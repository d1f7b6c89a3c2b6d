//! Type definitions shared by the classifier, runners and reporter

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// A raw value produced by one probe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Measurement {
    /// Boolean reachability (DNS, TCP, HTTPS)
    Reachable(bool),
    /// A duration in milliseconds
    DurationMs(f64),
    /// A percentage in the range 0..=100
    Percent(f64),
    /// A size in bytes
    Bytes(u32),
    /// A plain integer count
    Count(u32),
}

impl Measurement {
    /// Numeric view used for CSV cells; booleans become 1/0
    pub fn as_f64(&self) -> f64 {
        match *self {
            Measurement::Reachable(ok) => if ok { 1.0 } else { 0.0 },
            Measurement::DurationMs(v) | Measurement::Percent(v) => v,
            Measurement::Bytes(v) | Measurement::Count(v) => v as f64,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Reachable(true) => write!(f, "reachable"),
            Measurement::Reachable(false) => write!(f, "unreachable"),
            Measurement::DurationMs(ms) => write!(f, "{:.2}ms", ms),
            Measurement::Percent(p) => write!(f, "{:.2}%", p),
            Measurement::Bytes(b) => write!(f, "{} bytes", b),
            Measurement::Count(c) => write!(f, "{}", c),
        }
    }
}

/// The metric a measurement belongs to; selects the threshold table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Dns,
    Tcp443,
    Https,
    DnsLookupTime,
    Latency,
    PacketLoss,
    Jitter,
    ConnectionStability,
    Mtu,
    DisconnectRate,
    BrokerSuccessRate,
    HopCount,
}

impl MetricKind {
    /// Metrics that contribute one unit to the suite's pass/fail counters
    pub fn is_counted(&self) -> bool {
        matches!(self, MetricKind::Dns | MetricKind::Tcp443 | MetricKind::Https)
    }

    /// Human-readable metric name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Dns => "DNS Resolution",
            MetricKind::Tcp443 => "TCP 443",
            MetricKind::Https => "HTTPS",
            MetricKind::DnsLookupTime => "DNS Lookup Time",
            MetricKind::Latency => "Latency",
            MetricKind::PacketLoss => "Packet Loss",
            MetricKind::Jitter => "Jitter",
            MetricKind::ConnectionStability => "Connection Stability",
            MetricKind::Mtu => "MTU",
            MetricKind::DisconnectRate => "Disconnect Rate",
            MetricKind::BrokerSuccessRate => "Broker Success Rate",
            MetricKind::HopCount => "Hop Count",
        }
    }
}

/// Graded classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Pass,
    Fail,
    Excellent,
    Good,
    Fair,
    Poor,
    None,
    Minimal,
    Moderate,
    High,
    Acceptable,
    Fast,
    Slow,
    Optimal,
    Reduced,
    Low,
    Suboptimal,
    Undetermined,
}

impl Grade {
    /// Upper-case label as written to the log
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Pass => "PASS",
            Grade::Fail => "FAIL",
            Grade::Excellent => "EXCELLENT",
            Grade::Good => "GOOD",
            Grade::Fair => "FAIR",
            Grade::Poor => "POOR",
            Grade::None => "NONE",
            Grade::Minimal => "MINIMAL",
            Grade::Moderate => "MODERATE",
            Grade::High => "HIGH",
            Grade::Acceptable => "ACCEPTABLE",
            Grade::Fast => "FAST",
            Grade::Slow => "SLOW",
            Grade::Optimal => "OPTIMAL",
            Grade::Reduced => "REDUCED",
            Grade::Low => "LOW",
            Grade::Suboptimal => "SUBOPTIMAL",
            Grade::Undetermined => "UNDETERMINED",
        }
    }

    /// Severity tier; maps 1:1 onto a log level
    pub fn severity(&self) -> Severity {
        match self {
            Grade::Pass
            | Grade::Excellent
            | Grade::Good
            | Grade::Fast
            | Grade::Optimal
            | Grade::None
            | Grade::Minimal => Severity::Success,
            Grade::Fair
            | Grade::Moderate
            | Grade::Acceptable
            | Grade::Reduced
            | Grade::Suboptimal => Severity::Warning,
            Grade::Fail | Grade::Poor | Grade::High | Grade::Slow | Grade::Low => Severity::Error,
            Grade::Undetermined => Severity::Info,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity tier of a verdict or finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Success,
    Warning,
    Error,
    Info,
}
