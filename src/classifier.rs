//! Metric classifier: maps raw measurements onto graded verdicts
//!
//! Every threshold lives here. Buckets are exclusive on their upper bound
//! unless the table says `=`; there is no fuzz around the boundaries.

use crate::models::Verdict;
use crate::types::{Grade, Measurement, MetricKind};

/// IPv4/IPv6 latency ratio above which one family is flagged as slower
pub const FAMILY_RATIO_THRESHOLD: f64 = 1.5;

/// Hop count above which a route is flagged as suboptimal
pub const MAX_OPTIMAL_HOPS: u32 = 20;

/// Classify a measurement. Total: a missing or mismatched value is
/// `UNDETERMINED` rather than an error.
pub fn classify(kind: MetricKind, measurement: Option<Measurement>) -> Verdict {
    let grade = measurement
        .and_then(|m| grade_for(kind, m))
        .unwrap_or(Grade::Undetermined);

    let label = match (measurement, grade) {
        (Some(m), g) if g != Grade::Undetermined => format!("{}: {} ({})", kind.name(), m, g),
        _ => format!("{}: not measured ({})", kind.name(), Grade::Undetermined),
    };

    Verdict {
        metric: kind,
        measurement: if grade == Grade::Undetermined { None } else { measurement },
        grade,
        severity: grade.severity(),
        label,
    }
}

/// Verdict for a metric whose probe was skipped
pub fn unavailable(kind: MetricKind) -> Verdict {
    classify(kind, None)
}

/// Whether an HTTP status proves the service is reachable. Auth challenges
/// count: the broker answers 401/403 to anonymous clients.
pub fn http_status_reachable(status: u16) -> bool {
    matches!(status, 200..=399 | 401 | 403)
}

fn grade_for(kind: MetricKind, measurement: Measurement) -> Option<Grade> {
    use Measurement::*;

    let grade = match (kind, measurement) {
        (MetricKind::Dns | MetricKind::Tcp443 | MetricKind::Https, Reachable(ok)) => {
            if ok { Grade::Pass } else { Grade::Fail }
        }
        (MetricKind::Latency, DurationMs(ms)) => latency(ms),
        (MetricKind::PacketLoss, Percent(pct)) => packet_loss(pct),
        (MetricKind::Jitter, DurationMs(ms)) => jitter(ms),
        (MetricKind::ConnectionStability, Percent(pct)) => connection_success(pct),
        (MetricKind::DisconnectRate, Percent(pct)) => disconnect_rate(pct),
        (MetricKind::BrokerSuccessRate, Percent(pct)) => broker_success(pct),
        (MetricKind::DnsLookupTime, DurationMs(ms)) => dns_lookup(ms),
        (MetricKind::Mtu, Bytes(bytes)) => mtu(bytes),
        (MetricKind::HopCount, Count(hops)) => hop_count(hops),
        _ => return None,
    };

    // NaN never lands in a bucket
    match measurement {
        DurationMs(v) | Percent(v) if !v.is_finite() => None,
        _ => Some(grade),
    }
}

fn latency(ms: f64) -> Grade {
    if ms < 50.0 {
        Grade::Excellent
    } else if ms < 100.0 {
        Grade::Good
    } else if ms < 200.0 {
        Grade::Fair
    } else {
        Grade::Poor
    }
}

fn packet_loss(pct: f64) -> Grade {
    if pct == 0.0 {
        Grade::None
    } else if pct < 5.0 {
        Grade::Minimal
    } else if pct < 15.0 {
        Grade::Moderate
    } else {
        Grade::High
    }
}

fn jitter(ms: f64) -> Grade {
    if ms < 5.0 {
        Grade::Excellent
    } else if ms < 15.0 {
        Grade::Acceptable
    } else if ms < 30.0 {
        Grade::Moderate
    } else {
        Grade::High
    }
}

fn connection_success(pct: f64) -> Grade {
    if pct == 100.0 {
        Grade::Excellent
    } else if pct >= 95.0 {
        Grade::Good
    } else if pct >= 80.0 {
        Grade::Fair
    } else {
        Grade::Poor
    }
}

fn disconnect_rate(pct: f64) -> Grade {
    if pct == 0.0 {
        Grade::Excellent
    } else if pct < 5.0 {
        Grade::Good
    } else if pct < 15.0 {
        Grade::Fair
    } else {
        Grade::Poor
    }
}

fn broker_success(pct: f64) -> Grade {
    if pct == 100.0 {
        Grade::Excellent
    } else if pct >= 90.0 {
        Grade::Good
    } else if pct >= 70.0 {
        Grade::Fair
    } else {
        Grade::Poor
    }
}

fn dns_lookup(ms: f64) -> Grade {
    if ms < 50.0 {
        Grade::Fast
    } else if ms < 200.0 {
        Grade::Acceptable
    } else {
        Grade::Slow
    }
}

fn mtu(bytes: u32) -> Grade {
    if bytes >= 1500 {
        Grade::Optimal
    } else if bytes >= 1280 {
        Grade::Reduced
    } else {
        Grade::Low
    }
}

fn hop_count(hops: u32) -> Grade {
    if hops <= MAX_OPTIMAL_HOPS {
        Grade::Good
    } else {
        Grade::Suboptimal
    }
}

/// Outcome of comparing IPv4 and IPv6 latency to the same host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FamilyComparison {
    /// Neither family is more than 1.5x slower than the other
    Balanced,
    /// IPv6 is slower; carries the v6/v4 ratio
    Ipv6Slower(f64),
    /// IPv4 is slower; carries the v4/v6 ratio
    Ipv4Slower(f64),
    /// At least one family did not resolve or answer
    Incomplete,
}

/// Compare per-family latency; only evaluated when both were measured
pub fn compare_families(v4_ms: Option<f64>, v6_ms: Option<f64>) -> FamilyComparison {
    match (v4_ms, v6_ms) {
        (Some(v4), Some(v6)) if v4 > 0.0 && v6 > 0.0 => {
            if v6 > v4 * FAMILY_RATIO_THRESHOLD {
                FamilyComparison::Ipv6Slower(v6 / v4)
            } else if v4 > v6 * FAMILY_RATIO_THRESHOLD {
                FamilyComparison::Ipv4Slower(v4 / v6)
            } else {
                FamilyComparison::Balanced
            }
        }
        _ => FamilyComparison::Incomplete,
    }
}
