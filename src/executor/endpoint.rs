//! Per-endpoint test sequence
//!
//! Order is fixed: DNS, TCP 443, HTTPS, latency, packet loss, jitter,
//! connection stability, MTU. A DNS failure skips everything after it.

use super::ExecutionConfig;
use crate::{
    classifier::{classify, http_status_reachable, unavailable},
    error::AppError,
    logging::Logger,
    models::{EndpointResult, Verdict},
    probe::NetworkProbe,
    stats::{loss_percent, population_std_dev, round2, success_percent, SampleStats},
    types::{Measurement, MetricKind},
};
use std::time::Duration;
use tokio::time::Instant;

/// Metrics recorded as unavailable when the endpoint does not resolve
pub const DEPENDENT_METRICS: &[MetricKind] = &[
    MetricKind::Tcp443,
    MetricKind::Https,
    MetricKind::Latency,
    MetricKind::PacketLoss,
    MetricKind::Jitter,
    MetricKind::ConnectionStability,
    MetricKind::Mtu,
];

/// Outcome counts of the connect/close stability cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StabilityCounts {
    pub attempts: u32,
    pub succeeded: u32,
    pub timeouts: u32,
    /// Resets and refusals
    pub resets: u32,
}

impl StabilityCounts {
    pub fn success_rate(&self) -> f64 {
        success_percent(self.attempts, self.succeeded)
    }
}

pub struct EndpointRunner<'a> {
    probe: &'a dyn NetworkProbe,
    logger: &'a Logger,
    settings: &'a ExecutionConfig,
}

impl<'a> EndpointRunner<'a> {
    pub fn new(probe: &'a dyn NetworkProbe, logger: &'a Logger, settings: &'a ExecutionConfig) -> Self {
        Self { probe, logger, settings }
    }

    /// Run the full sequence against one host
    pub async fn run(&self, host: &str) -> EndpointResult {
        self.logger.info(format!("Testing endpoint: {}", host)).log();

        let mut result = EndpointResult {
            host: host.to_string(),
            verdicts: Vec::new(),
            short_circuited: false,
        };

        let started = Instant::now();
        match self.probe.resolve(host).await {
            Err(e) => {
                self.logger
                    .error(format!("DNS resolution failed for {}", host))
                    .error_info(&e)
                    .log();
                self.record(&mut result, classify(MetricKind::Dns, Some(Measurement::Reachable(false))));
                result
                    .verdicts
                    .extend(DEPENDENT_METRICS.iter().map(|&kind| unavailable(kind)));
                result.short_circuited = true;
                self.logger
                    .warning(format!("Skipping remaining tests for {}", host))
                    .log();
                return result;
            }
            Ok(addrs) => {
                let lookup_ms = round2(as_millis(started.elapsed()));
                let listed: Vec<String> = addrs.iter().map(ToString::to_string).collect();
                self.logger
                    .debug(format!("{} resolved to {}", host, listed.join(", ")))
                    .log();
                self.record(&mut result, classify(MetricKind::Dns, Some(Measurement::Reachable(true))));
                self.record(
                    &mut result,
                    classify(MetricKind::DnsLookupTime, Some(Measurement::DurationMs(lookup_ms))),
                );
            }
        }

        let tcp = self.tcp_443(host).await;
        self.record(&mut result, classify(MetricKind::Tcp443, Some(Measurement::Reachable(tcp))));

        let https = self.https(host).await;
        self.record(&mut result, classify(MetricKind::Https, Some(Measurement::Reachable(https))));

        let latency = self.latency(host).await;
        self.record(&mut result, classify(MetricKind::Latency, latency.map(Measurement::DurationMs)));

        let loss = self.packet_loss(host).await;
        self.record(&mut result, classify(MetricKind::PacketLoss, loss.map(Measurement::Percent)));

        let jitter = self.jitter(host).await;
        self.record(&mut result, classify(MetricKind::Jitter, jitter.map(Measurement::DurationMs)));

        let stability = self.stability(host).await;
        self.logger
            .info(format!(
                "{} - Connection cycles: {}/{} succeeded",
                host, stability.succeeded, stability.attempts
            ))
            .field("timeouts", stability.timeouts)
            .field("resets", stability.resets)
            .log();
        self.record(
            &mut result,
            classify(MetricKind::ConnectionStability, Some(Measurement::Percent(stability.success_rate()))),
        );

        let mtu = self.mtu(host).await;
        self.record(&mut result, classify(MetricKind::Mtu, mtu.map(Measurement::Bytes)));

        result
    }

    fn record(&self, result: &mut EndpointResult, verdict: Verdict) {
        self.logger.verdict(&result.host, &verdict);
        result.verdicts.push(verdict);
    }

    async fn tcp_443(&self, host: &str) -> bool {
        match self.probe.tcp_connect(host, 443, self.settings.tcp_timeout).await {
            Ok(elapsed) => {
                self.logger
                    .debug(format!("{}:443 connected in {:.2}ms", host, as_millis(elapsed)))
                    .log();
                true
            }
            Err(e) => {
                self.logger
                    .debug(format!("{}:443 connect failed", host))
                    .error_info(&e)
                    .log();
                false
            }
        }
    }

    /// GET `https://host/`; auth challenges count as reachable
    async fn https(&self, host: &str) -> bool {
        let url = format!("https://{}/", host);
        match self.probe.http_get(&url, self.settings.http_timeout).await {
            Ok(status) => {
                let reachable = http_status_reachable(status);
                if matches!(status, 401 | 403) {
                    self.logger
                        .info(format!("{} answered HTTP {} (authentication required, service reachable)", host, status))
                        .log();
                } else {
                    self.logger.debug(format!("{} answered HTTP {}", host, status)).log();
                }
                reachable
            }
            Err(e) => {
                self.logger
                    .debug(format!("HTTPS request to {} failed", host))
                    .error_info(&e)
                    .log();
                false
            }
        }
    }

    /// Ping `count` times. `None` when the platform cannot ping at all.
    async fn ping_series(&self, host: &str, count: u32) -> Option<Vec<Option<f64>>> {
        let mut replies = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.probe.ping(host, self.settings.ping_timeout).await {
                Ok(rtt) => replies.push(Some(rtt)),
                Err(AppError::Unsupported(reason)) => {
                    self.logger.warning(format!("ICMP unavailable: {}", reason)).log();
                    return None;
                }
                Err(_) => replies.push(None),
            }
        }
        Some(replies)
    }

    /// Mean round-trip time over the latency pings
    async fn latency(&self, host: &str) -> Option<f64> {
        let replies = self.ping_series(host, self.settings.latency_pings).await?;
        let samples: Vec<f64> = replies.into_iter().flatten().collect();
        let summary = SampleStats::from_samples(&samples)?;
        self.logger
            .debug(format!(
                "{} - RTT min/avg/max {:.2}/{:.2}/{:.2}ms",
                host, summary.min_ms, summary.mean_ms, summary.max_ms
            ))
            .field("answered", summary.count)
            .log();
        Some(summary.mean_ms)
    }

    async fn packet_loss(&self, host: &str) -> Option<f64> {
        let replies = self.ping_series(host, self.settings.loss_pings).await?;
        let received = replies.iter().filter(|r| r.is_some()).count() as u32;
        Some(loss_percent(replies.len() as u32, received))
    }

    /// Population standard deviation of the answered samples
    async fn jitter(&self, host: &str) -> Option<f64> {
        let replies = self.ping_series(host, self.settings.jitter_pings).await?;
        let samples: Vec<f64> = replies.into_iter().flatten().collect();
        if samples.len() < 2 {
            return None;
        }
        population_std_dev(&samples).map(round2)
    }

    async fn stability(&self, host: &str) -> StabilityCounts {
        let mut counts = StabilityCounts::default();
        for _ in 0..self.settings.stability_cycles {
            counts.attempts += 1;
            match self.probe.tcp_connect(host, 443, self.settings.stability_timeout).await {
                Ok(_) => counts.succeeded += 1,
                Err(AppError::Timeout(_)) => counts.timeouts += 1,
                Err(_) => counts.resets += 1,
            }
        }
        counts
    }

    /// Largest don't-fragment payload that gets through, plus header overhead
    async fn mtu(&self, host: &str) -> Option<u32> {
        for &payload in &self.settings.mtu_payloads {
            match self.probe.ping_no_fragment(host, payload, self.settings.ping_timeout).await {
                Ok(true) => return Some(payload + crate::defaults::MTU_HEADER_OVERHEAD),
                Ok(false) => {
                    self.logger
                        .debug(format!("{} - {} byte payload needs fragmentation", host, payload))
                        .log();
                }
                Err(AppError::Unsupported(_)) => return None,
                Err(e) => {
                    self.logger
                        .debug(format!("{} - MTU probe at {} bytes failed", host, payload))
                        .error_info(&e)
                        .log();
                }
            }
        }
        None
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
