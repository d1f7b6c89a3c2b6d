//! Suite-level probes, run once per pass after every endpoint
//!
//! Nothing here contributes to the pass/fail counters. Best-effort checks
//! (proxy, Wi-Fi, clock, DNS cache, adapter power) only ever log findings.

use super::ExecutionConfig;
use crate::{
    classifier::{classify, compare_families, http_status_reachable, unavailable, FamilyComparison},
    defaults,
    error::AppError,
    logging::Logger,
    models::{AdvancedResults, Finding, Verdict},
    probe::{Hop, NetworkProbe, UdpOutcome},
    stats::{self, round2, success_percent},
    types::{Measurement, MetricKind},
};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// DNS TTL below which answers are re-fetched often enough to matter
const SHORT_TTL_SECS: u32 = 60;

/// Tally of the broker stress requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerCounts {
    pub requests: u32,
    pub succeeded: u32,
    pub timeouts: u32,
    pub resets: u32,
    pub other: u32,
}

pub struct AdvancedRunner<'a> {
    probe: &'a dyn NetworkProbe,
    logger: &'a Logger,
    settings: &'a ExecutionConfig,
}

impl<'a> AdvancedRunner<'a> {
    pub fn new(probe: &'a dyn NetworkProbe, logger: &'a Logger, settings: &'a ExecutionConfig) -> Self {
        Self { probe, logger, settings }
    }

    /// Run every suite-level probe in order
    pub async fn run(&self) -> AdvancedResults {
        self.logger.info("Running advanced diagnostics").log();
        let mut out = AdvancedResults::default();

        self.environment(&mut out).await;
        self.udp(&mut out).await;
        self.sustained(&mut out).await;
        self.dns_cache(&mut out).await;
        self.broker_stress(&mut out).await;
        self.background_activity(&mut out).await;
        self.adapter_power(&mut out).await;
        self.family_latency(&mut out).await;
        self.route(&mut out).await;

        out
    }

    fn finding(&self, out: &mut AdvancedResults, finding: Finding) {
        self.logger.finding(&finding);
        out.findings.push(finding);
    }

    fn verdict(&self, out: &mut AdvancedResults, context: &str, verdict: Verdict) {
        self.logger.verdict(context, &verdict);
        out.verdicts.push(verdict);
    }

    /// Proxy, Wi-Fi signal and clock synchronization
    async fn environment(&self, out: &mut AdvancedResults) {
        match self.probe.proxy_settings().await {
            Ok(Some(proxy)) => self.finding(
                out,
                Finding::warning(format!("Proxy configured ({}); AVD traffic should bypass proxies", proxy)),
            ),
            Ok(None) => self.finding(out, Finding::info("No proxy configured")),
            Err(e) => self.finding(out, Finding::warning(format!("Could not read proxy settings: {}", e))),
        }

        match self.probe.wifi_signal().await {
            Ok(Some(signal)) => {
                let weak = signal.signal_dbm.map_or(false, |dbm| dbm < -70.0)
                    || signal.quality_percent.map_or(false, |q| q < 50.0);
                let detail = match (signal.signal_dbm, signal.quality_percent) {
                    (Some(dbm), Some(q)) => format!("{:.0} dBm, {:.0}%", dbm, q),
                    (Some(dbm), None) => format!("{:.0} dBm", dbm),
                    (None, Some(q)) => format!("{:.0}%", q),
                    (None, None) => "unknown strength".to_string(),
                };
                let message = format!("Wi-Fi on {}: {}", signal.interface, detail);
                if weak {
                    self.finding(out, Finding::warning(format!("{} (weak signal, prefer a wired link)", message)));
                } else {
                    self.finding(out, Finding::info(message));
                }
            }
            Ok(None) => self.finding(out, Finding::info("No active Wi-Fi interface")),
            Err(e) => self.finding(out, Finding::info(format!("Wi-Fi signal unavailable: {}", e))),
        }

        match self.probe.time_synchronized().await {
            Ok(true) => self.finding(out, Finding::success("System clock is synchronized")),
            Ok(false) => self.finding(
                out,
                Finding::warning("System clock is not synchronized; token validation may fail"),
            ),
            Err(e) => self.finding(out, Finding::info(format!("Time sync status unavailable: {}", e))),
        }
    }

    /// STUN binding requests to the relay on each UDP port
    async fn udp(&self, out: &mut AdvancedResults) {
        let relay = self.settings.relay_host.as_str();
        let mut responded = 0;

        for &port in &self.settings.udp_ports {
            match self.probe.udp_probe(relay, port, self.settings.udp_timeout).await {
                Ok(UdpOutcome::Responded { bytes }) => {
                    responded += 1;
                    self.finding(
                        out,
                        Finding::success(format!("UDP {}:{} answered ({} bytes)", relay, port, bytes)),
                    );
                }
                Ok(UdpOutcome::NoResponse) => self.finding(
                    out,
                    Finding::warning(format!("UDP {}:{} no response (open or filtered)", relay, port)),
                ),
                Ok(UdpOutcome::Refused) => self.finding(
                    out,
                    Finding::error(format!("UDP {}:{} refused", relay, port)),
                ),
                Err(e) => self.finding(
                    out,
                    Finding::warning(format!("UDP {}:{} probe failed: {}", relay, port, e)),
                ),
            }
        }

        if responded > 0 {
            self.finding(out, Finding::success("RDP Shortpath (UDP) transport is available"));
        } else {
            self.finding(out, Finding::warning("No UDP response; sessions will fall back to TCP"));
        }
    }

    /// Poll one endpoint for the configured duration; failed polls are disconnects
    async fn sustained(&self, out: &mut AdvancedResults) {
        let Some(host) = self.settings.primary_endpoint() else {
            self.verdict(out, "Sustained", unavailable(MetricKind::DisconnectRate));
            return;
        };

        let poll = self.settings.sustained_poll;
        let attempts = (self.settings.sustained_duration.as_millis() / poll.as_millis().max(1)).max(1) as u32;
        self.logger
            .info(format!(
                "Sustained connection test against {} ({}s, {} polls)",
                host,
                self.settings.sustained_duration.as_secs(),
                attempts
            ))
            .log();

        let mut disconnects = 0;
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(poll).await;
            }
            if let Err(e) = self.probe.tcp_connect(host, 443, self.settings.tcp_timeout).await {
                disconnects += 1;
                self.logger
                    .debug(format!("Sustained poll {} to {} failed", attempt + 1, host))
                    .error_info(&e)
                    .log();
            }
        }

        let rate = round2(100.0 - success_percent(attempts, attempts - disconnects));
        self.verdict(
            out,
            &format!("Sustained ({})", host),
            classify(MetricKind::DisconnectRate, Some(Measurement::Percent(rate))),
        );
    }

    /// Remaining cache TTL of each endpoint's answer
    async fn dns_cache(&self, out: &mut AdvancedResults) {
        for host in &self.settings.endpoints {
            match self.probe.dns_ttl(host).await {
                Ok(ttl) if ttl < SHORT_TTL_SECS => self.finding(
                    out,
                    Finding::warning(format!("DNS TTL for {}: {}s (short, frequent re-resolution)", host, ttl)),
                ),
                Ok(ttl) => self.finding(out, Finding::info(format!("DNS TTL for {}: {}s", host, ttl))),
                Err(e) => self.finding(out, Finding::info(format!("DNS TTL for {} unavailable: {}", host, e))),
            }
        }
    }

    /// Rapid sequential GETs against the broker
    async fn broker_stress(&self, out: &mut AdvancedResults) {
        let url = format!("https://{}/", self.settings.broker_host);
        let mut counts = BrokerCounts::default();

        for _ in 0..self.settings.broker_requests {
            counts.requests += 1;
            match self.probe.http_get(&url, self.settings.http_timeout).await {
                Ok(status) if http_status_reachable(status) => counts.succeeded += 1,
                Ok(_) => counts.other += 1,
                Err(AppError::Timeout(_)) => counts.timeouts += 1,
                Err(AppError::ConnectionReset(_)) => counts.resets += 1,
                Err(_) => counts.other += 1,
            }
        }

        self.logger
            .info(format!(
                "Broker stress: {}/{} succeeded against {}",
                counts.succeeded, counts.requests, self.settings.broker_host
            ))
            .field("timeouts", counts.timeouts)
            .field("resets", counts.resets)
            .field("other", counts.other)
            .log();

        if counts.succeeded < counts.requests {
            self.finding(
                out,
                Finding::warning(format!(
                    "Broker failures: {} timeout(s), {} reset(s), {} other",
                    counts.timeouts, counts.resets, counts.other
                )),
            );
        }

        let rate = success_percent(counts.requests, counts.succeeded);
        self.verdict(
            out,
            "Broker stress",
            classify(MetricKind::BrokerSuccessRate, Some(Measurement::Percent(rate))),
        );
    }

    /// Established connections grouped by process; heavy hitters flagged
    async fn background_activity(&self, out: &mut AdvancedResults) {
        let connections = match self.probe.established_connections().await {
            Ok(connections) => connections,
            Err(e) => {
                self.finding(out, Finding::warning(format!("Could not enumerate connections: {}", e)));
                return;
            }
        };

        let mut by_process: BTreeMap<String, usize> = BTreeMap::new();
        for connection in &connections {
            *by_process.entry(connection.process.clone()).or_insert(0) += 1;
        }

        self.finding(
            out,
            Finding::info(format!(
                "{} established connections across {} processes",
                connections.len(),
                by_process.len()
            )),
        );

        let flagged: Vec<(&String, &usize)> = by_process
            .iter()
            .filter(|(name, _)| is_heavy_process(name))
            .collect();

        if flagged.is_empty() {
            self.finding(out, Finding::success("No bandwidth-heavy applications detected"));
        }
        for (name, count) in flagged {
            self.finding(
                out,
                Finding::warning(format!("Bandwidth-heavy application active: {} ({} connections)", name, count)),
            );
        }
    }

    async fn adapter_power(&self, out: &mut AdvancedResults) {
        match self.probe.adapter_power().await {
            Ok(adapters) => {
                let saving: Vec<&str> = adapters
                    .iter()
                    .filter(|a| a.power_saving)
                    .map(|a| a.name.as_str())
                    .collect();
                if saving.is_empty() {
                    self.finding(out, Finding::success("No network adapters in power-saving mode"));
                }
                for name in saving {
                    self.finding(
                        out,
                        Finding::warning(format!("Power saving enabled on adapter {}", name)),
                    );
                }
            }
            Err(e) => self.finding(out, Finding::info(format!("Adapter power state unavailable: {}", e))),
        }
    }

    /// Compare IPv4 and IPv6 round trips to the primary endpoint
    async fn family_latency(&self, out: &mut AdvancedResults) {
        let Some(host) = self.settings.primary_endpoint() else {
            return;
        };

        let addrs = match self.probe.resolve(host).await {
            Ok(addrs) => addrs,
            Err(e) => {
                self.finding(out, Finding::info(format!("IPv4/IPv6 comparison skipped: {}", e)));
                return;
            }
        };

        let v4 = match addrs.iter().find(|a| a.is_ipv4()) {
            Some(addr) => self.mean_rtt(addr).await,
            None => None,
        };
        let v6 = match addrs.iter().find(|a| a.is_ipv6()) {
            Some(addr) => self.mean_rtt(addr).await,
            None => None,
        };

        let finding = match compare_families(v4, v6) {
            FamilyComparison::Balanced => Finding::success(format!(
                "IPv4 {:.2}ms vs IPv6 {:.2}ms to {}",
                v4.unwrap_or_default(),
                v6.unwrap_or_default(),
                host
            )),
            FamilyComparison::Ipv6Slower(ratio) => Finding::warning(format!(
                "IPv6 is {:.1}x slower than IPv4 to {}; consider preferring IPv4",
                ratio, host
            )),
            FamilyComparison::Ipv4Slower(ratio) => Finding::warning(format!(
                "IPv4 is {:.1}x slower than IPv6 to {}",
                ratio, host
            )),
            FamilyComparison::Incomplete => Finding::info(format!(
                "IPv4/IPv6 comparison skipped for {} (IPv4: {}, IPv6: {})",
                host,
                describe_rtt(v4),
                describe_rtt(v6)
            )),
        };
        self.finding(out, finding);
    }

    async fn mean_rtt(&self, addr: &IpAddr) -> Option<f64> {
        let target = addr.to_string();
        let mut samples = Vec::new();
        for _ in 0..self.settings.latency_pings {
            if let Ok(rtt) = self.probe.ping(&target, self.settings.ping_timeout).await {
                samples.push(rtt);
            }
        }
        stats::mean(&samples).map(round2)
    }

    async fn route(&self, out: &mut AdvancedResults) {
        let Some(host) = self.settings.primary_endpoint() else {
            self.verdict(out, "Route", unavailable(MetricKind::HopCount));
            return;
        };

        match self.probe.trace_route(host).await {
            Ok(hops) => {
                let Some(count) = last_answering_hop(&hops) else {
                    self.finding(out, Finding::warning(format!("No hop answered on the route to {}", host)));
                    self.verdict(out, &format!("Route ({})", host), unavailable(MetricKind::HopCount));
                    return;
                };

                let silent = hops
                    .iter()
                    .filter(|h| h.number <= count && h.address.is_none())
                    .count();
                let trailing = hops.iter().filter(|h| h.number > count).count();
                if silent > 0 {
                    self.logger
                        .info(format!("Route to {}: {} of {} hops did not answer", host, silent, count))
                        .log();
                }
                if trailing > 0 {
                    self.logger
                        .info(format!(
                            "Route to {}: {} silent hop(s) after hop {} not counted",
                            host, trailing, count
                        ))
                        .log();
                }
                self.verdict(
                    out,
                    &format!("Route ({})", host),
                    classify(MetricKind::HopCount, Some(Measurement::Count(count))),
                );
            }
            Err(e) => {
                self.finding(out, Finding::warning(format!("Route trace to {} failed: {}", host, e)));
                self.verdict(out, &format!("Route ({})", host), unavailable(MetricKind::HopCount));
            }
        }
    }
}

fn is_heavy_process(name: &str) -> bool {
    let name = name.to_lowercase();
    let name = name.trim_end_matches(".exe");
    defaults::HEAVY_PROCESSES.iter().any(|heavy| name.contains(heavy))
}

/// Highest hop number that answered; trailing silent probes are not path length
fn last_answering_hop(hops: &[Hop]) -> Option<u32> {
    hops.iter()
        .filter(|h| h.address.is_some())
        .map(|h| h.number)
        .max()
}

fn describe_rtt(rtt: Option<f64>) -> String {
    rtt.map_or_else(|| "n/a".to_string(), |ms| format!("{:.2}ms", ms))
}
