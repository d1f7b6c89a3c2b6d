//! Scripted probe for exercising the runners without touching the network

use super::{AdapterPower, ConnectionInfo, Hop, NetworkProbe, UdpOutcome, WifiSignal};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted outcome of one connection attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Connect {
    Open(f64),
    Timeout,
    Reset,
    Refused,
}

/// Scripted outcome of one HTTP request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Http {
    Status(u16),
    Timeout,
    Reset,
    Refused,
}

/// Everything the fake knows about one host. Sequences are cycled.
#[derive(Debug, Clone)]
pub struct HostScript {
    /// Empty means the name does not resolve
    pub addrs: Vec<IpAddr>,
    pub dns_delay: Duration,
    pub ttl: Option<u32>,
    pub tcp: Vec<Connect>,
    pub http: Vec<Http>,
    /// `None` entries are lost echoes
    pub ping_ms: Vec<Option<f64>>,
    /// Largest payload that passes with don't-fragment set
    pub max_df_payload: Option<u32>,
    pub udp: UdpOutcome,
    pub hops: Vec<Hop>,
}

impl HostScript {
    /// A healthy host: resolves, accepts connections, answers 200, pings at `ping_ms`
    pub fn healthy(addr: &str, ping_ms: f64) -> Self {
        Self {
            addrs: addr.parse::<IpAddr>().map(|ip| vec![ip]).unwrap_or_default(),
            dns_delay: Duration::from_millis(10),
            ttl: Some(300),
            tcp: vec![Connect::Open(12.0)],
            http: vec![Http::Status(200)],
            ping_ms: vec![Some(ping_ms)],
            max_df_payload: Some(1472),
            udp: UdpOutcome::NoResponse,
            hops: (1..=8)
                .map(|n| Hop { number: n, address: Some(format!("10.0.0.{}", n)), rtt_ms: Some(n as f64) })
                .collect(),
        }
    }

    /// A host whose name does not resolve
    pub fn unresolvable() -> Self {
        Self { addrs: Vec::new(), ..Self::healthy("0.0.0.0", 0.0) }
    }
}

#[derive(Default)]
pub struct FakeProbe {
    hosts: HashMap<String, HostScript>,
    /// Pings addressed to IP literals (family comparison)
    ip_pings: HashMap<String, Option<f64>>,
    pub connections: Vec<ConnectionInfo>,
    pub adapters: Vec<AdapterPower>,
    pub proxy: Option<String>,
    pub wifi: Option<WifiSignal>,
    pub time_synced: bool,
    cursors: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self { time_synced: true, ..Self::default() }
    }

    pub fn with_host(mut self, host: &str, script: HostScript) -> Self {
        self.hosts.insert(host.to_string(), script);
        self
    }

    pub fn with_ip_ping(mut self, ip: &str, rtt_ms: Option<f64>) -> Self {
        self.ip_pings.insert(ip.to_string(), rtt_ms);
        self
    }

    /// Every call made so far, as `"<op> <target>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count_calls(&self, op: &str, target: &str) -> usize {
        let needle = format!("{} {}", op, target);
        self.calls().iter().filter(|c| **c == needle).count()
    }

    fn record(&self, op: &str, target: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{} {}", op, target));
        }
    }

    fn host(&self, host: &str) -> Result<&HostScript> {
        self.hosts
            .get(host)
            .ok_or_else(|| AppError::dns_resolution(format!("{} is not scripted", host)))
    }

    /// Next element of a cycled sequence, tracked per (op, host)
    fn next<T: Copy>(&self, op: &str, host: &str, seq: &[T]) -> Option<T> {
        if seq.is_empty() {
            return None;
        }
        let mut cursors = self.cursors.lock().ok()?;
        let cursor = cursors.entry(format!("{} {}", op, host)).or_insert(0);
        let item = seq[*cursor % seq.len()];
        *cursor += 1;
        Some(item)
    }
}

#[async_trait]
impl NetworkProbe for FakeProbe {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        self.record("resolve", host);
        let script = self.host(host)?;
        tokio::time::sleep(script.dns_delay).await;
        if script.addrs.is_empty() {
            return Err(AppError::dns_resolution(format!("NXDOMAIN for {}", host)));
        }
        Ok(script.addrs.clone())
    }

    async fn dns_ttl(&self, host: &str) -> Result<u32> {
        self.record("dns_ttl", host);
        self.host(host)?
            .ttl
            .ok_or_else(|| AppError::unsupported("cached TTL"))
    }

    async fn tcp_connect(&self, host: &str, port: u16, _timeout: Duration) -> Result<Duration> {
        self.record("tcp_connect", host);
        let target = format!("{}:{}", host, port);
        match self.next("tcp", host, &self.host(host)?.tcp) {
            Some(Connect::Open(ms)) => Ok(Duration::from_secs_f64(ms / 1000.0)),
            Some(Connect::Timeout) => Err(AppError::timeout(target)),
            Some(Connect::Reset) => Err(AppError::connection_reset(target)),
            Some(Connect::Refused) | None => Err(AppError::network(format!("{} refused", target))),
        }
    }

    async fn http_get(&self, url: &str, _timeout: Duration) -> Result<u16> {
        let host = url::Url::parse(url)?
            .host_str()
            .map(str::to_string)
            .unwrap_or_default();
        self.record("http_get", &host);
        match self.next("http", &host, &self.host(&host)?.http) {
            Some(Http::Status(code)) => Ok(code),
            Some(Http::Timeout) => Err(AppError::timeout(url.to_string())),
            Some(Http::Reset) => Err(AppError::connection_reset(url.to_string())),
            Some(Http::Refused) | None => Err(AppError::network(format!("{} refused", url))),
        }
    }

    async fn ping(&self, target: &str, _timeout: Duration) -> Result<f64> {
        self.record("ping", target);
        let reply = match self.ip_pings.get(target) {
            Some(rtt) => *rtt,
            None => self.next("ping", target, &self.host(target)?.ping_ms).flatten(),
        };
        reply.ok_or_else(|| AppError::network(format!("No echo reply from {}", target)))
    }

    async fn ping_no_fragment(&self, host: &str, payload: u32, _timeout: Duration) -> Result<bool> {
        self.record("ping_df", host);
        Ok(self.host(host)?.max_df_payload.map_or(false, |max| payload <= max))
    }

    async fn udp_probe(&self, host: &str, port: u16, _timeout: Duration) -> Result<UdpOutcome> {
        self.record("udp", &format!("{}:{}", host, port));
        Ok(self.host(host)?.udp)
    }

    async fn established_connections(&self) -> Result<Vec<ConnectionInfo>> {
        self.record("connections", "-");
        Ok(self.connections.clone())
    }

    async fn adapter_power(&self) -> Result<Vec<AdapterPower>> {
        self.record("adapters", "-");
        Ok(self.adapters.clone())
    }

    async fn trace_route(&self, host: &str) -> Result<Vec<Hop>> {
        self.record("trace", host);
        let hops = self.host(host)?.hops.clone();
        if hops.is_empty() {
            return Err(AppError::timeout(format!("trace to {}", host)));
        }
        Ok(hops)
    }

    async fn proxy_settings(&self) -> Result<Option<String>> {
        Ok(self.proxy.clone())
    }

    async fn wifi_signal(&self) -> Result<Option<WifiSignal>> {
        Ok(self.wifi.clone())
    }

    async fn time_synchronized(&self) -> Result<bool> {
        Ok(self.time_synced)
    }
}
