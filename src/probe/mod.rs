//! Narrow interface onto the operating system's network facilities
//!
//! The runners only ever talk to a [`NetworkProbe`]. Each method is a single
//! shot: it either yields a raw value or a classified [`AppError`]
//! (`Timeout`, `ConnectionReset`, `Network`, `DnsResolution`, `Unsupported`).

pub mod parse;
pub mod system;

#[cfg(test)]
pub(crate) mod fake;

pub use system::SystemProbe;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Network primitives consumed by the diagnostic engine
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Resolve a hostname to all of its addresses
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;

    /// Remaining TTL in seconds of the cached answer for `host`
    async fn dns_ttl(&self, host: &str) -> Result<u32>;

    /// Open and immediately close a TCP connection; returns connect time
    async fn tcp_connect(&self, host: &str, port: u16, timeout: Duration) -> Result<Duration>;

    /// Issue one HTTP GET and return the status code, whatever it is
    async fn http_get(&self, url: &str, timeout: Duration) -> Result<u16>;

    /// One ICMP echo; returns the round-trip time in milliseconds
    async fn ping(&self, target: &str, timeout: Duration) -> Result<f64>;

    /// One ICMP echo with the don't-fragment bit set and `payload` bytes of data
    async fn ping_no_fragment(&self, host: &str, payload: u32, timeout: Duration) -> Result<bool>;

    /// Send a STUN binding request over UDP and wait briefly for an answer
    async fn udp_probe(&self, host: &str, port: u16, timeout: Duration) -> Result<UdpOutcome>;

    /// Currently established TCP connections with their owning process
    async fn established_connections(&self) -> Result<Vec<ConnectionInfo>>;

    /// Power-management state of the network adapters
    async fn adapter_power(&self) -> Result<Vec<AdapterPower>>;

    /// Trace the route to `host`
    async fn trace_route(&self, host: &str) -> Result<Vec<Hop>>;

    /// Proxy configuration visible to this process, if any
    async fn proxy_settings(&self) -> Result<Option<String>>;

    /// Signal of the active Wi-Fi interface; `None` when not on Wi-Fi
    async fn wifi_signal(&self) -> Result<Option<WifiSignal>>;

    /// Whether the system clock reports itself as synchronized
    async fn time_synchronized(&self) -> Result<bool>;
}

/// What came back from a UDP probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UdpOutcome {
    /// A datagram came back (a STUN binding response when the relay answers)
    Responded { bytes: usize },
    /// Nothing came back before the timeout: open or filtered
    NoResponse,
    /// ICMP port unreachable surfaced as a refused socket
    Refused,
}

/// One established TCP connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub process: String,
    pub pid: Option<u32>,
    pub remote: String,
}

/// Power-saving state of one adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterPower {
    pub name: String,
    pub power_saving: bool,
}

/// One hop of a traced route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub number: u32,
    pub address: Option<String>,
    pub rtt_ms: Option<f64>,
}

/// Signal report for a wireless interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiSignal {
    pub interface: String,
    pub signal_dbm: Option<f64>,
    pub quality_percent: Option<f64>,
}
