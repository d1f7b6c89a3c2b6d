//! AVD Connectivity Monitor
//!
//! A long-running network diagnostics tool that checks reachability and link
//! quality towards Azure Virtual Desktop endpoints, grading every measurement
//! and recording the results in a timestamped log and a daily CSV summary.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod scheduler;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{DiagnosticSuite, SuiteRunner};
pub use logging::{LogLevel, Logger};
pub use models::{AdvancedResults, Config, EndpointResult, Finding, TestSummary, Verdict};
pub use output::{CsvExporter, Reporter};
pub use probe::{NetworkProbe, SystemProbe};
pub use scheduler::Scheduler;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
/// Stamped by build.rs
pub const BUILD_TIME: Option<&str> = option_env!("BUILD_TIME");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Version line for the banner, with build metadata when present
pub fn version_line() -> String {
    let mut line = format!("{} v{}", PKG_NAME, VERSION);
    match (GIT_COMMIT, BUILD_TIME) {
        (Some(commit), Some(time)) => line.push_str(&format!(" ({}, built {})", commit, time)),
        (None, Some(time)) => line.push_str(&format!(" (built {})", time)),
        _ => {}
    }
    line
}

/// Default configuration values and probe parameters
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_ENDPOINTS: &[&str] = &[
        "rdweb.wvd.microsoft.com",
        "client.wvd.microsoft.com",
        "rdbroker.wvd.microsoft.com",
        "rdgateway.wvd.microsoft.com",
        "login.microsoftonline.com",
    ];
    pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    pub const DEFAULT_BROKER_HOST: &str = "rdbroker.wvd.microsoft.com";
    /// TURN/STUN relay used for the UDP (RDP Shortpath) probe
    pub const DEFAULT_RELAY_HOST: &str = "world.relay.avd.microsoft.com";
    pub const DEFAULT_UDP_PORTS: &[u16] = &[3478, 3479, 3480, 3481];

    pub const DEFAULT_SUSTAINED_SECONDS: u64 = 30;
    pub const SUSTAINED_POLL: Duration = Duration::from_secs(2);
    pub const DEFAULT_BROKER_REQUESTS: u32 = 10;

    pub const LATENCY_PINGS: u32 = 4;
    pub const LOSS_PINGS: u32 = 20;
    pub const JITTER_PINGS: u32 = 20;
    pub const STABILITY_CYCLES: u32 = 10;

    pub const DNS_TIMEOUT: Duration = Duration::from_secs(5);
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
    pub const TCP_TIMEOUT: Duration = Duration::from_secs(3);
    pub const STABILITY_TIMEOUT: Duration = Duration::from_millis(2000);
    pub const PING_TIMEOUT: Duration = Duration::from_secs(2);
    pub const UDP_TIMEOUT: Duration = Duration::from_secs(2);
    pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
    pub const TRACE_TIMEOUT: Duration = Duration::from_secs(60);
    pub const TRACE_MAX_HOPS: u32 = 30;

    /// Don't-fragment payload sizes tried in order; first success wins
    pub const MTU_PAYLOADS: &[u32] = &[1500, 1472, 1460, 1400, 1280];
    /// IPv4 + ICMP header bytes added to the payload
    pub const MTU_HEADER_OVERHEAD: u32 = 28;

    /// Process names known to saturate a link
    pub const HEAVY_PROCESSES: &[&str] = &[
        "onedrive", "dropbox", "googledrivesync", "teams", "zoom", "steam",
        "epicgameslauncher", "origin", "battle.net", "bittorrent", "utorrent",
        "qbittorrent", "transmission", "backblaze", "crashplan", "windowsupdate",
        "wuauserv", "msedgewebview2", "spotify", "netflix",
    ];
}
