//! Configuration data model and validation

use crate::defaults;
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variables understood by the monitor
pub const ENV_ENDPOINTS: &str = "AVD_ENDPOINTS";
pub const ENV_INTERVAL: &str = "INTERVAL_MINUTES";
pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const ENV_ENABLE_COLOR: &str = "ENABLE_COLOR";
pub const ENV_SUSTAINED_SECONDS: &str = "SUSTAINED_TEST_SECONDS";
pub const ENV_BROKER_REQUESTS: &str = "BROKER_STRESS_REQUESTS";

pub const INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=1440;
pub const SUSTAINED_RANGE: std::ops::RangeInclusive<u64> = 2..=600;
pub const BROKER_REQUESTS_RANGE: std::ops::RangeInclusive<u32> = 1..=100;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Hosts tested one after another, in this order
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Minutes between the end of one run and the start of the next
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    /// Directory receiving the session log and the daily CSV
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Run the suite once and exit
    #[serde(default)]
    pub once: bool,

    /// Length of the sustained-connection test
    #[serde(default = "default_sustained_seconds")]
    pub sustained_test_seconds: u64,

    /// Requests fired by the broker stress test
    #[serde(default = "default_broker_requests")]
    pub broker_stress_requests: u32,

    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    /// STUN/TURN relay for the UDP probe
    #[serde(default = "default_relay_host")]
    pub relay_host: String,

    #[serde(default = "default_udp_ports")]
    pub udp_ports: Vec<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            interval_minutes: default_interval_minutes(),
            log_dir: default_log_dir(),
            enable_color: default_enable_color(),
            debug: false,
            once: false,
            sustained_test_seconds: default_sustained_seconds(),
            broker_stress_requests: default_broker_requests(),
            broker_host: default_broker_host(),
            relay_host: default_relay_host(),
            udp_ports: default_udp_ports(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }

    pub fn sustained_duration(&self) -> Duration {
        Duration::from_secs(self.sustained_test_seconds)
    }

    /// Host used by the endpoint-independent probes (sustained, trace, IPv6)
    pub fn primary_endpoint(&self) -> Option<&str> {
        self.endpoints.first().map(String::as_str)
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(AppError::config("At least one endpoint is required"));
        }

        for host in self.endpoints.iter().chain([&self.broker_host, &self.relay_host]) {
            validate_host(host)?;
        }

        if !INTERVAL_RANGE.contains(&self.interval_minutes) {
            return Err(AppError::config(format!(
                "Interval must be between {} and {} minutes, got {}",
                INTERVAL_RANGE.start(),
                INTERVAL_RANGE.end(),
                self.interval_minutes
            )));
        }

        if !SUSTAINED_RANGE.contains(&self.sustained_test_seconds) {
            return Err(AppError::config(format!(
                "Sustained test length must be between {} and {} seconds, got {}",
                SUSTAINED_RANGE.start(),
                SUSTAINED_RANGE.end(),
                self.sustained_test_seconds
            )));
        }

        if !BROKER_REQUESTS_RANGE.contains(&self.broker_stress_requests) {
            return Err(AppError::config(format!(
                "Broker stress request count must be between {} and {}, got {}",
                BROKER_REQUESTS_RANGE.start(),
                BROKER_REQUESTS_RANGE.end(),
                self.broker_stress_requests
            )));
        }

        if self.udp_ports.iter().any(|&p| p == 0) {
            return Err(AppError::config("UDP port 0 is not a valid probe target"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        self.merge_from_lookup(|key| std::env::var(key).ok())
    }

    /// Merge values from any key lookup; unset keys leave fields untouched
    pub fn merge_from_lookup<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoints) = lookup(ENV_ENDPOINTS) {
            self.endpoints = split_list(&endpoints);
        }

        if let Some(interval) = lookup(ENV_INTERVAL) {
            self.interval_minutes = interval.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid {} value '{}': {}", ENV_INTERVAL, interval, e))
            })?;
        }

        if let Some(log_dir) = lookup(ENV_LOG_DIR).filter(|v| !v.trim().is_empty()) {
            self.log_dir = PathBuf::from(log_dir.trim());
        }

        if let Some(enable_color) = lookup(ENV_ENABLE_COLOR) {
            self.enable_color = enable_color.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid {} value '{}': {}", ENV_ENABLE_COLOR, enable_color, e))
            })?;
        }

        if let Some(seconds) = lookup(ENV_SUSTAINED_SECONDS) {
            self.sustained_test_seconds = seconds.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid {} value '{}': {}", ENV_SUSTAINED_SECONDS, seconds, e))
            })?;
        }

        if let Some(requests) = lookup(ENV_BROKER_REQUESTS) {
            self.broker_stress_requests = requests.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid {} value '{}': {}", ENV_BROKER_REQUESTS, requests, e))
            })?;
        }

        Ok(())
    }
}

/// An endpoint must be a bare hostname or IP literal, not a URL
pub fn validate_host(host: &str) -> Result<()> {
    if host.trim().is_empty() {
        return Err(AppError::config("Endpoint host cannot be empty"));
    }
    if host.contains("://") || host.contains('/') {
        return Err(AppError::config(format!(
            "Endpoint '{}' must be a hostname, not a URL",
            host
        )));
    }
    url::Host::parse(host)
        .map(|_| ())
        .map_err(|e| AppError::config(format!("Invalid endpoint host '{}': {}", host, e)))
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Default value functions for serde
fn default_endpoints() -> Vec<String> {
    defaults::DEFAULT_ENDPOINTS.iter().map(|&s| s.to_string()).collect()
}

fn default_interval_minutes() -> u32 {
    defaults::DEFAULT_INTERVAL_MINUTES
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_enable_color() -> bool {
    defaults::DEFAULT_ENABLE_COLOR
}

fn default_sustained_seconds() -> u64 {
    defaults::DEFAULT_SUSTAINED_SECONDS
}

fn default_broker_requests() -> u32 {
    defaults::DEFAULT_BROKER_REQUESTS
}

fn default_broker_host() -> String {
    defaults::DEFAULT_BROKER_HOST.to_string()
}

fn default_relay_host() -> String {
    defaults::DEFAULT_RELAY_HOST.to_string()
}

fn default_udp_ports() -> Vec<u16> {
    defaults::DEFAULT_UDP_PORTS.to_vec()
}
