//! Diagnostic execution engine
//!
//! This module contains the sequential test pipeline:
//! - Per-endpoint runner (DNS, TCP, HTTPS, latency, loss, jitter, stability, MTU)
//! - Suite-level probes run once per pass (UDP, sustained, broker stress, ...)
//! - The suite itself, which folds everything into a [`TestSummary`]
//!
//! Every probe is awaited one after another; nothing runs concurrently.

pub mod advanced;
pub mod endpoint;

pub use advanced::AdvancedRunner;
pub use endpoint::EndpointRunner;

use crate::{
    defaults,
    logging::Logger,
    models::{Config, TestSummary},
    probe::NetworkProbe,
};
use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Probe counts, timeouts and targets for one suite pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Endpoints in test order
    pub endpoints: Vec<String>,
    pub tcp_timeout: Duration,
    pub http_timeout: Duration,
    pub ping_timeout: Duration,
    pub stability_timeout: Duration,
    pub udp_timeout: Duration,
    pub latency_pings: u32,
    pub loss_pings: u32,
    pub jitter_pings: u32,
    pub stability_cycles: u32,
    /// Don't-fragment payload sizes, largest first
    pub mtu_payloads: Vec<u32>,
    pub sustained_duration: Duration,
    pub sustained_poll: Duration,
    pub broker_host: String,
    pub broker_requests: u32,
    pub relay_host: String,
    pub udp_ports: Vec<u16>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ExecutionConfig {
    fn from(config: &Config) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            tcp_timeout: defaults::TCP_TIMEOUT,
            http_timeout: defaults::HTTP_TIMEOUT,
            ping_timeout: defaults::PING_TIMEOUT,
            stability_timeout: defaults::STABILITY_TIMEOUT,
            udp_timeout: defaults::UDP_TIMEOUT,
            latency_pings: defaults::LATENCY_PINGS,
            loss_pings: defaults::LOSS_PINGS,
            jitter_pings: defaults::JITTER_PINGS,
            stability_cycles: defaults::STABILITY_CYCLES,
            mtu_payloads: defaults::MTU_PAYLOADS.to_vec(),
            sustained_duration: config.sustained_duration(),
            sustained_poll: defaults::SUSTAINED_POLL,
            broker_host: config.broker_host.clone(),
            broker_requests: config.broker_stress_requests,
            relay_host: config.relay_host.clone(),
            udp_ports: config.udp_ports.clone(),
        }
    }
}

impl ExecutionConfig {
    /// Target of the sustained, IPv6 and route-trace probes
    pub fn primary_endpoint(&self) -> Option<&str> {
        self.endpoints.first().map(String::as_str)
    }
}

/// Anything that can produce one finalized suite run
#[async_trait]
pub trait SuiteRunner: Send + Sync {
    async fn run_suite(&self) -> TestSummary;
}

/// Runs every endpoint, then the suite-level probes, and folds the results
pub struct DiagnosticSuite {
    probe: Arc<dyn NetworkProbe>,
    logger: Arc<Logger>,
    settings: ExecutionConfig,
}

impl DiagnosticSuite {
    pub fn new(probe: Arc<dyn NetworkProbe>, logger: Arc<Logger>, config: &Config) -> Self {
        Self::with_settings(probe, logger, ExecutionConfig::from(config))
    }

    pub fn with_settings(probe: Arc<dyn NetworkProbe>, logger: Arc<Logger>, settings: ExecutionConfig) -> Self {
        Self { probe, logger, settings }
    }

    /// One complete pass. Probe failures are graded, never propagated.
    pub async fn run_suite(&self) -> TestSummary {
        let run_started = Local::now();
        self.logger
            .info("Starting diagnostic run")
            .field("endpoints", self.settings.endpoints.len())
            .log();

        let runner = EndpointRunner::new(self.probe.as_ref(), &self.logger, &self.settings);
        let mut endpoints = Vec::with_capacity(self.settings.endpoints.len());
        for host in &self.settings.endpoints {
            endpoints.push(runner.run(host).await);
        }

        let advanced = AdvancedRunner::new(self.probe.as_ref(), &self.logger, &self.settings)
            .run()
            .await;

        TestSummary::from_parts(run_started, endpoints, advanced)
    }
}

#[async_trait]
impl SuiteRunner for DiagnosticSuite {
    async fn run_suite(&self) -> TestSummary {
        DiagnosticSuite::run_suite(self).await
    }
}

// Scenario tests driving the whole pipeline through the scripted probe
#[cfg(test)]
mod comprehensive_tests;
