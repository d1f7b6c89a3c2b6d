//! Whole-pipeline scenarios against the scripted probe

use super::*;
use crate::probe::fake::{FakeProbe, HostScript, Http};
use crate::types::{Grade, Measurement, MetricKind};

fn suite_for(probe: FakeProbe, endpoints: &[&str]) -> (Arc<FakeProbe>, DiagnosticSuite) {
    let probe = Arc::new(probe);
    let settings = ExecutionConfig {
        endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
        broker_host: "broker.example.com".to_string(),
        relay_host: "relay.example.com".to_string(),
        ..ExecutionConfig::default()
    };
    let logger = Arc::new(Logger::new(false, false).silent());
    let suite = DiagnosticSuite::with_settings(probe.clone(), logger, settings);
    (probe, suite)
}

fn with_support_hosts(probe: FakeProbe) -> FakeProbe {
    probe
        .with_host("broker.example.com", HostScript::healthy("192.0.2.200", 20.0))
        .with_host("relay.example.com", HostScript::healthy("192.0.2.201", 20.0))
}

/// Ping script covering latency (4), loss (20) and jitter (20) in call order
fn ping_script(latency: &[Option<f64>], loss: &[Option<f64>], jitter: &[Option<f64>]) -> Vec<Option<f64>> {
    assert_eq!(latency.len(), 4);
    assert_eq!(loss.len(), 20);
    assert_eq!(jitter.len(), 20);
    latency.iter().chain(loss).chain(jitter).cloned().collect()
}

#[tokio::test(start_paused = true)]
async fn test_healthy_endpoint_end_to_end() {
    let probe = with_support_hosts(FakeProbe::new())
        .with_host("example.com", HostScript::healthy("93.184.216.34", 30.0));
    let (_, suite) = suite_for(probe, &["example.com"]);

    let summary = suite.run_suite().await;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.success_rate(), 100.0);

    let endpoint = summary.endpoint("example.com").unwrap();
    assert!(!endpoint.short_circuited);

    let latency = endpoint.verdict(MetricKind::Latency).unwrap();
    assert_eq!(latency.measurement, Some(Measurement::DurationMs(30.0)));
    assert_eq!(latency.grade, Grade::Excellent);
    assert_eq!(endpoint.verdict(MetricKind::PacketLoss).unwrap().grade, Grade::None);
    assert_eq!(endpoint.verdict(MetricKind::Jitter).unwrap().grade, Grade::Excellent);
    assert_eq!(endpoint.verdict(MetricKind::ConnectionStability).unwrap().grade, Grade::Excellent);
}

#[tokio::test(start_paused = true)]
async fn test_endpoint_metric_order_is_fixed() {
    let probe = with_support_hosts(FakeProbe::new())
        .with_host("example.com", HostScript::healthy("93.184.216.34", 30.0));
    let (_, suite) = suite_for(probe, &["example.com"]);

    let summary = suite.run_suite().await;
    let order: Vec<MetricKind> = summary.endpoints[0].verdicts.iter().map(|v| v.metric).collect();
    assert_eq!(
        order,
        vec![
            MetricKind::Dns,
            MetricKind::DnsLookupTime,
            MetricKind::Tcp443,
            MetricKind::Https,
            MetricKind::Latency,
            MetricKind::PacketLoss,
            MetricKind::Jitter,
            MetricKind::ConnectionStability,
            MetricKind::Mtu,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dns_failure_short_circuits_endpoint() {
    let probe = with_support_hosts(FakeProbe::new())
        .with_host("down.example.com", HostScript::unresolvable());
    let (_, suite) = suite_for(probe, &["down.example.com"]);

    let summary = suite.run_suite().await;
    assert_eq!(summary.total, 1);
    assert_eq!(summary.passed, 0);
    assert_eq!(summary.failed, 1);

    let result = summary.endpoint("down.example.com").unwrap();
    assert!(result.short_circuited);
    assert_eq!(result.verdict(MetricKind::Dns).unwrap().grade, Grade::Fail);
    for kind in endpoint::DEPENDENT_METRICS {
        assert!(result.verdict(*kind).unwrap().is_unavailable(), "{:?}", kind);
    }
}

#[tokio::test(start_paused = true)]
async fn test_dns_failure_issues_no_further_probes() {
    let probe = FakeProbe::new().with_host("down.example.com", HostScript::unresolvable());
    let logger = Logger::new(false, false).silent();
    let settings = ExecutionConfig::default();

    EndpointRunner::new(&probe, &logger, &settings)
        .run("down.example.com")
        .await;
    assert_eq!(probe.calls(), vec!["resolve down.example.com".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_auth_challenges_count_as_reachable() {
    let mut unauthorized = HostScript::healthy("192.0.2.10", 40.0);
    unauthorized.http = vec![Http::Status(401)];
    let mut forbidden = HostScript::healthy("192.0.2.11", 40.0);
    forbidden.http = vec![Http::Status(403)];
    let mut broken = HostScript::healthy("192.0.2.12", 40.0);
    broken.http = vec![Http::Status(500)];

    let probe = with_support_hosts(FakeProbe::new())
        .with_host("a.example.com", unauthorized)
        .with_host("b.example.com", forbidden)
        .with_host("c.example.com", broken);
    let (_, suite) = suite_for(probe, &["a.example.com", "b.example.com", "c.example.com"]);

    let summary = suite.run_suite().await;
    let https = |host: &str| summary.endpoint(host).unwrap().verdict(MetricKind::Https).unwrap().grade;
    assert_eq!(https("a.example.com"), Grade::Pass);
    assert_eq!(https("b.example.com"), Grade::Pass);
    assert_eq!(https("c.example.com"), Grade::Fail);
    assert_eq!(summary.total, 9);
    assert_eq!(summary.passed, 8);
}

#[tokio::test(start_paused = true)]
async fn test_broker_stress_accepts_auth_challenges() {
    let mut broker = HostScript::healthy("192.0.2.200", 20.0);
    broker.http = vec![Http::Status(401), Http::Status(403)];
    let probe = with_support_hosts(FakeProbe::new())
        .with_host("broker.example.com", broker)
        .with_host("example.com", HostScript::healthy("93.184.216.34", 30.0));
    let (probe, suite) = suite_for(probe, &["example.com"]);

    let summary = suite.run_suite().await;
    let verdict = summary.advanced.verdict(MetricKind::BrokerSuccessRate).unwrap();
    assert_eq!(verdict.measurement, Some(Measurement::Percent(100.0)));
    assert_eq!(verdict.grade, Grade::Excellent);
    assert_eq!(probe.count_calls("http_get", "broker.example.com"), 10);
    // suite-level probes never move the counters
    assert_eq!(summary.total, 3);
}

#[tokio::test(start_paused = true)]
async fn test_mtu_first_passing_size_plus_headers() {
    let probe = with_support_hosts(FakeProbe::new())
        .with_host("example.com", HostScript::healthy("93.184.216.34", 30.0));
    let (probe, suite) = suite_for(probe, &["example.com"]);

    let summary = suite.run_suite().await;
    let mtu = summary.endpoints[0].verdict(MetricKind::Mtu).unwrap();
    assert_eq!(mtu.measurement, Some(Measurement::Bytes(1500)));
    assert_eq!(mtu.grade, Grade::Optimal);
    // 1500 fails, 1472 passes, nothing smaller is tried
    assert_eq!(probe.count_calls("ping_df", "example.com"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_single_lost_echo_is_moderate_loss() {
    let mut loss = vec![Some(20.0); 20];
    loss[7] = None;
    let mut script = HostScript::healthy("192.0.2.10", 20.0);
    script.ping_ms = ping_script(&[Some(20.0); 4], &loss, &[Some(20.0); 20]);

    let probe = with_support_hosts(FakeProbe::new()).with_host("lossy.example.com", script);
    let (_, suite) = suite_for(probe, &["lossy.example.com"]);

    let summary = suite.run_suite().await;
    let verdict = summary.endpoints[0].verdict(MetricKind::PacketLoss).unwrap();
    assert_eq!(verdict.measurement, Some(Measurement::Percent(5.0)));
    assert_eq!(verdict.grade, Grade::Moderate);
}

#[tokio::test(start_paused = true)]
async fn test_alternating_samples_give_acceptable_jitter() {
    let jitter: Vec<Option<f64>> = (0..20).map(|i| Some(if i % 2 == 0 { 10.0 } else { 30.0 })).collect();
    let mut script = HostScript::healthy("192.0.2.10", 20.0);
    script.ping_ms = ping_script(&[Some(20.0); 4], &[Some(20.0); 20], &jitter);

    let probe = with_support_hosts(FakeProbe::new()).with_host("jittery.example.com", script);
    let (_, suite) = suite_for(probe, &["jittery.example.com"]);

    let summary = suite.run_suite().await;
    let verdict = summary.endpoints[0].verdict(MetricKind::Jitter).unwrap();
    assert_eq!(verdict.measurement, Some(Measurement::DurationMs(10.0)));
    assert_eq!(verdict.grade, Grade::Acceptable);
}

#[tokio::test(start_paused = true)]
async fn test_endpoints_run_in_list_order() {
    let probe = with_support_hosts(FakeProbe::new())
        .with_host("first.example.com", HostScript::healthy("192.0.2.1", 20.0))
        .with_host("down.example.com", HostScript::unresolvable())
        .with_host("last.example.com", HostScript::healthy("192.0.2.3", 20.0));
    let (probe, suite) = suite_for(probe, &["first.example.com", "down.example.com", "last.example.com"]);

    let summary = suite.run_suite().await;
    let hosts: Vec<&str> = summary.endpoints.iter().map(|e| e.host.as_str()).collect();
    assert_eq!(hosts, vec!["first.example.com", "down.example.com", "last.example.com"]);
    assert_eq!(summary.total, 7);
    assert_eq!(summary.passed, 6);

    let calls = probe.calls();
    let resolve_at = |host: &str| calls.iter().position(|c| *c == format!("resolve {}", host)).unwrap();
    assert!(resolve_at("first.example.com") < resolve_at("down.example.com"));
    assert!(resolve_at("down.example.com") < resolve_at("last.example.com"));
}
