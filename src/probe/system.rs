//! Probe implementation backed by the host operating system
//!
//! DNS goes through trust-dns with the system resolver configuration, TCP/UDP
//! through tokio sockets, HTTP through reqwest. ICMP, route tracing and
//! process/adapter enumeration shell out to the platform's own tools since
//! raw sockets need privileges this tool should not ask for.

use super::{parse, AdapterPower, ConnectionInfo, Hop, NetworkProbe, UdpOutcome, WifiSignal};
use crate::{
    defaults,
    error::{AppError, Result},
};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::{
    io::ErrorKind,
    net::{IpAddr, SocketAddr},
    process::{Output, Stdio},
    time::{Duration, Instant},
};
use tokio::{
    net::{TcpStream, UdpSocket},
    process::Command,
    time::timeout,
};
use trust_dns_resolver::{
    config::{LookupIpStrategy, ResolverOpts},
    system_conf, TokioAsyncResolver,
};

/// Proxy variables honoured by most HTTP stacks
const PROXY_VARS: &[&str] = &[
    "HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy",
];

/// Extra time granted to a spawned command beyond its own timeout
const COMMAND_GRACE: Duration = Duration::from_secs(2);

/// OS-backed [`NetworkProbe`]
pub struct SystemProbe {
    /// Uncached; every reachability check and lookup timing hits the network
    resolver: TokioAsyncResolver,
    /// Caching; only used to read the remaining lifetime of answers
    ttl_resolver: TokioAsyncResolver,
    http: Client,
}

impl SystemProbe {
    /// Build a probe from the system resolver configuration
    pub fn new() -> Result<Self> {
        let (config, opts) = system_conf::read_system_conf()
            .map_err(|e| AppError::dns_resolution(format!("Failed to read system DNS config: {}", e)))?;

        let resolver = TokioAsyncResolver::tokio(config.clone(), live_lookup_opts(&opts));
        let ttl_resolver = TokioAsyncResolver::tokio(config, cached_lookup_opts(&opts));

        let http = Client::builder()
            .timeout(defaults::HTTP_TIMEOUT)
            .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
            .redirect(Policy::limited(5))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { resolver, ttl_resolver, http })
    }
}

#[async_trait]
impl NetworkProbe for SystemProbe {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let lookup = timeout(defaults::DNS_TIMEOUT, self.resolver.lookup_ip(host))
            .await
            .map_err(|_| AppError::timeout(format!("DNS lookup for {} timed out", host)))??;

        let addrs: Vec<IpAddr> = lookup.iter().collect();
        if addrs.is_empty() {
            return Err(AppError::dns_resolution(format!("No addresses returned for {}", host)));
        }
        Ok(addrs)
    }

    async fn dns_ttl(&self, host: &str) -> Result<u32> {
        let lookup = timeout(defaults::DNS_TIMEOUT, self.ttl_resolver.lookup_ip(host))
            .await
            .map_err(|_| AppError::timeout(format!("DNS lookup for {} timed out", host)))??;

        let remaining = lookup.valid_until().saturating_duration_since(Instant::now());
        Ok(u32::try_from(remaining.as_secs()).unwrap_or(u32::MAX))
    }

    async fn tcp_connect(&self, host: &str, port: u16, limit: Duration) -> Result<Duration> {
        let target = format!("{}:{}", host, port);
        let start = Instant::now();

        match timeout(limit, TcpStream::connect((host, port))).await {
            Err(_) => Err(AppError::timeout(format!(
                "connect to {} exceeded {}ms",
                target,
                limit.as_millis()
            ))),
            Ok(Err(e)) => Err(AppError::from_socket_error(&e, &target)),
            Ok(Ok(stream)) => {
                let elapsed = start.elapsed();
                drop(stream);
                Ok(elapsed)
            }
        }
    }

    async fn http_get(&self, url: &str, limit: Duration) -> Result<u16> {
        let response = self.http.get(url).timeout(limit).send().await?;
        Ok(response.status().as_u16())
    }

    async fn ping(&self, target: &str, limit: Duration) -> Result<f64> {
        let (program, args) = ping_command(target, limit, None);
        let output = run_command(program, &args[..], limit + COMMAND_GRACE).await?;

        if !output.status.success() {
            return Err(AppError::network(format!("No echo reply from {}", target)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse::parse_ping_rtt(&stdout)
            .ok_or_else(|| AppError::parse(format!("Could not read round-trip time for {}", target)))
    }

    async fn ping_no_fragment(&self, host: &str, payload: u32, limit: Duration) -> Result<bool> {
        let (program, args) = ping_command(host, limit, Some(payload));
        let output = run_command(program, &args[..], limit + COMMAND_GRACE).await?;
        Ok(output.status.success())
    }

    async fn udp_probe(&self, host: &str, port: u16, limit: Duration) -> Result<UdpOutcome> {
        let target = format!("{}:{}", host, port);
        let addr = self
            .resolve(host)
            .await?
            .into_iter()
            .next()
            .map(|ip| SocketAddr::new(ip, port))
            .ok_or_else(|| AppError::dns_resolution(format!("No address for {}", host)))?;

        let bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).await?;
        socket
            .connect(addr)
            .await
            .map_err(|e| AppError::from_socket_error(&e, &target))?;
        socket
            .send(&stun_binding_request())
            .await
            .map_err(|e| AppError::from_socket_error(&e, &target))?;

        let mut buf = [0u8; 576];
        match timeout(limit, socket.recv(&mut buf)).await {
            Err(_) => Ok(UdpOutcome::NoResponse),
            Ok(Ok(bytes)) => Ok(UdpOutcome::Responded { bytes }),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(UdpOutcome::Refused),
            Ok(Err(e)) => Err(AppError::from_socket_error(&e, &target)),
        }
    }

    async fn established_connections(&self) -> Result<Vec<ConnectionInfo>> {
        let limit = defaults::COMMAND_TIMEOUT;

        if cfg!(windows) {
            let netstat = run_command("netstat", &["-ano", "-p", "TCP"], limit).await?;
            let tasklist = run_command("tasklist", &["/FO", "CSV", "/NH"], limit).await?;
            let names = parse::parse_tasklist_csv(&String::from_utf8_lossy(&tasklist.stdout));

            Ok(parse::parse_netstat_windows(&String::from_utf8_lossy(&netstat.stdout))
                .into_iter()
                .map(|(remote, pid)| ConnectionInfo {
                    process: names.get(&pid).cloned().unwrap_or_else(|| format!("pid {}", pid)),
                    pid: Some(pid),
                    remote,
                })
                .collect())
        } else if cfg!(target_os = "macos") {
            let output = run_command("lsof", &["-nP", "-iTCP", "-sTCP:ESTABLISHED"], limit).await?;
            Ok(parse::parse_lsof(&String::from_utf8_lossy(&output.stdout)))
        } else {
            let output = run_command("ss", &["-tnp", "state", "established"], limit).await?;
            Ok(parse::parse_ss(&String::from_utf8_lossy(&output.stdout)))
        }
    }

    async fn adapter_power(&self) -> Result<Vec<AdapterPower>> {
        if cfg!(windows) {
            let script = "Get-NetAdapterPowerManagement | Select-Object Name,@{n='AllowTurnOff';e={[string]$_.AllowComputerToTurnOffDevice}} | ConvertTo-Json";
            let output = run_command(
                "powershell",
                &["-NoProfile", "-NonInteractive", "-Command", script],
                defaults::COMMAND_TIMEOUT,
            )
            .await?;
            return parse::parse_adapter_power_json(&String::from_utf8_lossy(&output.stdout));
        }

        if !cfg!(target_os = "linux") {
            return Err(AppError::unsupported("adapter power management query"));
        }

        let mut adapters = Vec::new();
        let mut entries = tokio::fs::read_dir("/sys/class/net").await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "lo" {
                continue;
            }
            // virtual interfaces have no device node
            let control = entry.path().join("device/power/control");
            if let Ok(content) = tokio::fs::read_to_string(&control).await {
                adapters.push(AdapterPower {
                    name,
                    power_saving: parse::parse_power_control(&content),
                });
            }
        }
        adapters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(adapters)
    }

    async fn trace_route(&self, host: &str) -> Result<Vec<Hop>> {
        let max_hops = defaults::TRACE_MAX_HOPS.to_string();
        let output = if cfg!(windows) {
            run_command("tracert", &["-d", "-h", max_hops.as_str(), "-w", "2000", host], defaults::TRACE_TIMEOUT).await?
        } else {
            run_command("traceroute", &["-n", "-q", "1", "-w", "2", "-m", max_hops.as_str(), host], defaults::TRACE_TIMEOUT).await?
        };

        let hops = parse::parse_hops(&String::from_utf8_lossy(&output.stdout));
        if hops.is_empty() {
            return Err(AppError::parse(format!("Route trace to {} produced no hops", host)));
        }
        Ok(hops)
    }

    async fn proxy_settings(&self) -> Result<Option<String>> {
        let configured: Vec<String> = PROXY_VARS
            .iter()
            .filter_map(|key| {
                std::env::var(key)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| format!("{}={}", key, v))
            })
            .collect();

        Ok(if configured.is_empty() { None } else { Some(configured.join(", ")) })
    }

    async fn wifi_signal(&self) -> Result<Option<WifiSignal>> {
        if cfg!(windows) {
            let output = run_command("netsh", &["wlan", "show", "interfaces"], defaults::COMMAND_TIMEOUT).await?;
            if !output.status.success() {
                return Ok(None);
            }
            return Ok(parse::parse_netsh_wlan(&String::from_utf8_lossy(&output.stdout)));
        }

        if !cfg!(target_os = "linux") {
            return Err(AppError::unsupported("Wi-Fi signal query"));
        }

        match tokio::fs::read_to_string("/proc/net/wireless").await {
            Ok(content) => Ok(parse::parse_proc_wireless(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn time_synchronized(&self) -> Result<bool> {
        if cfg!(windows) {
            let output = run_command("w32tm", &["/query", "/status"], defaults::COMMAND_TIMEOUT).await?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Ok(output.status.success() && !stdout.contains("Local CMOS Clock"));
        }

        if !cfg!(target_os = "linux") {
            return Err(AppError::unsupported("time synchronization query"));
        }

        let output = run_command(
            "timedatectl",
            &["show", "-p", "NTPSynchronized", "--value"],
            defaults::COMMAND_TIMEOUT,
        )
        .await?;
        parse::parse_timedatectl(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Resolver options for live checks: A and AAAA both queried, nothing cached
fn live_lookup_opts(system: &ResolverOpts) -> ResolverOpts {
    let mut opts = cached_lookup_opts(system);
    opts.cache_size = 0;
    opts
}

/// Resolver options that keep answers cached for their TTL
fn cached_lookup_opts(system: &ResolverOpts) -> ResolverOpts {
    let mut opts = system.clone();
    opts.timeout = defaults::DNS_TIMEOUT;
    opts.attempts = 1;
    // the default Ipv4thenIpv6 skips AAAA whenever an A record exists
    opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
    opts
}

/// Platform-specific `ping` invocation for one echo request
fn ping_command(target: &str, limit: Duration, df_payload: Option<u32>) -> (&'static str, Vec<String>) {
    let is_v6 = matches!(target.parse::<IpAddr>(), Ok(IpAddr::V6(_)));
    let millis = limit.as_millis().max(1).to_string();
    let mut args: Vec<String> = Vec::new();

    let program = if cfg!(windows) {
        args.extend(["-n", "1", "-w", millis.as_str()].map(String::from));
        if let Some(size) = df_payload {
            args.extend(["-f".to_string(), "-l".to_string(), size.to_string()]);
        }
        "ping"
    } else if cfg!(target_os = "macos") {
        if is_v6 {
            // ping6 has no per-reply wait flag
            args.extend(["-c", "1"].map(String::from));
            "ping6"
        } else {
            args.extend(["-n", "-c", "1", "-W", millis.as_str()].map(String::from));
            if let Some(size) = df_payload {
                args.extend(["-D".to_string(), "-s".to_string(), size.to_string()]);
            }
            "ping"
        }
    } else {
        let secs = limit.as_secs().max(1).to_string();
        args.extend(["-n", "-c", "1", "-W", secs.as_str()].map(String::from));
        if let Some(size) = df_payload {
            args.extend(["-M".to_string(), "do".to_string(), "-s".to_string(), size.to_string()]);
        }
        "ping"
    };

    args.push(target.to_string());
    (program, args)
}

/// Run a command to completion, killing it if it outlives `limit`
async fn run_command<S: AsRef<str>>(program: &str, args: &[S], limit: Duration) -> Result<Output> {
    let mut command = Command::new(program);
    command
        .args(args.iter().map(|a| a.as_ref()))
        .stdin(Stdio::null())
        .kill_on_drop(true);

    match timeout(limit, command.output()).await {
        Err(_) => Err(AppError::timeout(format!(
            "{} did not finish within {}s",
            program,
            limit.as_secs()
        ))),
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
            Err(AppError::unsupported(format!("{} is not installed", program)))
        }
        Ok(Err(e)) => Err(AppError::io(format!("Failed to run {}: {}", program, e))),
        Ok(Ok(output)) => Ok(output),
    }
}

/// 20-byte STUN Binding Request (RFC 5389) with a random transaction id
fn stun_binding_request() -> [u8; 20] {
    let mut packet = [0u8; 20];
    packet[0..2].copy_from_slice(&0x0001u16.to_be_bytes());
    packet[4..8].copy_from_slice(&0x2112_A442u32.to_be_bytes());
    packet[8..20].copy_from_slice(&uuid::Uuid::new_v4().as_bytes()[..12]);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stun_request_layout() {
        let packet = stun_binding_request();
        assert_eq!(&packet[0..2], &[0x00, 0x01]);
        assert_eq!(&packet[2..4], &[0x00, 0x00]);
        assert_eq!(&packet[4..8], &[0x21, 0x12, 0xA4, 0x42]);
        assert_ne!(stun_binding_request()[8..20], packet[8..20]);
    }

    #[test]
    fn test_ping_command_targets_host_last() {
        let (program, args) = ping_command("example.com", Duration::from_secs(2), None);
        assert!(program.starts_with("ping"));
        assert_eq!(args.last().map(String::as_str), Some("example.com"));
    }

    #[test]
    fn test_ping_command_sets_payload_size() {
        let (_, args) = ping_command("example.com", Duration::from_secs(2), Some(1472));
        assert!(args.iter().any(|a| a == "1472"));
    }

    #[tokio::test]
    async fn test_missing_command_is_unsupported() {
        let err = run_command("definitely-not-a-real-binary-xyz", &["--version"], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_tcp_connect_refused_is_classified() {
        // bind then drop to find a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = SystemProbe::new().unwrap();
        let err = probe
            .tcp_connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.is_network_failure());
    }

    #[tokio::test]
    async fn test_tcp_connect_success() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = SystemProbe::new().unwrap();
        let elapsed = probe
            .tcp_connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_resolve_ip_literal_skips_dns() {
        let probe = SystemProbe::new().unwrap();
        let addrs = probe.resolve("127.0.0.1").await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_live_lookups_query_both_families_uncached() {
        let opts = live_lookup_opts(&ResolverOpts::default());
        assert_eq!(opts.ip_strategy, LookupIpStrategy::Ipv4AndIpv6);
        assert_eq!(opts.cache_size, 0);
        assert_eq!(opts.timeout, defaults::DNS_TIMEOUT);
        assert_eq!(opts.attempts, 1);
    }

    #[test]
    fn test_ttl_lookups_keep_the_cache() {
        let system = ResolverOpts::default();
        let opts = cached_lookup_opts(&system);
        assert_eq!(opts.ip_strategy, LookupIpStrategy::Ipv4AndIpv6);
        assert_eq!(opts.cache_size, system.cache_size);
        assert!(opts.cache_size > 0);
    }

    #[tokio::test]
    async fn test_udp_probe_loopback_echo() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            if let Ok((n, peer)) = server.recv_from(&mut buf).await {
                let _ = server.send_to(&buf[..n], peer).await;
            }
        });

        let probe = SystemProbe::new().unwrap();
        let outcome = probe
            .udp_probe("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome, UdpOutcome::Responded { bytes: 20 });
    }
}
