//! Parsers for the output of platform diagnostic commands
//!
//! Kept free of I/O so that every format can be exercised with captured
//! samples from Linux, macOS and Windows.

use super::{AdapterPower, ConnectionInfo, Hop, WifiSignal};
use crate::error::{AppError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

/// Round-trip time from one `ping` reply (`time=12.3 ms`, `time<1ms`)
pub fn parse_ping_rtt(output: &str) -> Option<f64> {
    let re = Regex::new(r"(?i)time\s*([=<])\s*([\d.]+)\s*ms").ok()?;
    let caps = re.captures(output)?;
    let value: f64 = caps[2].parse().ok()?;
    // "<1ms" carries no precision; report the bound
    Some(value)
}

/// Hops of a `traceroute -n` or `tracert -d` listing
pub fn parse_hops(output: &str) -> Vec<Hop> {
    let (Ok(line_re), Ok(addr_re), Ok(rtt_re)) = (
        Regex::new(r"^\s*(\d+)\s+(.*)$"),
        Regex::new(r"(\d{1,3}(?:\.\d{1,3}){3}|[0-9a-fA-F]{0,4}(?::[0-9a-fA-F]{0,4}){2,7})"),
        Regex::new(r"<?([\d.]+)\s*ms"),
    ) else {
        return Vec::new();
    };

    output
        .lines()
        .filter_map(|line| {
            let caps = line_re.captures(line)?;
            let number: u32 = caps[1].parse().ok()?;
            let rest = &caps[2];
            Some(Hop {
                number,
                address: addr_re.find(rest).map(|m| m.as_str().to_string()),
                rtt_ms: rtt_re
                    .captures(rest)
                    .and_then(|c| c[1].parse().ok()),
            })
        })
        .collect()
}

/// Established connections from `ss -tnp state established`
pub fn parse_ss(output: &str) -> Vec<ConnectionInfo> {
    let Ok(re) = Regex::new(r#"^\s*\d+\s+\d+\s+\S+\s+(\S+)\s+users:\(\("([^"]+)",pid=(\d+)"#) else {
        return Vec::new();
    };

    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            Some(ConnectionInfo {
                process: caps[2].to_string(),
                pid: caps[3].parse().ok(),
                remote: caps[1].to_string(),
            })
        })
        .collect()
}

/// Established connections from `lsof -nP -iTCP -sTCP:ESTABLISHED`
pub fn parse_lsof(output: &str) -> Vec<ConnectionInfo> {
    let Ok(re) = Regex::new(r"^(\S+)\s+(\d+)\s+.*->(\S+)\s+\(ESTABLISHED\)") else {
        return Vec::new();
    };

    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            Some(ConnectionInfo {
                process: caps[1].to_string(),
                pid: caps[2].parse().ok(),
                remote: caps[3].to_string(),
            })
        })
        .collect()
}

/// (remote address, pid) pairs from Windows `netstat -ano -p TCP`
pub fn parse_netstat_windows(output: &str) -> Vec<(String, u32)> {
    let Ok(re) = Regex::new(r"^\s*TCP\s+\S+\s+(\S+)\s+ESTABLISHED\s+(\d+)") else {
        return Vec::new();
    };

    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            Some((caps[1].to_string(), caps[2].parse().ok()?))
        })
        .collect()
}

/// pid -> image name from Windows `tasklist /FO CSV /NH`
pub fn parse_tasklist_csv(output: &str) -> HashMap<u32, String> {
    let Ok(re) = Regex::new(r#"^"([^"]+)","(\d+)""#) else {
        return HashMap::new();
    };

    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line.trim())?;
            Some((caps[2].parse().ok()?, caps[1].to_string()))
        })
        .collect()
}

/// First wireless interface listed in Linux `/proc/net/wireless`
pub fn parse_proc_wireless(content: &str) -> Option<WifiSignal> {
    // two header lines, then "iface: status link level noise ..."
    let line = content.lines().skip(2).find(|l| l.contains(':'))?;
    let (iface, stats) = line.split_once(':')?;
    let mut fields = stats.split_whitespace().skip(1);
    let parse = |s: Option<&str>| s.and_then(|v| v.trim_end_matches('.').parse::<f64>().ok());
    let link = parse(fields.next());
    let level = parse(fields.next());

    Some(WifiSignal {
        interface: iface.trim().to_string(),
        signal_dbm: level,
        quality_percent: link.map(|q| crate::stats::round2(q / 70.0 * 100.0)),
    })
}

/// Active interface from Windows `netsh wlan show interfaces`
pub fn parse_netsh_wlan(output: &str) -> Option<WifiSignal> {
    let mut interface = None;
    let mut quality = None;
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else { continue };
        match key.trim() {
            "Name" if interface.is_none() => interface = Some(value.trim().to_string()),
            "Signal" => quality = value.trim().trim_end_matches('%').parse::<f64>().ok(),
            _ => {}
        }
    }

    let quality = quality?;
    Some(WifiSignal {
        interface: interface.unwrap_or_else(|| "Wi-Fi".to_string()),
        // netsh maps 0..100% linearly onto -100..-50 dBm
        signal_dbm: Some(quality / 2.0 - 100.0),
        quality_percent: Some(quality),
    })
}

/// Runtime power management is on when the sysfs control file reads `auto`
pub fn parse_power_control(content: &str) -> bool {
    content.trim() == "auto"
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PowerShellAdapter {
    name: String,
    allow_turn_off: String,
}

/// Adapters from `Get-NetAdapterPowerManagement | ConvertTo-Json`
///
/// PowerShell emits a bare object for a single adapter and an array otherwise.
pub fn parse_adapter_power_json(json: &str) -> Result<Vec<AdapterPower>> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let adapters: Vec<PowerShellAdapter> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        vec![serde_json::from_str(trimmed)?]
    };

    Ok(adapters
        .into_iter()
        .map(|a| AdapterPower {
            name: a.name,
            power_saving: a.allow_turn_off.eq_ignore_ascii_case("Enabled"),
        })
        .collect())
}

/// `timedatectl show -p NTPSynchronized --value`
pub fn parse_timedatectl(output: &str) -> Result<bool> {
    match output.trim() {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(AppError::parse(format!("Unexpected timedatectl output: {}", other))),
    }
}
