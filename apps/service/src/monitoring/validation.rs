//! Startup validation of monitored hosts and loop settings.

use anyhow::{Context, Result, anyhow};
use std::net::IpAddr;
use url::Url;

use super::checker::ProbeMode;
use crate::config::MonitorSettings;

/// Validates the loop settings and every host the monitor will probe
///
/// The local and connectivity hosts are always echoed, so they must be
/// plain hostnames or addresses whatever mode the monitored hosts use.
pub fn validate_monitor_settings(settings: &MonitorSettings) -> Result<()> {
    validate_check_interval(settings.interval_seconds)?;

    for host in &settings.hosts {
        validate_host(host, settings.mode)?;
    }

    validate_host(&settings.local_host, ProbeMode::Basic).context("Invalid local host")?;
    validate_host(&settings.connectivity_host, ProbeMode::Basic)
        .context("Invalid connectivity host")?;

    if settings.ping_program.trim().is_empty() {
        return Err(anyhow!("Ping program must not be empty"));
    }

    Ok(())
}

/// Validates a monitored host for the probe mode it will be checked with
pub fn validate_host(target: &str, mode: ProbeMode) -> Result<()> {
    match mode {
        ProbeMode::Application => validate_http_target(target),
        ProbeMode::Basic => validate_echo_target(target),
    }
}

/// Validate HTTP/HTTPS base URL; `/ping` is appended to it verbatim
fn validate_http_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL {}: {}", target, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for application mode: {}", other)),
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL has no host: {}", target));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(anyhow!("URL must not carry a query or fragment: {}", target));
    }

    if target.ends_with('/') {
        tracing::warn!("Host {} ends with '/', probes will request {}/ping", target, target);
    }

    Ok(())
}

/// Validate a bare hostname or IP address for echo requests
fn validate_echo_target(target: &str) -> Result<()> {
    if target.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if target.is_empty() || target.len() > 253 {
        return Err(anyhow!("Invalid hostname length: {:?}", target));
    }

    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };

    if !target.split('.').all(valid_label) {
        return Err(anyhow!("Invalid hostname for basic mode: {:?}", target));
    }

    Ok(())
}

fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }
    Ok(())
}

/// Validate poll interval
pub fn validate_check_interval(interval_seconds: u64) -> Result<()> {
    const MIN_INTERVAL: u64 = 1;
    const MAX_INTERVAL: u64 = 86400; // 24 hours

    if interval_seconds < MIN_INTERVAL {
        return Err(anyhow!(
            "Check interval too short: {} seconds (minimum: {})",
            interval_seconds,
            MIN_INTERVAL
        ));
    }

    if interval_seconds > MAX_INTERVAL {
        return Err(anyhow!(
            "Check interval too long: {} seconds (maximum: {})",
            interval_seconds,
            MAX_INTERVAL
        ));
    }

    Ok(())
}
