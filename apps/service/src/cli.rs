use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::monitoring::ProbeMode;

/// Start a ping service to monitor health of several servers.
#[derive(Debug, Parser)]
#[command(name = "ping-monitor", version, about)]
pub struct Cli {
    /// Hosts on which the ping service is run (defaults to the configured hosts)
    #[arg(long, num_args = 1.., value_name = "HOST")]
    pub hosts: Vec<String>,

    /// Email address to notify; without a value the configured recipient is used
    #[arg(long, value_name = "EMAIL")]
    pub email: Option<Option<String>>,

    /// Phone number to notify by SMS; without a value the configured recipient is used
    #[arg(long, value_name = "PHONE_NO")]
    pub sms: Option<Option<String>>,

    /// How monitored hosts are probed
    #[arg(long, value_enum)]
    pub mode: Option<ProbeMode>,

    /// Report every failed host as down without checking the internet uplink
    #[arg(long)]
    pub no_disambiguate: bool,

    /// Seconds between two poll cycles
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
}

/// Recipient for a channel flag: `None` when the flag is absent
fn resolve_recipient(
    channel: &str,
    flag: &Option<Option<String>>,
    configured: &Option<String>,
) -> Result<Option<String>> {
    match flag {
        None => Ok(None),
        Some(Some(value)) => Ok(Some(value.clone())),
        Some(None) => configured.clone().map(Some).ok_or_else(|| {
            anyhow!("--{channel} given without a value and no {channel} recipient is configured")
        }),
    }
}

impl Cli {
    /// Fold command line values over the loaded config
    pub fn apply(&self, config: &mut Config) {
        if !self.hosts.is_empty() {
            config.monitor.hosts = self.hosts.clone();
        }
        if let Some(mode) = self.mode {
            config.monitor.mode = mode;
        }
        if self.no_disambiguate {
            config.monitor.disambiguate = false;
        }
        if let Some(interval) = self.interval {
            config.monitor.interval_seconds = interval;
        }
    }

    /// Email recipient, if the email channel is enabled
    pub fn email_recipient(&self, config: &Config) -> Result<Option<String>> {
        resolve_recipient("email", &self.email, &config.email.to)
    }

    /// SMS recipient, if the SMS channel is enabled
    pub fn sms_recipient(&self, config: &Config) -> Result<Option<String>> {
        resolve_recipient("sms", &self.sms, &config.sms.to)
    }
}
