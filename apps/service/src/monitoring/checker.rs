use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ProbeError;

/// Bound for the local interface echo
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound for any remote check, basic or application level
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(2);

/// Slack given to the `ping` child process on top of its own timeout
pub const PROCESS_GRACE: Duration = Duration::from_millis(500);

/// How a remote host is checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Network level echo request (`ping`)
    Basic,
    /// HTTP GET `{host}/ping` answered with `success`
    #[default]
    Application,
}

/// Checker trait for the individual kinds of reachability check
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Perform the check and return the observed latency
    async fn check(&self, target: &str) -> Result<Duration, ProbeError>;
}

/// Reachability probes used by the classifier
///
/// [`ProbeError::UnknownProbeFailure`] means the probe itself could not be
/// carried out; every other error means the target did not answer.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Echo the local interface
    async fn probe_local(&self) -> Result<Duration, ProbeError>;

    /// Check `host` using `mode`
    async fn probe_remote(&self, host: &str, mode: ProbeMode) -> Result<Duration, ProbeError>;
}

/// Program used for echo requests unless configured otherwise
pub const DEFAULT_PING_PROGRAM: &str = "ping";

/// Echo checker backed by the system `ping` utility
///
/// Raw ICMP sockets need elevated privileges, `ping` is usually setuid or
/// carries the capability already.
pub struct IcmpChecker {
    program: String,
    timeout_duration: Duration,
}

impl IcmpChecker {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { program: DEFAULT_PING_PROGRAM.to_string(), timeout_duration }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

/// Arguments for a single echo request with a reply deadline
fn ping_args(target: &str, wait: Duration) -> Vec<String> {
    let secs = wait.as_secs().max(1).to_string();

    if cfg!(windows) {
        vec!["-n".into(), "1".into(), "-w".into(), wait.as_millis().to_string(), target.into()]
    } else if cfg!(target_os = "macos") {
        vec!["-c".into(), "1".into(), "-t".into(), secs, target.into()]
    } else {
        vec!["-c".into(), "1".into(), "-W".into(), secs, target.into()]
    }
}

#[async_trait::async_trait]
impl Checker for IcmpChecker {
    async fn check(&self, target: &str) -> Result<Duration, ProbeError> {
        let start = Instant::now();

        let mut command = Command::new(&self.program);
        command
            .args(ping_args(target, self.timeout_duration))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = timeout(self.timeout_duration + PROCESS_GRACE, command.status())
            .await
            .map_err(|_| ProbeError::Timeout {
                host: target.to_string(),
                timeout: self.timeout_duration,
            })?
            .map_err(|e| ProbeError::UnknownProbeFailure {
                host: target.to_string(),
                reason: format!("failed to run {}: {e}", self.program),
            })?;

        if status.success() {
            Ok(start.elapsed())
        } else {
            Err(ProbeError::RemoteUnreachable {
                host: target.to_string(),
                reason: format!("{} exited with {status}", self.program),
            })
        }
    }
}

/// Application level checker: `GET {target}/ping` must answer `200 success`
pub struct HttpChecker {
    client: reqwest::Client,
}

/// Body a healthy `/ping` endpoint answers with
const PING_OK_BODY: &[u8] = b"success";

/// Endpoint queried for a host in application mode
pub fn ping_url(host: &str) -> String {
    format!("{host}/ping")
}

impl HttpChecker {
    pub fn new(timeout_duration: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout_duration).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str) -> Result<Duration, ProbeError> {
        let start = Instant::now();

        let transport_error = |e: reqwest::Error| ProbeError::RemoteUnreachable {
            host: target.to_string(),
            reason: format!("HTTP request failed: {e}"),
        };

        let mut response =
            self.client.get(ping_url(target)).send().await.map_err(transport_error)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ProbeError::RemoteUnreachable {
                host: target.to_string(),
                reason: format!("ping endpoint answered with status code {}", status.as_u16()),
            });
        }

        // Stop reading once the body is longer than expected
        let mut body = Vec::with_capacity(PING_OK_BODY.len() + 1);
        while body.len() <= PING_OK_BODY.len() {
            match response.chunk().await.map_err(transport_error)? {
                Some(chunk) => body.extend_from_slice(&chunk),
                None => break,
            }
        }
        let latency = start.elapsed();

        if body != PING_OK_BODY {
            body.truncate(PING_OK_BODY.len() + 1);
            return Err(ProbeError::RemoteUnreachable {
                host: target.to_string(),
                reason: format!("unexpected ping body {:?}", String::from_utf8_lossy(&body)),
            });
        }

        Ok(latency)
    }
}

/// Prober talking to the real network
pub struct SystemProber {
    local_host: String,
    local_checker: IcmpChecker,
    basic_checker: IcmpChecker,
    http_checker: HttpChecker,
}

impl SystemProber {
    pub fn new(local_host: impl Into<String>) -> Result<Self> {
        Ok(Self {
            local_host: local_host.into(),
            local_checker: IcmpChecker::new(LOCAL_TIMEOUT),
            basic_checker: IcmpChecker::new(REMOTE_TIMEOUT),
            http_checker: HttpChecker::new(REMOTE_TIMEOUT)?,
        })
    }

    /// Use `program` instead of `ping` for local and basic mode echoes
    pub fn with_ping_program(mut self, program: &str) -> Self {
        self.local_checker = self.local_checker.with_program(program);
        self.basic_checker = self.basic_checker.with_program(program);
        self
    }
}

fn report(
    kind: &str,
    host: &str,
    outcome: Result<Duration, ProbeError>,
) -> Result<Duration, ProbeError> {
    match &outcome {
        Ok(latency) => {
            debug!(kind, host, latency_ms = latency.as_millis() as u64, "Probe succeeded");
        }
        Err(e) => {
            debug!(kind, host, error = %e, "Probe failed");
        }
    }
    outcome
}

#[async_trait::async_trait]
impl Prober for SystemProber {
    async fn probe_local(&self) -> Result<Duration, ProbeError> {
        report("local", &self.local_host, self.local_checker.check(&self.local_host).await)
    }

    async fn probe_remote(&self, host: &str, mode: ProbeMode) -> Result<Duration, ProbeError> {
        match mode {
            ProbeMode::Basic => report("basic", host, self.basic_checker.check(host).await),
            ProbeMode::Application => {
                report("application", host, self.http_checker.check(host).await)
            }
        }
    }
}
