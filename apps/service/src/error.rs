use std::time::Duration;

use thiserror::Error;

/// Why a single probe failed
///
/// Probe errors never leave the classifier; they are logged and folded into a
/// [`State`](crate::monitoring::State).
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("local network interface check failed")]
    LocalNetworkFailure,
    #[error("{host} is unreachable: {reason}")]
    RemoteUnreachable { host: String, reason: String },
    #[error("no internet connectivity ({host} unreachable)")]
    ConnectivityFailure { host: String },
    #[error("unexpected probe outcome for {host}: {reason}")]
    UnknownProbeFailure { host: String, reason: String },
    #[error("probe of {host} timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },
}

/// A notification channel could not deliver an event
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{channel} delivery failed: {reason}")]
    NotificationDeliveryFailure { channel: &'static str, reason: String },
}

impl NotifyError {
    pub fn delivery(channel: &'static str, reason: impl ToString) -> Self {
        NotifyError::NotificationDeliveryFailure { channel, reason: reason.to_string() }
    }
}
