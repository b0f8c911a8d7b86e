//! Notification delivery for state transitions
//!
//! Each enabled channel gets its own background task per event, so a slow
//! or broken transport never holds up the poll loop. Delivery failures are
//! logged and dropped.

pub mod email;
pub mod sms;

pub use email::EmailChannel;
pub use sms::SmsChannel;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::monitoring::TransitionEvent;

/// A single delivery mechanism (email, SMS, ...)
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, event: &TransitionEvent) -> Result<(), NotifyError>;
}

/// Receives transition events from the poll loop
///
/// `notify` must return without waiting for delivery.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: TransitionEvent);
}

/// Fans every event out to all configured channels
#[derive(Clone, Default)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn Channel>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

impl Notifier for Dispatcher {
    fn notify(&self, event: TransitionEvent) {
        for channel in &self.channels {
            let channel = Arc::clone(channel);
            let event = event.clone();

            tokio::spawn(async move {
                match channel.send(&event).await {
                    Ok(()) => {
                        debug!(channel = channel.name(), host = %event.host, "Notification sent");
                    }
                    Err(e) => {
                        warn!(host = %event.host, "Notification dropped: {}", e);
                    }
                }
            });
        }
    }
}
