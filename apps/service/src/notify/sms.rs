use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use super::Channel;
use crate::config::SmsSettings;
use crate::error::NotifyError;
use crate::monitoring::TransitionEvent;

const SMS_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by the messaging API
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// SMS notifications through the Twilio messages API
pub struct SmsChannel {
    client: reqwest::Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

impl SmsChannel {
    pub fn new(settings: &SmsSettings, to: &str) -> Result<Self> {
        anyhow::ensure!(!settings.account_sid.is_empty(), "SMS account SID is not configured");
        anyhow::ensure!(!settings.from.is_empty(), "SMS sender number is not configured");

        let client = reqwest::Client::builder().timeout(SMS_TIMEOUT).build()?;

        Ok(Self {
            client,
            messages_url: format!(
                "{}/Accounts/{}/Messages.json",
                settings.api_base.trim_end_matches('/'),
                settings.account_sid
            ),
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from: settings.from.clone(),
            to: to.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Channel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, event: &TransitionEvent) -> Result<(), NotifyError> {
        let body = event.summary();
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", self.to.as_str()), ("From", self.from.as_str()), ("Body", body.as_str())])
            .send()
            .await
            .map_err(|e| NotifyError::delivery(self.name(), e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = response
            .json::<ApiError>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|_| format!("API answered with status code {}", status.as_u16()));

        Err(NotifyError::delivery(self.name(), reason))
    }
}
