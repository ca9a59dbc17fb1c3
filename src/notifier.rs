use crate::configuration::TwilioCredentials;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound text message delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, to: &str, body: &str) -> Result<(), NotifyError>;
}

/// Used when messaging is not configured. Accepts every message.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, to: &str, _body: &str) -> Result<(), NotifyError> {
        debug!(%to, "messaging disabled, reminder dropped");
        Ok(())
    }
}

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";

/// Sends SMS (or `whatsapp:` prefixed numbers) through the Twilio REST API.
#[derive(Debug, Clone)]
pub struct TwilioNotifier {
    client: reqwest::Client,
    credentials: TwilioCredentials,
    base_url: String,
}

impl TwilioNotifier {
    pub fn new(credentials: TwilioCredentials) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            credentials,
            base_url: TWILIO_API.into(),
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        )
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&[("To", to), ("From", self.credentials.from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(%to, "reminder accepted by provider");
        Ok(())
    }
}
