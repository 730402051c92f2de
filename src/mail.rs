use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail relay request failed")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay rejected message: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Seam between the notifier and the outbound mail provider. The production
/// transport talks to an HTTP relay; tests substitute a recording impl.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, from: &str, mail: &OutboundEmail) -> Result<(), MailError>;
}

pub struct HttpMailTransport {
    client: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
}

impl HttpMailTransport {
    pub fn new(api_url: String, api_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_token,
        }
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, from: &str, mail: &OutboundEmail) -> Result<(), MailError> {
        let message = RelayMessage {
            from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.body,
        };

        let mut request = self.client.post(&self.api_url).json(&message);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().to_string()));
        }
        Ok(())
    }
}

/// Development transport: logs the message instead of delivering it.
/// Used when no mail relay is configured.
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, from: &str, mail: &OutboundEmail) -> Result<(), MailError> {
        tracing::info!(
            from = %from,
            to = %mail.to,
            subject = %mail.subject,
            "mail transport not configured, logging message\n{}",
            mail.body
        );
        Ok(())
    }
}
