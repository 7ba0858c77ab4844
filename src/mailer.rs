use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{EmailOutcome, SubmissionPayload};

/// The "send transactional email" capability the orchestrator delegates to.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, payload: &SubmissionPayload) -> EmailOutcome;
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("email provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("email provider returned {status}")]
    Rejected { status: u16 },
}

// Body posted to the provider's send endpoint
#[derive(Serialize)]
struct ProviderEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    reply_to: &'a str,
    subject: String,
    text: String,
}

/// Posts messages as JSON to an HTTP email API with bearer auth.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
    to: String,
}

impl HttpMailer {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: Option<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key,
            from: from.into(),
            to: to.into(),
        }
    }

    async fn deliver(&self, payload: &SubmissionPayload) -> Result<(), MailerError> {
        let email = ProviderEmail {
            from: &self.from,
            to: [&self.to],
            reply_to: &payload.email,
            subject: format!("New contact message from {}", payload.name),
            text: format!(
                "Name: {}\nEmail: {}\n\n{}",
                payload.name, payload.email, payload.message
            ),
        };

        let mut request = self.client.post(&self.api_url).json(&email);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(MailerError::Rejected {
                status: status.as_u16(),
            });
        }
        debug!(status = status.as_u16(), "email provider accepted message");
        Ok(())
    }
}

#[async_trait]
impl EmailSender for HttpMailer {
    async fn send(&self, payload: &SubmissionPayload) -> EmailOutcome {
        match self.deliver(payload).await {
            Ok(()) => EmailOutcome::sent(),
            Err(e) => EmailOutcome::failed(e.to_string()),
        }
    }
}

/// Used when no provider is configured: logs the message and reports success.
pub struct LogMailer;

#[async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, payload: &SubmissionPayload) -> EmailOutcome {
        info!(
            name = %payload.name,
            reply_to = %payload.email,
            chars = payload.message.chars().count(),
            "contact message accepted (no mail provider configured)"
        );
        EmailOutcome::sent()
    }
}
