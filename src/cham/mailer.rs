use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail webhook failed: {status} {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailOutcome {
    Sent,
    /// No webhook configured; the message was only logged.
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

impl MailMessage {
    pub fn text(to: Vec<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            text: Some(text.into()),
            html: None,
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a [String],
    subject: &'a str,
    text: Option<&'a str>,
    html: Option<&'a str>,
}

impl<'a> From<&'a MailMessage> for WebhookPayload<'a> {
    fn from(message: &'a MailMessage) -> Self {
        Self {
            to: &message.to,
            subject: &message.subject,
            text: message.text.as_deref(),
            html: message.html.as_deref().or(message.text.as_deref()),
        }
    }
}

pub struct Mailer {
    client: Client,
    webhook: Option<Url>,
}

impl Mailer {
    pub fn new(webhook: Option<Url>) -> Result<Self, MailError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, webhook })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook.is_some()
    }

    pub async fn send(&self, message: &MailMessage) -> Result<MailOutcome, MailError> {
        let Some(webhook) = &self.webhook else {
            info!(
                to = ?message.to,
                subject = %message.subject,
                "mail webhook not set, skipping send"
            );
            return Ok(MailOutcome::Skipped);
        };

        let response = self
            .client
            .post(webhook.clone())
            .json(&WebhookPayload::from(message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }

        debug!(to = ?message.to, "mail handed to webhook");
        Ok(MailOutcome::Sent)
    }
}


#[cfg(test)]
mod tests {
    use super::{test_support::webhook, *};

    #[tokio::test]
    async fn unconfigured_mailer_skips() {
        let mailer = Mailer::new(None).unwrap();
        assert!(!mailer.is_configured());
        let outcome = mailer
            .send(&MailMessage::text(
                vec!["admin@cham.org".to_string()],
                "hello",
                "body",
            ))
            .await
            .unwrap();
        assert_eq!(outcome, MailOutcome::Skipped);
    }

    #[test]
    fn payload_falls_back_to_text_for_html() {
        let message = MailMessage::text(vec!["a@b.c".to_string()], "subject", "plain");
        let payload = serde_json::to_value(WebhookPayload::from(&message)).unwrap();
        assert_eq!(payload["to"], serde_json::json!(["a@b.c"]));
        assert_eq!(payload["html"], "plain");
        assert_eq!(payload["text"], "plain");
    }

    #[test]
    fn explicit_html_is_kept() {
        let message = MailMessage {
            to: vec!["a@b.c".to_string()],
            subject: "s".to_string(),
            text: Some("plain".to_string()),
            html: Some("<p>rich</p>".to_string()),
        };
        let payload = serde_json::to_value(WebhookPayload::from(&message)).unwrap();
        assert_eq!(payload["html"], "<p>rich</p>");
    }

    #[tokio::test]
    async fn webhook_receives_the_payload() {
        let (url, inbox) = webhook(StatusCode::OK).await;
        let mailer = Mailer::new(Some(url)).unwrap();
        let outcome = mailer
            .send(&MailMessage::text(
                vec!["board@cham.org".to_string()],
                "new member",
                "details",
            ))
            .await
            .unwrap();
        assert_eq!(outcome, MailOutcome::Sent);

        let inbox = inbox.lock().await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0]["to"], serde_json::json!(["board@cham.org"]));
        assert_eq!(inbox[0]["subject"], "new member");
        assert_eq!(inbox[0]["html"], "details");
    }

    #[tokio::test]
    async fn non_2xx_reply_is_rejected() {
        let (url, _) = webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
        let mailer = Mailer::new(Some(url)).unwrap();
        let err = mailer
            .send(&MailMessage::text(vec!["a@b.c".to_string()], "s", "t"))
            .await
            .unwrap_err();
        match err {
            MailError::Rejected { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "mailbox says hi");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
