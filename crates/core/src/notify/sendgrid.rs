use crate::config::Settings;
use crate::notify::EmailSender;
use anyhow::Context;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.sendgrid.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct SendGridClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    from_email: String,
}

impl SendGridClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url =
            std::env::var("SENDGRID_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("SENDGRID_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            settings.sendgrid_api_key.clone(),
            base_url,
            settings.from_email().to_string(),
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(
        api_key: Option<String>,
        base_url: String,
        from_email: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build sendgrid http client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            from_email,
        })
    }

    async fn try_send(
        &self,
        api_key: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> anyhow::Result<()> {
        let body = MailSendRequest {
            personalizations: vec![Personalization {
                to: vec![Address { email: to }],
            }],
            from: Address {
                email: &self.from_email,
            },
            subject,
            content: vec![Content {
                kind: "text/html",
                value: html_body,
            }],
        };

        let url = format!("{}/v3/mail/send", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("sendgrid request failed")?;

        let status = res.status();
        if status != reqwest::StatusCode::ACCEPTED {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("sendgrid returned status={status}: {text}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EmailSender for SendGridClient {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("SENDGRID_API_KEY not set; skipping email delivery");
            return false;
        };

        let domain = recipient_domain(to);
        match self.try_send(api_key, to, subject, html_body).await {
            Ok(()) => {
                tracing::info!(recipient_domain = domain, "email delivered to sendgrid");
                true
            }
            Err(err) => {
                tracing::warn!(recipient_domain = domain, error = %err, "email delivery failed");
                false
            }
        }
    }
}

/// Recipients are logged by domain only.
fn recipient_domain(to: &str) -> &str {
    to.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("")
}

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}
