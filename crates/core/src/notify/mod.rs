pub mod sendgrid;

pub use sendgrid::SendGridClient;

/// Outbound email. Delivery problems are reported as `false`, never as an error.
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> bool;
}
