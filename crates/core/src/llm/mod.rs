pub mod chat;
pub mod error;
pub mod json;

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Search-grounded chat completions (Perplexity Sonar).
    Perplexity,
    OpenAI,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Perplexity => write!(f, "perplexity"),
            Provider::OpenAI => write!(f, "openai"),
        }
    }
}

/// JSON Schema the reply must conform to.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub response_schema: Option<ResponseSchema>,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Returns the assistant text of a single-turn completion.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String>;
}

/// Stand-in for a provider whose credential is missing. Fails on first use so the error
/// surfaces as a pipeline failure rather than at startup.
#[derive(Debug, Clone)]
pub struct UnavailableClient {
    pub provider: Provider,
    pub reason: String,
}

#[async_trait::async_trait]
impl LlmClient for UnavailableClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, _req: CompletionRequest) -> anyhow::Result<String> {
        anyhow::bail!("{} client unavailable: {}", self.provider, self.reason)
    }
}
