use crate::llm::Provider;
use std::fmt;

/// Provider failure with enough context to diagnose it. The raw reply is kept for inspection
/// but only its size is shown in the message.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    /// Where it went wrong: `http`, `empty_choice`, `empty_content`, `truncated` or `schema`.
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} failure: {}", self.provider, self.stage, self.detail)?;
        if let Some(raw) = &self.raw_output {
            write!(f, " (raw output: {} bytes)", raw.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(raw_output: Option<&str>) -> LlmDiagnosticsError {
        LlmDiagnosticsError {
            provider: Provider::Perplexity,
            stage: "http",
            detail: "status=429 Too Many Requests".to_string(),
            raw_output: raw_output.map(str::to_string),
        }
    }

    #[test]
    fn message_reports_raw_size_not_content() {
        let msg = error(Some("rate limited")).to_string();
        assert_eq!(
            msg,
            "perplexity http failure: status=429 Too Many Requests (raw output: 12 bytes)"
        );
        assert!(!msg.contains("rate limited"));
    }

    #[test]
    fn message_without_raw_output() {
        assert_eq!(
            error(None).to_string(),
            "perplexity http failure: status=429 Too Many Requests"
        );
    }
}
