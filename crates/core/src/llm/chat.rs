use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{CompletionRequest, LlmClient, Provider, ResponseSchema};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_PERPLEXITY_MODEL: &str = "sonar";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Client for the OpenAI-compatible `/chat/completions` endpoint. Perplexity exposes the same
/// wire format, so both providers share this implementation.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    pub fn openai(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        Self::from_env(
            Provider::OpenAI,
            api_key,
            "OPENAI",
            DEFAULT_OPENAI_BASE_URL,
            DEFAULT_OPENAI_MODEL,
        )
    }

    pub fn perplexity(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_perplexity_api_key()?.to_string();
        Self::from_env(
            Provider::Perplexity,
            api_key,
            "PERPLEXITY",
            DEFAULT_PERPLEXITY_BASE_URL,
            DEFAULT_PERPLEXITY_MODEL,
        )
    }

    fn from_env(
        provider: Provider,
        api_key: String,
        prefix: &str,
        default_base_url: &str,
        default_model: &str,
    ) -> anyhow::Result<Self> {
        let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();

        let base_url = var("BASE_URL").unwrap_or_else(|| default_base_url.to_string());
        let model = var("MODEL").unwrap_or_else(|| default_model.to_string());
        let max_tokens = var("MAX_TOKENS")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let timeout_secs = var("TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            provider,
            api_key,
            base_url,
            model,
            max_tokens,
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(
        provider: Provider,
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            provider,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    fn diagnostics(
        &self,
        stage: &'static str,
        detail: String,
        raw: Option<String>,
    ) -> LlmDiagnosticsError {
        LlmDiagnosticsError {
            provider: self.provider,
            stage,
            detail,
            raw_output: raw,
        }
    }

    fn response_format(&self, schema: &ResponseSchema) -> ResponseFormat {
        ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: schema.name,
                schema: schema.schema.clone(),
                // `strict` is an OpenAI extension.
                strict: matches!(self.provider, Provider::OpenAI).then_some(true),
            },
        }
    }

    async fn create_completion(&self, req: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.provider))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read {} response body", self.provider))?;
        if !status.is_success() {
            return Err(self
                .diagnostics("http", format!("status={status}"), Some(text))
                .into());
        }

        serde_json::from_str::<ChatResponse>(&text)
            .with_context(|| format!("failed to decode {} response: {text}", self.provider))
    }

    fn response_text(&self, res: ChatResponse) -> anyhow::Result<String> {
        let choice = res
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| self.diagnostics("empty_choice", "response has no choices".into(), None))?;

        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(self
                .diagnostics(
                    "empty_content",
                    format!("finish_reason={:?}", choice.finish_reason),
                    None,
                )
                .into());
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl LlmClient for ChatCompletionsClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
        let make_req = |max_tokens: u32| ChatRequest {
            model: self.model.clone(),
            max_tokens,
            messages: vec![
                Message {
                    role: "system",
                    content: req.system.clone(),
                },
                Message {
                    role: "user",
                    content: req.user.clone(),
                },
            ],
            response_format: req.response_schema.as_ref().map(|s| self.response_format(s)),
        };

        let mut res = self.create_completion(&make_req(self.max_tokens)).await?;

        // If the model hit the token ceiling, retry once with a higher one.
        if res.finish_reason() == Some("length") {
            let bumped = self.max_tokens.saturating_mul(2).max(4096);
            tracing::warn!(
                provider = %self.provider,
                from = self.max_tokens,
                to = bumped,
                "finish_reason=length; retrying once with higher max_tokens"
            );
            res = self.create_completion(&make_req(bumped)).await?;
            if res.finish_reason() == Some("length") {
                return Err(self
                    .diagnostics(
                        "truncated",
                        format!("output still truncated at max_tokens={bumped}"),
                        res.first_content(),
                    )
                    .into());
            }
        }

        self.response_text(res)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ResponseFormat {
    #[serde(rename = "json_schema")]
    JsonSchema { json_schema: JsonSchemaFormat },
}

#[derive(Debug, Clone, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    strict: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn finish_reason(&self) -> Option<&str> {
        self.choices.first()?.finish_reason.as_deref()
    }

    fn first_content(&self) -> Option<String> {
        self.choices.first()?.message.content.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, provider: Provider) -> ChatCompletionsClient {
        ChatCompletionsClient::new(
            provider,
            "test-key".to_string(),
            server.uri(),
            "test-model".to_string(),
            1000,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "You are a researcher.".to_string(),
            user: "Research the Energy sector.".to_string(),
            response_schema: None,
        }
    }

    fn completion(content: &str, finish_reason: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": finish_reason,
            }]
        })
    }

    #[test]
    fn decodes_choice_content() {
        let res: ChatResponse =
            serde_json::from_value(completion("hello", "stop")).unwrap();
        assert_eq!(res.finish_reason(), Some("stop"));
        assert_eq!(res.first_content().as_deref(), Some("hello"));
    }

    #[test]
    fn strict_flag_only_sent_to_openai() {
        let http = reqwest::Client::new();
        let schema = ResponseSchema {
            name: "s",
            schema: json!({"type": "object"}),
        };
        let mut c = ChatCompletionsClient {
            http,
            provider: Provider::Perplexity,
            api_key: String::new(),
            base_url: String::new(),
            model: String::new(),
            max_tokens: 1,
        };
        let v = serde_json::to_value(c.response_format(&schema)).unwrap();
        assert_eq!(v["type"], "json_schema");
        assert!(v["json_schema"].get("strict").is_none());

        c.provider = Provider::OpenAI;
        let v = serde_json::to_value(c.response_format(&schema)).unwrap();
        assert_eq!(v["json_schema"]["strict"], true);
    }

    #[tokio::test]
    async fn returns_assistant_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Pick NVDA", "stop")))
            .mount(&server)
            .await;

        let text = client(&server, Provider::OpenAI).complete(request()).await.unwrap();
        assert_eq!(text, "Pick NVDA");
    }

    #[tokio::test]
    async fn http_error_carries_diagnostics() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server, Provider::Perplexity)
            .complete(request())
            .await
            .unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "http");
        assert_eq!(diag.provider, Provider::Perplexity);
        assert_eq!(diag.raw_output.as_deref(), Some("rate limited"));
    }

    #[tokio::test]
    async fn retries_once_when_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"max_tokens": 1000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"comp", "length")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"max_tokens": 4096})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("done", "stop")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server, Provider::OpenAI).complete(request()).await.unwrap();
        assert_eq!(text, "done");
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  ", "stop")))
            .mount(&server)
            .await;

        let err = client(&server, Provider::OpenAI)
            .complete(request())
            .await
            .unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "empty_content");
    }
}
