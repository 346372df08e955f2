pub mod crew;
pub mod domain;
pub mod format;
pub mod handler;
pub mod llm;
pub mod notify;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_FROM_EMAIL: &str = "noreply@stockpicker.com";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub perplexity_api_key: Option<String>,
        pub openai_api_key: Option<String>,
        pub sendgrid_api_key: Option<String>,
        pub from_email: Option<String>,
        pub sentry_dsn: Option<String>,
        pub crew_config_dir: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                perplexity_api_key: non_empty_var("PERPLEXITY_API_KEY"),
                openai_api_key: non_empty_var("OPENAI_API_KEY"),
                sendgrid_api_key: non_empty_var("SENDGRID_API_KEY"),
                from_email: non_empty_var("FROM_EMAIL"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                crew_config_dir: non_empty_var("STOCK_PICKER_CONFIG_DIR"),
            })
        }

        pub fn require_perplexity_api_key(&self) -> anyhow::Result<&str> {
            self.perplexity_api_key
                .as_deref()
                .context("PERPLEXITY_API_KEY is required")
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn from_email(&self) -> &str {
            self.from_email.as_deref().unwrap_or(DEFAULT_FROM_EMAIL)
        }

        /// Logs which credentials are present. Values are never logged.
        pub fn log_presence(&self) {
            let entries = [
                ("PERPLEXITY_API_KEY", self.perplexity_api_key.is_some()),
                ("OPENAI_API_KEY", self.openai_api_key.is_some()),
                ("SENDGRID_API_KEY", self.sendgrid_api_key.is_some()),
                ("FROM_EMAIL", self.from_email.is_some()),
            ];
            for (name, set) in entries {
                if set {
                    tracing::info!(variable = name, "configuration present");
                } else {
                    tracing::warn!(variable = name, "configuration missing");
                }
            }
        }
    }

    fn non_empty_var(name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn empty() -> Settings {
            Settings {
                perplexity_api_key: None,
                openai_api_key: None,
                sendgrid_api_key: None,
                from_email: None,
                sentry_dsn: None,
                crew_config_dir: None,
            }
        }

        #[test]
        fn from_email_falls_back_to_placeholder() {
            let settings = empty();
            assert_eq!(settings.from_email(), DEFAULT_FROM_EMAIL);
        }

        #[test]
        fn require_reports_variable_name() {
            let err = empty().require_openai_api_key().unwrap_err();
            assert!(err.to_string().contains("OPENAI_API_KEY"));
        }
    }
}
