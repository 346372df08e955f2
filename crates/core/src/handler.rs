//! End-to-end handling of one analysis request:
//! `Validating -> Running -> Formatting -> Notifying -> Done | Failed`.

use crate::crew::{PipelineInputs, PipelineRunner};
use crate::domain::request::AnalysisRequest;
use crate::format::{format_failure_report, format_report_markdown, format_result_as_html};
use crate::notify::EmailSender;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

pub const STATUS_COMPLETE: &str = "✅ Analysis complete!";
pub const STATUS_PARTIAL: &str = "⚠️ Analysis complete, email delivery failed";
pub const STATUS_INVALID: &str = "❌ Invalid input";
pub const STATUS_FAILED: &str = "❌ Failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    Validating,
    Running,
    Formatting,
    Notifying,
    Done,
    Failed,
}

/// Advisory progress points reported to the UI shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Start,
    PreRun,
    PostRun,
    PreNotify,
    Complete,
}

impl Checkpoint {
    pub fn fraction(&self) -> f32 {
        match self {
            Checkpoint::Start => 0.1,
            Checkpoint::PreRun => 0.3,
            Checkpoint::PostRun => 0.7,
            Checkpoint::PreNotify => 0.9,
            Checkpoint::Complete => 1.0,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Checkpoint::Start => "🚀 Initializing AI agents...",
            Checkpoint::PreRun => "🔍 Finding trending companies...",
            Checkpoint::PostRun => "📊 Analyzing investment opportunities...",
            Checkpoint::PreNotify => "📧 Sending email...",
            Checkpoint::Complete => "✅ Complete!",
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, checkpoint: Checkpoint);
}

/// Writes checkpoints to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, checkpoint: Checkpoint) {
        tracing::info!(progress = checkpoint.fraction(), "{}", checkpoint.description());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// Analysis succeeded but the email was not delivered.
    PartialSuccess,
    InvalidInput,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub report: String,
    pub status: String,
    pub outcome: Outcome,
}

impl AnalysisReport {
    fn new(report: String, status: &str, outcome: Outcome) -> Self {
        Self {
            report,
            status: status.to_string(),
            outcome,
        }
    }
}

pub struct AnalysisService {
    pipeline: Arc<dyn PipelineRunner>,
    email: Arc<dyn EmailSender>,
}

impl AnalysisService {
    pub fn new(pipeline: Arc<dyn PipelineRunner>, email: Arc<dyn EmailSender>) -> Self {
        Self { pipeline, email }
    }

    /// Never fails: every outcome, including a pipeline error, is turned into a report.
    pub async fn run_analysis(
        &self,
        email: &str,
        sector: &str,
        progress: &dyn ProgressSink,
    ) -> AnalysisReport {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("analysis", %request_id);
        self.run(email, sector, progress).instrument(span).await
    }

    async fn run(&self, email: &str, sector: &str, progress: &dyn ProgressSink) -> AnalysisReport {
        tracing::debug!(stage = ?RequestStage::Validating);
        let request = match AnalysisRequest::validate(email, sector) {
            Ok(request) => request,
            Err(err) => {
                tracing::info!(error = %err, "rejected analysis request");
                return AnalysisReport::new(
                    err.user_message().to_string(),
                    STATUS_INVALID,
                    Outcome::InvalidInput,
                );
            }
        };

        progress.report(Checkpoint::Start);
        let inputs = PipelineInputs::new(request.sector.clone());

        progress.report(Checkpoint::PreRun);
        tracing::info!(stage = ?RequestStage::Running, sector = %request.sector, "running crew");
        let raw = match self.pipeline.run_pipeline(&inputs).await {
            Ok(result) => result.into_raw(),
            Err(err) => {
                tracing::error!(
                    stage = ?RequestStage::Failed,
                    error = %format!("{err:#}"),
                    "analysis failed"
                );
                sentry_anyhow::capture_anyhow(&err);
                return AnalysisReport::new(
                    format_failure_report(&err),
                    STATUS_FAILED,
                    Outcome::Failed,
                );
            }
        };
        progress.report(Checkpoint::PostRun);

        tracing::debug!(stage = ?RequestStage::Formatting);
        let generated_at = chrono::Local::now();
        let html = format_result_as_html(&raw, &request.sector, &generated_at);

        progress.report(Checkpoint::PreNotify);
        tracing::info!(stage = ?RequestStage::Notifying, "sending email");
        let subject = format!("📈 Stock Investment Recommendation: {}", request.sector);
        let email_sent = self.email.send(&request.email, &subject, &html).await;

        let report = format_report_markdown(
            &raw,
            &request.sector,
            &request.email,
            &generated_at,
            email_sent,
        );
        progress.report(Checkpoint::Complete);
        tracing::info!(stage = ?RequestStage::Done, email_sent, "analysis complete");

        if email_sent {
            AnalysisReport::new(report, STATUS_COMPLETE, Outcome::Success)
        } else {
            AnalysisReport::new(report, STATUS_PARTIAL, Outcome::PartialSuccess)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::PipelineResult;
    use crate::format::markdown::{EMAIL_FAILED_LINE, EMAIL_SENT_LINE};
    use std::sync::Mutex;

    const ANALYSIS: &str = "## Recommendation: First Solar (FSLR)\n**Why:** capacity growth\n- strong margins";

    #[derive(Default)]
    struct FakePipeline {
        fail_with: Option<&'static str>,
        calls: Mutex<Vec<PipelineInputs>>,
    }

    #[async_trait::async_trait]
    impl PipelineRunner for FakePipeline {
        async fn run_pipeline(&self, inputs: &PipelineInputs) -> anyhow::Result<PipelineResult> {
            self.calls.lock().unwrap().push(inputs.clone());
            match self.fail_with {
                Some(msg) => Err(anyhow::anyhow!(msg)),
                None => Ok(PipelineResult::Text(ANALYSIS.to_string())),
            }
        }
    }

    struct FakeEmail {
        deliver: bool,
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeEmail {
        fn new(deliver: bool) -> Arc<Self> {
            Arc::new(Self {
                deliver,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl EmailSender for FakeEmail {
        async fn send(&self, to: &str, subject: &str, html_body: &str) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), html_body.to_string()));
            self.deliver
        }
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<Checkpoint>>);

    impl ProgressSink for RecordingProgress {
        fn report(&self, checkpoint: Checkpoint) {
            self.0.lock().unwrap().push(checkpoint);
        }
    }

    fn service(pipeline: Arc<FakePipeline>, email: Arc<FakeEmail>) -> AnalysisService {
        AnalysisService::new(pipeline, email)
    }

    #[tokio::test]
    async fn invalid_email_never_runs_pipeline() {
        let pipeline = Arc::new(FakePipeline::default());
        let email = FakeEmail::new(true);
        let out = service(pipeline.clone(), email.clone())
            .run_analysis("not-an-email", "Technology", &LogProgress)
            .await;

        assert_eq!(out.outcome, Outcome::InvalidInput);
        assert_eq!(out.status, STATUS_INVALID);
        assert!(out.report.contains("valid email"));
        assert!(pipeline.calls.lock().unwrap().is_empty());
        assert!(email.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_sector_never_runs_pipeline() {
        for sector in ["", "   ", "\n\t"] {
            let pipeline = Arc::new(FakePipeline::default());
            let out = service(pipeline.clone(), FakeEmail::new(true))
                .run_analysis("me@example.com", sector, &LogProgress)
                .await;
            assert_eq!(out.outcome, Outcome::InvalidInput);
            assert!(out.report.contains("investment sector"));
            assert!(pipeline.calls.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn pipeline_error_is_reported_and_email_skipped() {
        let pipeline = Arc::new(FakePipeline {
            fail_with: Some("Perplexity returned status=429"),
            ..Default::default()
        });
        let email = FakeEmail::new(true);
        let progress = RecordingProgress::default();
        let out = service(pipeline, email.clone())
            .run_analysis("me@example.com", "Energy", &progress)
            .await;

        assert_eq!(out.outcome, Outcome::Failed);
        assert_eq!(out.status, STATUS_FAILED);
        assert!(out.report.contains("Perplexity returned status=429"));
        assert!(out.report.contains("Rate limits"));
        assert!(email.sent.lock().unwrap().is_empty());
        assert_eq!(
            *progress.0.lock().unwrap(),
            vec![Checkpoint::Start, Checkpoint::PreRun]
        );
    }

    #[tokio::test]
    async fn failed_delivery_is_partial_success() {
        let pipeline = Arc::new(FakePipeline::default());
        let email = FakeEmail::new(false);
        let out = service(pipeline, email.clone())
            .run_analysis("me@example.com", "Energy", &LogProgress)
            .await;

        assert_eq!(out.outcome, Outcome::PartialSuccess);
        assert_eq!(out.status, STATUS_PARTIAL);
        assert!(out.report.contains(ANALYSIS));
        assert!(out.report.contains(EMAIL_FAILED_LINE));
        assert_eq!(email.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn success_embeds_sector_email_and_raw_text() {
        let pipeline = Arc::new(FakePipeline::default());
        let email = FakeEmail::new(true);
        let progress = RecordingProgress::default();
        let out = service(pipeline.clone(), email.clone())
            .run_analysis("me@example.com", "  Renewable Energy  ", &progress)
            .await;

        assert_eq!(out.outcome, Outcome::Success);
        assert_eq!(out.status, STATUS_COMPLETE);
        assert!(out.report.contains(EMAIL_SENT_LINE));
        assert!(out.report.contains("Renewable Energy"));
        assert!(out.report.contains("me@example.com"));
        assert!(out.report.contains(ANALYSIS));

        assert_eq!(
            *pipeline.calls.lock().unwrap(),
            vec![PipelineInputs::new("Renewable Energy")]
        );

        let sent = email.sent.lock().unwrap();
        let (to, subject, html) = &sent[0];
        assert_eq!(to, "me@example.com");
        assert_eq!(subject, "📈 Stock Investment Recommendation: Renewable Energy");
        assert!(html.contains("<h2>Recommendation: First Solar (FSLR)</h2>"));
        assert!(html.contains("• strong margins"));

        assert_eq!(
            *progress.0.lock().unwrap(),
            vec![
                Checkpoint::Start,
                Checkpoint::PreRun,
                Checkpoint::PostRun,
                Checkpoint::PreNotify,
                Checkpoint::Complete,
            ]
        );
    }
}
