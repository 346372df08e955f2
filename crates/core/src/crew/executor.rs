use crate::config::Settings;
use crate::crew::config::interpolate;
use crate::crew::{Capability, CrewConfig, PipelineInputs, RoleKind, TaskKind};
use crate::domain::contract::StageSchema;
use crate::domain::schema::{TrendingCompanyList, TrendingCompanyResearchList};
use crate::llm::chat::ChatCompletionsClient;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json::parse_stage_output;
use crate::llm::{CompletionRequest, LlmClient, Provider, ResponseSchema, UnavailableClient};
use anyhow::{ensure, Context};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutput {
    pub task: TaskKind,
    pub agent: RoleKind,
    /// Text handed to dependent tasks; normalized JSON for structured stages.
    pub raw: String,
    pub structured: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrewOutput {
    /// Raw text of the final task.
    pub raw: String,
    pub tasks_output: Vec<TaskOutput>,
}

/// What an execution engine hands back: a structured result or bare text.
#[derive(Debug, Clone)]
pub enum PipelineResult {
    Crew(CrewOutput),
    Text(String),
}

impl PipelineResult {
    pub fn into_raw(self) -> String {
        match self {
            PipelineResult::Crew(output) => output.raw,
            PipelineResult::Text(text) => text,
        }
    }
}

#[async_trait::async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run_pipeline(&self, inputs: &PipelineInputs) -> anyhow::Result<PipelineResult>;
}

pub struct Crew {
    config: Arc<CrewConfig>,
    search: Arc<dyn LlmClient>,
    reasoning: Arc<dyn LlmClient>,
}

impl Crew {
    pub fn new(
        config: Arc<CrewConfig>,
        search: Arc<dyn LlmClient>,
        reasoning: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            config,
            search,
            reasoning,
        }
    }

    /// Wires Perplexity as the web-search backend and OpenAI as the reasoning backend. A missing
    /// credential is logged here and reported when a task first needs that backend.
    pub fn from_settings(settings: &Settings, config: Arc<CrewConfig>) -> Self {
        let search = client_or_unavailable(
            Provider::Perplexity,
            ChatCompletionsClient::perplexity(settings),
        );
        let reasoning =
            client_or_unavailable(Provider::OpenAI, ChatCompletionsClient::openai(settings));
        Self::new(config, search, reasoning)
    }

    pub fn config(&self) -> &CrewConfig {
        &self.config
    }

    fn client(&self, capability: Capability) -> &dyn LlmClient {
        match capability {
            Capability::WebSearch => self.search.as_ref(),
            Capability::Reasoning => self.reasoning.as_ref(),
        }
    }

    pub async fn kickoff(&self, inputs: &PipelineInputs) -> anyhow::Result<CrewOutput> {
        let graph = self.config.graph();
        let mut tasks_output: Vec<TaskOutput> = Vec::with_capacity(graph.order().len());

        for &task in graph.order() {
            let output = self
                .run_task(task, inputs, &tasks_output)
                .await
                .with_context(|| format!("task {task} failed"))?;
            tasks_output.push(output);
        }

        let final_task = graph.final_task();
        let raw = tasks_output
            .iter()
            .find(|o| o.task == final_task)
            .map(|o| o.raw.clone())
            .with_context(|| format!("final task {final_task} produced no output"))?;

        Ok(CrewOutput { raw, tasks_output })
    }

    async fn run_task(
        &self,
        task: TaskKind,
        inputs: &PipelineInputs,
        completed: &[TaskOutput],
    ) -> anyhow::Result<TaskOutput> {
        let assignment = self
            .config
            .policy()
            .assign(task)
            .with_context(|| format!("no worker assigned to task {task}"))?;
        let client = self.client(assignment.capability);

        tracing::info!(
            %task,
            worker = %assignment.worker,
            capability = %assignment.capability,
            provider = %client.provider(),
            "task started"
        );

        let req = CompletionRequest {
            system: self.system_prompt(assignment.worker, inputs),
            user: self.user_prompt(task, inputs, completed)?,
            response_schema: response_schema(task),
        };
        let text = client.complete(req).await?;
        let (raw, structured) = decode_output(task, &text).map_err(|err| {
            anyhow::Error::new(LlmDiagnosticsError {
                provider: client.provider(),
                stage: "schema",
                detail: format!("{err:#}"),
                raw_output: Some(text.clone()),
            })
        })?;

        tracing::info!(%task, output_len = raw.len(), "task completed");

        Ok(TaskOutput {
            task,
            agent: assignment.worker,
            raw,
            structured,
        })
    }

    fn system_prompt(&self, worker: RoleKind, inputs: &PipelineInputs) -> String {
        let role = self.config.role(worker);
        let mut out = format!("You are {}.", interpolate(&role.role, inputs));
        let backstory = interpolate(&role.backstory, inputs);
        if !backstory.is_empty() {
            out.push('\n');
            out.push_str(&backstory);
        }
        out.push_str("\nYour personal goal is: ");
        out.push_str(&interpolate(&role.goal, inputs));
        out.push_str("\n\n");
        out.push_str(&self.config.policy().delegation_brief(inputs));
        out
    }

    fn user_prompt(
        &self,
        task: TaskKind,
        inputs: &PipelineInputs,
        completed: &[TaskOutput],
    ) -> anyhow::Result<String> {
        let cfg = self.config.task(task);
        let mut out = interpolate(&cfg.description, inputs);

        let context = self.config.graph().context(task);
        if !context.is_empty() {
            out.push_str("\n\nContext from previous tasks:");
            for dep in context {
                let prior = completed
                    .iter()
                    .find(|o| o.task == *dep)
                    .with_context(|| format!("context task {dep} has not run"))?;
                out.push_str(&format!("\n\n### {dep}\n{}", prior.raw));
            }
        }

        out.push_str("\n\nExpected output: ");
        out.push_str(&interpolate(&cfg.expected_output, inputs));

        if let Some(schema) = response_schema(task) {
            let pretty = serde_json::to_string_pretty(&schema.schema)
                .context("failed to render output schema")?;
            out.push_str(&format!(
                "\n\nRespond with a single JSON object matching the `{}` schema:\n{pretty}\n\
                 Do not include prose or Markdown outside the JSON object.",
                schema.name
            ));
        }

        Ok(out)
    }
}

#[async_trait::async_trait]
impl PipelineRunner for Crew {
    async fn run_pipeline(&self, inputs: &PipelineInputs) -> anyhow::Result<PipelineResult> {
        self.kickoff(inputs).await.map(PipelineResult::Crew)
    }
}

fn client_or_unavailable(
    provider: Provider,
    client: anyhow::Result<ChatCompletionsClient>,
) -> Arc<dyn LlmClient> {
    match client {
        Ok(client) => Arc::new(client),
        Err(err) => {
            tracing::warn!(%provider, error = %err, "LLM client not configured");
            Arc::new(UnavailableClient {
                provider,
                reason: format!("{err:#}"),
            })
        }
    }
}

fn schema_of<T: StageSchema>() -> ResponseSchema {
    ResponseSchema {
        name: T::NAME,
        schema: T::json_schema(),
    }
}

fn response_schema(task: TaskKind) -> Option<ResponseSchema> {
    match task {
        TaskKind::FindTrendingCompanies => Some(schema_of::<TrendingCompanyList>()),
        TaskKind::ResearchTrendingCompanies => Some(schema_of::<TrendingCompanyResearchList>()),
        TaskKind::PickBestCompany => None,
    }
}

fn structured<T: StageSchema>(text: &str) -> anyhow::Result<(String, Option<Value>)> {
    let parsed = parse_stage_output::<T>(text)?;
    let value = serde_json::to_value(&parsed).context("failed to encode stage output")?;
    let raw = serde_json::to_string_pretty(&value).context("failed to encode stage output")?;
    Ok((raw, Some(value)))
}

fn decode_output(task: TaskKind, text: &str) -> anyhow::Result<(String, Option<Value>)> {
    match task {
        TaskKind::FindTrendingCompanies => structured::<TrendingCompanyList>(text),
        TaskKind::ResearchTrendingCompanies => structured::<TrendingCompanyResearchList>(text),
        TaskKind::PickBestCompany => {
            let raw = text.trim().to_string();
            ensure!(!raw.is_empty(), "final recommendation is empty");
            Ok((raw, None))
        }
    }
}
