use crate::crew::graph::TaskGraph;
use crate::crew::policy::CoordinationPolicy;
use crate::crew::PipelineInputs;
use anyhow::{bail, ensure, Context};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

const EMBEDDED_AGENTS_YAML: &str = include_str!("../../config/agents.yaml");
const EMBEDDED_TASKS_YAML: &str = include_str!("../../config/tasks.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    TrendingCompanyFinder,
    FinancialResearcher,
    StockPicker,
    Manager,
}

impl RoleKind {
    pub const ALL: [RoleKind; 4] = [
        RoleKind::TrendingCompanyFinder,
        RoleKind::FinancialResearcher,
        RoleKind::StockPicker,
        RoleKind::Manager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::TrendingCompanyFinder => "trending_company_finder",
            RoleKind::FinancialResearcher => "financial_researcher",
            RoleKind::StockPicker => "stock_picker",
            RoleKind::Manager => "manager",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    FindTrendingCompanies,
    ResearchTrendingCompanies,
    PickBestCompany,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::FindTrendingCompanies,
        TaskKind::ResearchTrendingCompanies,
        TaskKind::PickBestCompany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::FindTrendingCompanies => "find_trending_companies",
            TaskKind::ResearchTrendingCompanies => "research_trending_companies",
            TaskKind::PickBestCompany => "pick_best_company",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    pub tools: Vec<ToolKind>,
    #[serde(default)]
    pub allow_delegation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub description: String,
    pub expected_output: String,
    pub agent: RoleKind,
    #[serde(default)]
    pub context: Vec<TaskKind>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentsFile {
    trending_company_finder: RoleConfig,
    financial_researcher: RoleConfig,
    stock_picker: RoleConfig,
    manager: RoleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TasksFile {
    find_trending_companies: TaskConfig,
    research_trending_companies: TaskConfig,
    pick_best_company: TaskConfig,
}

/// Validated crew definition. Constructed once per process and shared read-only.
#[derive(Debug, Clone)]
pub struct CrewConfig {
    agents: AgentsFile,
    tasks: TasksFile,
    graph: TaskGraph,
    policy: CoordinationPolicy,
}

impl CrewConfig {
    /// Loads from `dir` when given, otherwise from the definitions compiled into the binary.
    pub fn load(dir: Option<&str>) -> anyhow::Result<Self> {
        match dir {
            Some(dir) => Self::from_dir(Path::new(dir)),
            None => Self::embedded(),
        }
    }

    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_yaml(EMBEDDED_AGENTS_YAML, EMBEDDED_TASKS_YAML)
    }

    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let agents_path = dir.join("agents.yaml");
        let tasks_path = dir.join("tasks.yaml");
        let agents = std::fs::read_to_string(&agents_path)
            .with_context(|| format!("failed to read {}", agents_path.display()))?;
        let tasks = std::fs::read_to_string(&tasks_path)
            .with_context(|| format!("failed to read {}", tasks_path.display()))?;
        Self::from_yaml(&agents, &tasks)
            .with_context(|| format!("invalid crew configuration in {}", dir.display()))
    }

    pub fn from_yaml(agents_yaml: &str, tasks_yaml: &str) -> anyhow::Result<Self> {
        let agents: AgentsFile =
            serde_yaml::from_str(agents_yaml).context("failed to parse agents.yaml")?;
        let tasks: TasksFile =
            serde_yaml::from_str(tasks_yaml).context("failed to parse tasks.yaml")?;

        for kind in RoleKind::ALL {
            validate_role(role_of(&agents, kind))
                .with_context(|| format!("invalid role {kind}"))?;
        }
        for kind in TaskKind::ALL {
            validate_task(task_of(&tasks, kind))
                .with_context(|| format!("invalid task {kind}"))?;
        }

        let graph = TaskGraph::build(|kind| task_of(&tasks, kind).context.clone())?;
        let policy = {
            let workers: Vec<(TaskKind, RoleKind, &RoleConfig)> = TaskKind::ALL
                .iter()
                .map(|&task| {
                    let agent = task_of(&tasks, task).agent;
                    (task, agent, role_of(&agents, agent))
                })
                .collect();
            CoordinationPolicy::build(&agents.manager, &workers)?
        };

        Ok(Self {
            agents,
            tasks,
            graph,
            policy,
        })
    }

    pub fn role(&self, kind: RoleKind) -> &RoleConfig {
        role_of(&self.agents, kind)
    }

    pub fn task(&self, kind: TaskKind) -> &TaskConfig {
        task_of(&self.tasks, kind)
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn policy(&self) -> &CoordinationPolicy {
        &self.policy
    }
}

fn role_of(agents: &AgentsFile, kind: RoleKind) -> &RoleConfig {
    match kind {
        RoleKind::TrendingCompanyFinder => &agents.trending_company_finder,
        RoleKind::FinancialResearcher => &agents.financial_researcher,
        RoleKind::StockPicker => &agents.stock_picker,
        RoleKind::Manager => &agents.manager,
    }
}

fn task_of(tasks: &TasksFile, kind: TaskKind) -> &TaskConfig {
    match kind {
        TaskKind::FindTrendingCompanies => &tasks.find_trending_companies,
        TaskKind::ResearchTrendingCompanies => &tasks.research_trending_companies,
        TaskKind::PickBestCompany => &tasks.pick_best_company,
    }
}

fn validate_role(role: &RoleConfig) -> anyhow::Result<()> {
    ensure!(!role.role.trim().is_empty(), "role must be non-empty");
    ensure!(!role.goal.trim().is_empty(), "goal must be non-empty");
    for template in [&role.role, &role.goal, &role.backstory] {
        check_placeholders(template)?;
    }
    Ok(())
}

fn validate_task(task: &TaskConfig) -> anyhow::Result<()> {
    ensure!(
        !task.description.trim().is_empty(),
        "description must be non-empty"
    );
    ensure!(
        !task.expected_output.trim().is_empty(),
        "expected_output must be non-empty"
    );
    for template in [&task.description, &task.expected_output] {
        check_placeholders(template)?;
    }
    Ok(())
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder regex is valid"))
}

fn check_placeholders(template: &str) -> anyhow::Result<()> {
    for caps in placeholder_re().captures_iter(template) {
        let key = &caps[1];
        if !PipelineInputs::KEYS.contains(&key) {
            bail!(
                "unknown placeholder {{{key}}} (allowed: {})",
                PipelineInputs::KEYS.join(", ")
            );
        }
    }
    Ok(())
}

/// Substitutes `{key}` placeholders with the request's inputs.
pub fn interpolate(template: &str, inputs: &PipelineInputs) -> String {
    placeholder_re()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            inputs.get(&caps[1]).unwrap_or(&caps[0]).to_string()
        })
        .trim()
        .to_string()
}
