use crate::crew::config::{interpolate, RoleConfig};
use crate::crew::{PipelineInputs, RoleKind, TaskKind, ToolKind};
use anyhow::ensure;
use serde::Serialize;
use std::fmt;

/// Kind of LLM backend a worker needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Search-grounded model; used by roles carrying the `web_search` tool.
    WebSearch,
    Reasoning,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::WebSearch => write!(f, "web_search"),
            Capability::Reasoning => write!(f, "reasoning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub task: TaskKind,
    pub worker: RoleKind,
    pub capability: Capability,
}

/// The manager's delegation decisions, fixed at load time.
#[derive(Debug, Clone)]
pub struct CoordinationPolicy {
    manager: RoleConfig,
    assignments: Vec<Assignment>,
}

impl CoordinationPolicy {
    pub fn build(
        manager: &RoleConfig,
        workers: &[(TaskKind, RoleKind, &RoleConfig)],
    ) -> anyhow::Result<Self> {
        ensure!(
            manager.allow_delegation,
            "manager must set allow_delegation: true"
        );
        ensure!(
            manager.tools.is_empty(),
            "manager coordinates only and must not carry tools"
        );

        let mut assignments = Vec::with_capacity(workers.len());
        for &(task, worker, role) in workers {
            ensure!(
                worker != RoleKind::Manager,
                "task {task} is assigned to the manager, which only delegates"
            );
            ensure!(
                !role.allow_delegation,
                "worker {worker} must not set allow_delegation"
            );

            let capability = if role.tools.contains(&ToolKind::WebSearch) {
                Capability::WebSearch
            } else {
                Capability::Reasoning
            };
            assignments.push(Assignment {
                task,
                worker,
                capability,
            });
        }

        Ok(Self {
            manager: manager.clone(),
            assignments,
        })
    }

    pub fn assign(&self, task: TaskKind) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.task == task)
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Prompt fragment telling a worker who delegated the task and toward what goal.
    pub fn delegation_brief(&self, inputs: &PipelineInputs) -> String {
        format!(
            "This task was delegated to you by the {}. Their goal: {}",
            interpolate(&self.manager.role, inputs),
            interpolate(&self.manager.goal, inputs)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(tools: Vec<ToolKind>, allow_delegation: bool) -> RoleConfig {
        RoleConfig {
            role: "Role".to_string(),
            goal: "Pick the best company in {sector}".to_string(),
            backstory: String::new(),
            tools,
            allow_delegation,
        }
    }

    #[test]
    fn assigns_capability_from_tools() {
        let manager = role(vec![], true);
        let search = role(vec![ToolKind::WebSearch], false);
        let plain = role(vec![], false);
        let policy = CoordinationPolicy::build(
            &manager,
            &[
                (TaskKind::FindTrendingCompanies, RoleKind::TrendingCompanyFinder, &search),
                (TaskKind::PickBestCompany, RoleKind::StockPicker, &plain),
            ],
        )
        .unwrap();

        let find = policy.assign(TaskKind::FindTrendingCompanies).unwrap();
        assert_eq!(find.capability, Capability::WebSearch);
        assert_eq!(find.worker, RoleKind::TrendingCompanyFinder);
        let pick = policy.assign(TaskKind::PickBestCompany).unwrap();
        assert_eq!(pick.capability, Capability::Reasoning);
        assert!(policy.assign(TaskKind::ResearchTrendingCompanies).is_none());
    }

    #[test]
    fn rejects_delegating_worker() {
        let manager = role(vec![], true);
        let worker = role(vec![], true);
        let err = CoordinationPolicy::build(
            &manager,
            &[(TaskKind::PickBestCompany, RoleKind::StockPicker, &worker)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("stock_picker"));
    }

    #[test]
    fn rejects_task_assigned_to_manager() {
        let manager = role(vec![], true);
        assert!(CoordinationPolicy::build(
            &manager,
            &[(TaskKind::PickBestCompany, RoleKind::Manager, &manager)],
        )
        .is_err());
    }

    #[test]
    fn embedded_crew_routes_search_roles_to_web_search() {
        let cfg = crate::crew::CrewConfig::embedded().unwrap();
        let caps: Vec<_> = cfg
            .policy()
            .assignments()
            .iter()
            .map(|a| (a.task, a.capability))
            .collect();
        assert_eq!(
            caps,
            vec![
                (TaskKind::FindTrendingCompanies, Capability::WebSearch),
                (TaskKind::ResearchTrendingCompanies, Capability::WebSearch),
                (TaskKind::PickBestCompany, Capability::Reasoning),
            ]
        );
    }

    #[test]
    fn brief_interpolates_sector() {
        let manager = role(vec![], true);
        let policy = CoordinationPolicy::build(&manager, &[]).unwrap();
        let brief = policy.delegation_brief(&PipelineInputs::new("Biotechnology"));
        assert!(brief.contains("Pick the best company in Biotechnology"));
    }
}
