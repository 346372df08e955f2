use crate::crew::TaskKind;
use anyhow::{bail, ensure};
use std::collections::{BTreeMap, BTreeSet};

/// Data dependencies every crew definition must declare.
const REQUIRED_EDGES: [(TaskKind, TaskKind); 2] = [
    (TaskKind::ResearchTrendingCompanies, TaskKind::FindTrendingCompanies),
    (TaskKind::PickBestCompany, TaskKind::ResearchTrendingCompanies),
];

/// Static execution order derived from each task's `context` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGraph {
    order: Vec<TaskKind>,
    context: BTreeMap<TaskKind, Vec<TaskKind>>,
}

impl TaskGraph {
    pub fn build(context_of: impl Fn(TaskKind) -> Vec<TaskKind>) -> anyhow::Result<Self> {
        let context: BTreeMap<TaskKind, Vec<TaskKind>> = TaskKind::ALL
            .iter()
            .map(|&task| (task, context_of(task)))
            .collect();

        for (task, deps) in &context {
            ensure!(!deps.contains(task), "task {task} lists itself as context");
        }
        for (task, dep) in REQUIRED_EDGES {
            ensure!(
                context[&task].contains(&dep),
                "task {task} must list {dep} as context"
            );
        }

        // Kahn's algorithm; ties resolve in declaration order so the result is deterministic.
        let mut remaining: BTreeMap<TaskKind, BTreeSet<TaskKind>> = context
            .iter()
            .map(|(task, deps)| (*task, deps.iter().copied().collect()))
            .collect();
        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let Some(next) = remaining
                .iter()
                .find(|(_, deps)| deps.is_empty())
                .map(|(task, _)| *task)
            else {
                let stuck: Vec<&str> = remaining.keys().map(|t| t.as_str()).collect();
                bail!("task context contains a cycle among: {}", stuck.join(", "));
            };
            remaining.remove(&next);
            for deps in remaining.values_mut() {
                deps.remove(&next);
            }
            order.push(next);
        }

        ensure!(
            order == TaskKind::ALL,
            "task order must be {:?} (got {:?})",
            TaskKind::ALL,
            order
        );

        Ok(Self { order, context })
    }

    pub fn order(&self) -> &[TaskKind] {
        &self.order
    }

    pub fn context(&self, task: TaskKind) -> &[TaskKind] {
        self.context.get(&task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The task whose raw output is the pipeline result.
    pub fn final_task(&self) -> TaskKind {
        self.order
            .last()
            .copied()
            .unwrap_or(TaskKind::PickBestCompany)
    }
}
