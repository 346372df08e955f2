//! Declarative definition of the stock-picking crew and the executor that runs it.
//!
//! Roles and tasks come from YAML (`config/agents.yaml`, `config/tasks.yaml`), are validated
//! once at load time, and are then driven in the static order given by the task graph. The
//! manager role never produces output; its authority is expressed by the coordination policy.

pub mod config;
pub mod executor;
pub mod graph;
pub mod policy;

pub use config::{CrewConfig, RoleKind, TaskKind, ToolKind};
pub use executor::{Crew, CrewOutput, PipelineResult, PipelineRunner, TaskOutput};
pub use graph::TaskGraph;
pub use policy::{Assignment, Capability, CoordinationPolicy};

use serde::Serialize;

/// Per-request parameters interpolated into role and task templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineInputs {
    pub sector: String,
}

impl PipelineInputs {
    pub const KEYS: [&'static str; 1] = ["sector"];

    pub fn new(sector: impl Into<String>) -> Self {
        Self {
            sector: sector.into(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "sector" => Some(&self.sector),
            _ => None,
        }
    }
}
