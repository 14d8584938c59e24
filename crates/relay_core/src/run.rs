//! Run and step records.
//!
//! A run snapshots its pipeline's agents at creation, so later edits to the
//! pipeline never change a run's step sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::{Pipeline, PipelineId};

/// Run identifier.
pub type RunId = String;

/// Status of a single step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started yet
    #[default]
    Pending,
    /// Streaming output
    Running,
    /// Completed normally
    Done,
    /// Provider failed while the step was running
    Error,
}

/// Status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Why a run ended in [`RunStatus::Error`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    /// Stopped by the caller before or during `step`.
    Cancelled { step: usize },
    /// The completion provider failed while running `step`.
    Provider { step: usize, message: String },
}

impl RunFailure {
    /// Index of the step the run stopped at.
    pub fn step(&self) -> usize {
        match self {
            Self::Cancelled { step } | Self::Provider { step, .. } => *step,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled { step } => write!(f, "cancelled at step {}", step + 1),
            Self::Provider { step, message } => {
                write!(f, "provider failed at step {}: {}", step + 1, message)
            }
        }
    }
}

/// One agent's input, output and status within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    pub agent_id: String,
    /// Copied so the run renders even after the pipeline changes
    pub agent_name: String,
    pub color: String,
    /// Set when the step starts
    pub input: String,
    /// Grows monotonically while running
    pub output: String,
    pub status: StepStatus,
}

/// One execution of a pipeline against a user input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    pub pipeline_id: PipelineId,
    pub pipeline_name: String,
    pub user_input: String,
    pub steps: Vec<Step>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure: Option<RunFailure>,
}

impl Run {
    /// Create a running run with one pending step per pipeline agent.
    pub fn new(pipeline: &Pipeline, user_input: impl Into<String>) -> Self {
        let steps = pipeline
            .agents
            .iter()
            .map(|agent| Step {
                agent_id: agent.id.clone(),
                agent_name: agent.name.clone(),
                color: agent.color.clone(),
                input: String::new(),
                output: String::new(),
                status: StepStatus::Pending,
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            pipeline_id: pipeline.id.clone(),
            pipeline_name: pipeline.name.clone(),
            user_input: user_input.into(),
            steps,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            failure: None,
        }
    }

    /// Whether the run has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Index of the step currently running.
    pub fn current_step(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.status == StepStatus::Running)
    }

    /// Number of steps that completed.
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Done)
            .count()
    }

    /// Output of the last step, once the run is done.
    pub fn final_output(&self) -> Option<&str> {
        if self.status != RunStatus::Done {
            return None;
        }
        self.steps.last().map(|s| s.output.as_str())
    }

    /// Wall-clock duration, once the run has finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    /// Check the step ordering invariant: a prefix of `done` steps, then at
    /// most one `running` or `error` step, then only `pending` steps.
    pub fn is_well_ordered(&self) -> bool {
        let mut rest = self.steps.iter().skip_while(|s| s.status == StepStatus::Done);
        rest.next();
        rest.all(|s| s.status == StepStatus::Pending)
    }
}
