//! Run history and per-run state channels.
//!
//! Each run lives in a `watch` channel. The executor holds the only
//! [`RunWriter`]; everyone else reads snapshots or subscribes.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{CoreError, CoreResult};
use crate::run::{Run, RunFailure, RunStatus, StepStatus};

struct RunEntry {
    run_id: String,
    pipeline_id: String,
    state: Arc<watch::Sender<Run>>,
    cancel: CancelToken,
}

/// Append-only list of runs, newest first.
#[derive(Default)]
pub struct RunHistory {
    entries: RwLock<Vec<RunEntry>>,
}

impl RunHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a freshly created run and hand back its single writer.
    pub(crate) fn publish(&self, run: Run, cancel: CancelToken) -> RunWriter {
        let entry = RunEntry {
            run_id: run.id.clone(),
            pipeline_id: run.pipeline_id.clone(),
            state: Arc::new(watch::channel(run).0),
            cancel,
        };
        let writer = RunWriter {
            state: entry.state.clone(),
        };
        debug!("Published run {} for pipeline {}", entry.run_id, entry.pipeline_id);
        self.entries.write().insert(0, entry);
        writer
    }

    /// Current snapshot of a run.
    pub fn get(&self, run_id: &str) -> Option<Run> {
        self.entries
            .read()
            .iter()
            .find(|e| e.run_id == run_id)
            .map(|e| e.state.borrow().clone())
    }

    /// Current snapshot of a run, returning an error if unknown.
    pub fn get_required(&self, run_id: &str) -> CoreResult<Run> {
        self.get(run_id)
            .ok_or_else(|| CoreError::RunNotFound(run_id.to_string()))
    }

    /// Subscribe to every published change of a run.
    pub fn subscribe(&self, run_id: &str) -> Option<watch::Receiver<Run>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.run_id == run_id)
            .map(|e| e.state.subscribe())
    }

    /// Raise a run's cancellation flag.
    ///
    /// Returns `true` if the run was still in flight. Finished and unknown
    /// runs are left alone.
    pub fn cancel(&self, run_id: &str) -> bool {
        let entries = self.entries.read();
        let Some(entry) = entries.iter().find(|e| e.run_id == run_id) else {
            return false;
        };
        if entry.state.borrow().is_terminal() {
            return false;
        }
        entry.cancel.cancel()
    }

    /// All runs, newest first.
    pub fn list(&self) -> Vec<Run> {
        self.entries
            .read()
            .iter()
            .map(|e| e.state.borrow().clone())
            .collect()
    }

    /// Runs of one pipeline, newest first.
    pub fn for_pipeline(&self, pipeline_id: &str) -> Vec<Run> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.pipeline_id == pipeline_id)
            .map(|e| e.state.borrow().clone())
            .collect()
    }

    /// Most recent run of a pipeline.
    pub fn latest_for(&self, pipeline_id: &str) -> Option<Run> {
        self.entries
            .read()
            .iter()
            .find(|e| e.pipeline_id == pipeline_id)
            .map(|e| e.state.borrow().clone())
    }

    /// Ids of runs still in flight.
    pub fn running(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|e| !e.state.borrow().is_terminal())
            .map(|e| e.run_id.clone())
            .collect()
    }

    /// Whether `run_id` is known and not yet finished.
    pub fn is_running(&self, run_id: &str) -> bool {
        self.get(run_id).is_some_and(|r| !r.is_terminal())
    }

    /// Number of recorded runs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for RunHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHistory")
            .field(
                "runs",
                &self.entries.read().iter().map(|e| e.run_id.clone()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// The single mutator of a run's state.
///
/// Output is only ever appended, so observers see a growing prefix.
pub(crate) struct RunWriter {
    state: Arc<watch::Sender<Run>>,
}

impl RunWriter {
    /// Current state of the run.
    pub fn snapshot(&self) -> Run {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Run> {
        self.state.subscribe()
    }

    /// Mark step `index` running with `input`.
    pub fn start_step(&self, index: usize, input: &str) {
        self.state.send_modify(|run| {
            let step = &mut run.steps[index];
            step.input = input.to_string();
            step.status = StepStatus::Running;
        });
    }

    /// Append to the output of step `index`.
    pub fn append_output(&self, index: usize, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.state.send_modify(|run| run.steps[index].output.push_str(delta));
    }

    /// Mark a step done and return its final output.
    pub fn finish_step(&self, index: usize) -> String {
        let mut output = String::new();
        self.state.send_modify(|run| {
            let step = &mut run.steps[index];
            step.status = StepStatus::Done;
            output = step.output.clone();
        });
        output
    }

    /// Mark step `index` failed, keeping its partial output.
    pub fn fail_step(&self, index: usize) {
        self.state
            .send_modify(|run| run.steps[index].status = StepStatus::Error);
    }

    /// Move the run to its terminal status and return the final snapshot.
    pub fn finalize(&self, failure: Option<RunFailure>) -> Run {
        self.state.send_modify(|run| {
            run.status = if failure.is_some() {
                RunStatus::Error
            } else {
                RunStatus::Done
            };
            run.failure = failure;
            run.completed_at = Some(Utc::now());
        });
        self.snapshot()
    }
}
