//! Pipeline executor.
//!
//! Drives one run of a pipeline: each agent's final output becomes the next
//! agent's input. Runs execute as spawned tasks; callers observe them through
//! the run history, a per-run `watch` channel, or the event bus.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::agent::Agent;
use crate::cancel::CancelToken;
use crate::config::ExecutorConfig;
use crate::error::{CoreError, CoreResult};
use crate::event::{EventBus, RunEvent};
use crate::history::{RunHistory, RunWriter};
use crate::pipeline::PipelineStore;
use crate::provider::{CompletionProvider, CompletionRequest};
use crate::run::{Run, RunFailure, RunId};

/// Handle to a started run.
pub struct RunHandle {
    run_id: RunId,
    state: watch::Receiver<Run>,
    cancel: CancelToken,
    task: JoinHandle<Run>,
}

impl RunHandle {
    /// Id of the run.
    pub fn id(&self) -> &str {
        &self.run_id
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Run {
        self.state.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<Run> {
        self.state.clone()
    }

    /// Request cancellation. Returns `true` if this call raised the flag.
    ///
    /// Finished runs are left alone.
    pub fn stop(&self) -> bool {
        if self.state.borrow().is_terminal() {
            return false;
        }
        self.cancel.cancel()
    }

    /// Wait for the run to finish and return its final state.
    pub async fn wait(self) -> CoreResult<Run> {
        self.task.await.map_err(|e| CoreError::Join(e.to_string()))
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Runs pipelines from a [`PipelineStore`] and records them in a
/// [`RunHistory`].
pub struct PipelineExecutor {
    store: Arc<PipelineStore>,
    history: Arc<RunHistory>,
    provider: Arc<dyn CompletionProvider>,
    events: EventBus,
    config: ExecutorConfig,
}

impl PipelineExecutor {
    /// Create an executor with default configuration.
    pub fn new(
        store: Arc<PipelineStore>,
        history: Arc<RunHistory>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let config = ExecutorConfig::default();
        Self {
            store,
            history,
            provider,
            events: EventBus::new(config.event_capacity),
            config,
        }
    }

    /// Replace the configuration.
    ///
    /// Rebuilds the event bus, so receivers taken earlier see no further events.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.events = EventBus::new(config.event_capacity);
        self.config = config;
        self
    }

    /// The pipelines this executor runs.
    pub fn store(&self) -> &Arc<PipelineStore> {
        &self.store
    }

    /// Every run started by this executor.
    pub fn history(&self) -> &Arc<RunHistory> {
        &self.history
    }

    /// Active configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Subscribe to events of all runs started after this call.
    pub fn events(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// Start a run and return its handle.
    ///
    /// Fails without creating a run if the pipeline is unknown or has no
    /// agents. The run is published to the history before any agent executes.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, pipeline_id: &str, user_input: &str) -> CoreResult<RunHandle> {
        let pipeline = self
            .store
            .get(pipeline_id)
            .ok_or_else(|| CoreError::PipelineNotFound(pipeline_id.to_string()))?;
        if !pipeline.is_runnable() {
            return Err(CoreError::EmptyPipeline(pipeline_id.to_string()));
        }

        let run = Run::new(&pipeline, user_input);
        let run_id = run.id.clone();
        let cancel = CancelToken::new();
        let writer = self.history.publish(run, cancel.clone());
        let state = writer.subscribe();

        info!(
            "Starting run {} of pipeline '{}' ({} steps)",
            run_id,
            pipeline.name,
            pipeline.agents.len()
        );

        let driver = Driver {
            writer,
            agents: pipeline.agents,
            provider: self.provider.clone(),
            cancel: cancel.clone(),
            events: self.events.clone(),
            config: self.config.clone(),
        };
        let task = tokio::spawn(driver.drive());

        Ok(RunHandle {
            run_id,
            state,
            cancel,
            task,
        })
    }

    /// Start the active pipeline.
    pub fn start_active(&self, user_input: &str) -> CoreResult<RunHandle> {
        let id = self
            .store
            .active_id()
            .ok_or_else(|| CoreError::PipelineNotFound("<none selected>".to_string()))?;
        self.start(&id, user_input)
    }

    /// Start a run in the background and return its id.
    pub fn run(&self, pipeline_id: &str, user_input: &str) -> CoreResult<RunId> {
        let handle = self.start(pipeline_id, user_input)?;
        Ok(handle.run_id)
    }

    /// Run a pipeline to completion.
    pub async fn execute(&self, pipeline_id: &str, user_input: &str) -> CoreResult<Run> {
        self.start(pipeline_id, user_input)?.wait().await
    }

    /// Stop a run. Idempotent; finished and unknown runs are left alone.
    pub fn stop(&self, run_id: &str) -> bool {
        let stopped = self.history.cancel(run_id);
        if stopped {
            info!("Stop requested for run {}", run_id);
        }
        stopped
    }

    /// Current snapshot of a run.
    pub fn observe(&self, run_id: &str) -> Option<Run> {
        self.history.get(run_id)
    }

    /// Subscribe to state changes of a run.
    pub fn subscribe(&self, run_id: &str) -> Option<watch::Receiver<Run>> {
        self.history.subscribe(run_id)
    }
}

/// Why a step stopped early.
enum StepError {
    Cancelled,
    Failed(String),
}

/// Owns the drive loop of a single run.
struct Driver {
    writer: RunWriter,
    agents: Vec<Agent>,
    provider: Arc<dyn CompletionProvider>,
    cancel: CancelToken,
    events: EventBus,
    config: ExecutorConfig,
}

impl Driver {
    async fn drive(self) -> Run {
        let run = self.writer.snapshot();
        let run_id = run.id.clone();
        self.events.publish(RunEvent::RunStarted {
            run_id: run_id.clone(),
            pipeline_id: run.pipeline_id.clone(),
            steps: run.steps.len(),
        });

        let mut carried = run.user_input;
        let mut failure = None;

        for (index, agent) in self.agents.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Run {} cancelled before step {}", run_id, index + 1);
                failure = Some(RunFailure::Cancelled { step: index });
                break;
            }

            info!(
                "Executing step [{}/{}]: {} ({})",
                index + 1,
                self.agents.len(),
                agent.name,
                agent.model_id
            );
            self.writer.start_step(index, &carried);
            self.events.publish(RunEvent::StepStarted {
                run_id: run_id.clone(),
                step: index,
                agent_id: agent.id.clone(),
                input: carried.clone(),
            });

            match self.run_step(&run_id, index, agent, &carried).await {
                Ok(()) => {
                    carried = self.writer.finish_step(index);
                    self.events.publish(RunEvent::StepCompleted {
                        run_id: run_id.clone(),
                        step: index,
                    });
                    debug!("Step {} produced {} bytes", index + 1, carried.len());
                }
                Err(StepError::Cancelled) => {
                    warn!("Run {} cancelled during step {}", run_id, index + 1);
                    failure = Some(RunFailure::Cancelled { step: index });
                    break;
                }
                Err(StepError::Failed(message)) => {
                    error!("Step {} of run {} failed: {}", index + 1, run_id, message);
                    self.writer.fail_step(index);
                    self.events.publish(RunEvent::StepFailed {
                        run_id: run_id.clone(),
                        step: index,
                        error: message.clone(),
                    });
                    failure = Some(RunFailure::Provider {
                        step: index,
                        message,
                    });
                    break;
                }
            }
        }

        let run = self.writer.finalize(failure.clone());
        match failure {
            None => {
                info!("Run {} completed", run_id);
                self.events.publish(RunEvent::RunCompleted { run_id });
            }
            Some(RunFailure::Cancelled { step }) => {
                info!("Run {} stopped at step {}", run_id, step + 1);
                self.events.publish(RunEvent::RunCancelled { run_id, step });
            }
            Some(failure) => {
                info!("Run {} ended with error: {}", run_id, failure);
                self.events.publish(RunEvent::RunFailed { run_id, failure });
            }
        }
        run
    }

    async fn run_step(
        &self,
        run_id: &str,
        index: usize,
        agent: &Agent,
        input: &str,
    ) -> Result<(), StepError> {
        let request = CompletionRequest::new(&agent.system_prompt, input, &agent.model_id);
        let work = self.consume(run_id, index, &request);

        match self.config.step_timeout() {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(StepError::Failed(CoreError::Timeout(index + 1).to_string())),
            },
            None => work.await,
        }
    }

    async fn consume(
        &self,
        run_id: &str,
        index: usize,
        request: &CompletionRequest,
    ) -> Result<(), StepError> {
        if !self.config.streaming {
            let text = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StepError::Cancelled),
                result = self.provider.complete(request) => {
                    result.map_err(|e| StepError::Failed(e.to_string()))?
                }
            };
            self.apply(run_id, index, text);
            return Ok(());
        }

        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StepError::Cancelled),
            opened = self.provider.complete_streaming(request, self.cancel.clone()) => {
                opened.map_err(|e| StepError::Failed(e.to_string()))?
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StepError::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(delta)) => self.apply(run_id, index, delta),
                Some(Err(e)) => return Err(StepError::Failed(e.to_string())),
                // Providers end their stream early once stopped
                None if self.cancel.is_cancelled() => return Err(StepError::Cancelled),
                None => return Ok(()),
            }
        }
    }

    fn apply(&self, run_id: &str, index: usize, delta: String) {
        if delta.is_empty() {
            return;
        }
        self.writer.append_output(index, &delta);
        self.events.publish(RunEvent::StepOutput {
            run_id: run_id.to_string(),
            step: index,
            delta,
        });
    }
}
