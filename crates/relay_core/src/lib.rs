//! # relay_core
//!
//! Sequential multi-agent pipeline engine for agent-relay.
//!
//! A pipeline is an ordered chain of agents. Running it feeds the user's
//! input to the first agent and each agent's final output to the next,
//! publishing every partial output as it is produced.
//!
//! # Architecture
//!
//! - **Agents**: Preset and custom `(system prompt, model)` definitions
//! - **Pipelines**: Named, editable agent chains with an active selection
//! - **Providers**: Turn a prompt and input into text, atomically or as a stream
//! - **Executor**: Drives runs as background tasks with cooperative stop
//! - **History**: Every run ever started, observable while it executes
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relay_core::{PipelineExecutor, PipelineStore, RunHistory, SimulatedProvider};
//!
//! let store = Arc::new(PipelineStore::with_default());
//! let executor = PipelineExecutor::new(
//!     store,
//!     Arc::new(RunHistory::new()),
//!     Arc::new(SimulatedProvider::default()),
//! );
//!
//! let handle = executor.start("default", "Analyze market trends for electric vehicles")?;
//! let mut updates = handle.subscribe();
//! while updates.changed().await.is_ok() {
//!     if updates.borrow().is_terminal() {
//!         break;
//!     }
//! }
//! let run = handle.wait().await?;
//! println!("{}", run.final_output().unwrap_or_default());
//! ```

pub mod agent;
pub mod cancel;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod history;
pub mod mock;
pub mod pipeline;
pub mod provider;
pub mod run;
pub mod sim;

// Re-export main types for convenience
pub use agent::{palette_color, preset_agents, Agent, AgentRegistry, AGENT_COLORS, DEFAULT_MODEL};
pub use cancel::CancelToken;
pub use config::{AgentConfig, ExecutorConfig, PipelineConfig, RelayConfig, SimulatorConfig, CONFIG_ENV};
pub use error::{CoreError, CoreResult};
pub use event::{EventBus, RunEvent, DEFAULT_EVENT_CAPACITY};
pub use executor::{PipelineExecutor, RunHandle};
pub use history::RunHistory;
pub use mock::{CapturedCall, ScriptedProvider, ScriptedResponse};
pub use pipeline::{Pipeline, PipelineId, PipelineStore, PipelineUpdate, DEFAULT_PIPELINE_ID};
pub use provider::{CompletionProvider, CompletionRequest, CompletionStream};
pub use run::{Run, RunFailure, RunId, RunStatus, Step, StepStatus};
pub use sim::{Role, SimulatedProvider};
