//! CLI command definitions.
//!
//! Each subcommand builds the agent catalogue and pipeline store from
//! configuration, then inspects or runs them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use relay_core::{AgentRegistry, PipelineStore, RelayConfig};

pub mod agents;
pub mod pipelines;
pub mod run;

/// agent-relay - sequential multi-agent pipelines
#[derive(Parser)]
#[command(name = "relay")]
#[command(version, about = "agent-relay - sequential multi-agent pipelines")]
#[command(long_about = r#"
agent-relay chains agents into pipelines: each agent's final output becomes
the next agent's input. Completions come from a built-in simulator.

COMMANDS:
  agents     → List preset and configured agents
  pipelines  → List configured pipelines
  run        → Run a pipeline and stream its output

CONFIGURATION:
  --config <path>, then $RELAY_CONFIG, then built-in defaults.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  4 - Run failed
  5 - Run stopped
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    /// Load the configuration, or defaults when no file is given.
    pub fn load_config(&self) -> Result<RelayConfig> {
        match &self.config {
            Some(path) => {
                debug!("Using config file {}", path.display());
                RelayConfig::load(path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))
            }
            None => Ok(RelayConfig::default()),
        }
    }
}

/// Build the agent catalogue and pipeline store described by `config`.
pub fn build_stores(config: &RelayConfig) -> Result<(AgentRegistry, PipelineStore)> {
    let registry = config
        .build_registry()
        .context("Invalid agent configuration")?;
    let store = config
        .build_store(&registry)
        .context("Invalid pipeline configuration")?;
    Ok((registry, store))
}

#[derive(Subcommand)]
pub enum Commands {
    /// List preset and configured agents
    Agents(agents::AgentsArgs),

    /// List configured pipelines
    Pipelines(pipelines::PipelinesArgs),

    /// Run a pipeline and stream its output
    Run(run::RunArgs),
}
