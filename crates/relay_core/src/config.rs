//! Configuration types.
//!
//! Every section has defaults, so an empty TOML file is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::{AgentRegistry, DEFAULT_MODEL};
use crate::error::{CoreError, CoreResult};
use crate::pipeline::PipelineStore;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV: &str = "RELAY_CONFIG";

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Use incremental delivery instead of atomic completions
    pub streaming: bool,
    /// Per-step deadline in seconds (0 = no timeout)
    pub step_timeout_secs: u64,
    /// Capacity of the run event channel
    pub event_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            streaming: true,
            step_timeout_secs: 0,
            event_capacity: crate::event::DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ExecutorConfig {
    /// Request streamed increments (`true`) or whole completions.
    pub fn streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    /// Per-step time limit in seconds. `0` disables it.
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.step_timeout_secs = seconds;
        self
    }

    /// The per-step limit, if any.
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }
}

/// Simulated provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Delay between increments in milliseconds
    pub delay_ms: u64,
    /// Characters per increment
    pub chunk_chars: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            delay_ms: 8,
            chunk_chars: 1,
        }
    }
}

impl SimulatorConfig {
    /// Pause between increments, in milliseconds.
    pub fn delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Characters per increment.
    pub fn chunk(mut self, chars: usize) -> Self {
        self.chunk_chars = chars;
        self
    }
}

/// A custom agent declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Id used by `[[pipelines]]` to reference this agent
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// A pipeline declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Agent ids, presets or `[[agents]]` entries
    #[serde(default)]
    pub agents: Vec<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub executor: ExecutorConfig,
    pub simulator: SimulatorConfig,
    pub agents: Vec<AgentConfig>,
    pub pipelines: Vec<PipelineConfig>,
}

impl RelayConfig {
    /// Load a config file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from `$RELAY_CONFIG`, falling back to defaults when unset.
    pub fn from_env() -> CoreResult<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(content)?;
        if config.simulator.chunk_chars == 0 {
            return Err(CoreError::Config(
                "simulator.chunk_chars must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Build the agent registry: presets plus configured custom agents.
    pub fn build_registry(&self) -> CoreResult<AgentRegistry> {
        let mut registry = AgentRegistry::new();
        for agent in &self.agents {
            registry.make_custom_as(
                &agent.id,
                &agent.name,
                &agent.description,
                &agent.system_prompt,
                &agent.model,
                0,
            )?;
        }
        Ok(registry)
    }

    /// Build the pipeline store.
    ///
    /// Agents are appended through [`PipelineStore::add_agent`] so ids and
    /// colors follow the same rules as interactive edits. With no configured
    /// pipelines the store holds the default pipeline.
    pub fn build_store(&self, registry: &AgentRegistry) -> CoreResult<PipelineStore> {
        if self.pipelines.is_empty() {
            return Ok(PipelineStore::with_default());
        }

        let store = PipelineStore::new();
        for pipeline in &self.pipelines {
            let agents = pipeline
                .agents
                .iter()
                .map(|id| registry.get_required(id).cloned())
                .collect::<CoreResult<Vec<_>>>()?;

            let id = match &pipeline.id {
                Some(id) => {
                    if !store.create_with_id(id.clone(), &pipeline.name, Vec::new()) {
                        return Err(CoreError::Config(format!("duplicate pipeline id: {}", id)));
                    }
                    id.clone()
                }
                None => store.create(&pipeline.name, Vec::new()),
            };
            for agent in &agents {
                store.add_agent(&id, agent);
            }
        }

        if let Some(first) = store.list().first() {
            store.set_active(&first.id);
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RelayConfig::parse("").unwrap();
        assert_eq!(config, RelayConfig::default());
        assert!(config.executor.streaming);
        assert!(config.executor.step_timeout().is_none());
        assert_eq!(config.simulator.delay_ms, 8);

        let registry = config.build_registry().unwrap();
        let store = config.build_store(&registry).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id().as_deref(), Some(crate::pipeline::DEFAULT_PIPELINE_ID));
    }

    #[test]
    fn test_full_config() {
        let config = RelayConfig::parse(
            r#"
            [executor]
            streaming = false
            step_timeout_secs = 30

            [simulator]
            delay_ms = 0
            chunk_chars = 16

            [[agents]]
            id = "critic"
            name = "Critic"
            system_prompt = "Find the weakest argument."

            [[pipelines]]
            id = "review"
            name = "Write and critique"
            agents = ["writer", "critic", "writer"]
            "#,
        )
        .unwrap();

        assert!(!config.executor.streaming);
        assert_eq!(config.executor.step_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.agents[0].model, DEFAULT_MODEL);

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.get_required("critic").unwrap().name, "Critic");

        let store = config.build_store(&registry).unwrap();
        let pipeline = store.get("review").unwrap();
        assert_eq!(pipeline.agents.len(), 3);
        assert!(pipeline.agents[1].id.starts_with("critic-"));
        assert_ne!(pipeline.agents[0].id, pipeline.agents[2].id);
        assert_eq!(store.active_id().as_deref(), Some("review"));
    }

    #[test]
    fn test_unknown_agent_reference() {
        let config = RelayConfig::parse(
            r#"
            [[pipelines]]
            name = "Broken"
            agents = ["ghost"]
            "#,
        )
        .unwrap();
        let registry = config.build_registry().unwrap();
        let err = config.build_store(&registry).unwrap_err();
        assert!(matches!(err, CoreError::AgentNotFound(id) if id == "ghost"));
    }

    #[test]
    fn test_blank_custom_agent_rejected() {
        let config = RelayConfig::parse(
            r#"
            [[agents]]
            id = "blank"
            name = "Blank"
            system_prompt = ""
            "#,
        )
        .unwrap();
        assert!(matches!(config.build_registry(), Err(CoreError::InvalidAgent(_))));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let err = RelayConfig::parse("[simulator]\nchunk_chars = 0\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(RelayConfig::parse("[executor"), Err(CoreError::Toml(_))));
    }
}
