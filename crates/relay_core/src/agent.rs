//! Agent definitions and the agent registry.
//!
//! An agent is a named `(system prompt, model)` pair. Presets ship with the
//! crate; custom agents are created through [`AgentRegistry::make_custom`].

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Display palette cycled by position within a pipeline.
pub const AGENT_COLORS: [&str; 6] = [
    "hsl(200, 98%, 39%)",
    "hsl(142, 71%, 45%)",
    "hsl(280, 68%, 55%)",
    "hsl(25, 95%, 53%)",
    "hsl(340, 75%, 55%)",
    "hsl(45, 93%, 47%)",
];

/// Model bound to the preset agents.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Color for an agent at `position` in a chain.
pub fn palette_color(position: usize) -> &'static str {
    AGENT_COLORS[position % AGENT_COLORS.len()]
}

/// An immutable agent definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Short description of what the agent does
    pub description: String,
    /// System prompt sent with every completion
    pub system_prompt: String,
    /// Model the agent runs on
    pub model_id: String,
    /// Display color
    pub color: String,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            system_prompt: system_prompt.into(),
            model_id: model_id.into(),
            color: palette_color(0).to_string(),
        }
    }

    /// Set the one-line description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Preset agents, in catalogue order.
pub fn preset_agents() -> Vec<Agent> {
    vec![
        Agent::new(
            "researcher",
            "Researcher",
            "You are a research agent. Analyze the input thoroughly and provide key findings, data points, and relevant context.",
            DEFAULT_MODEL,
        )
        .with_description("Gathers and synthesizes information on a topic")
        .with_color(palette_color(0)),
        Agent::new(
            "analyst",
            "Analyst",
            "You are an analytical agent. Take the research provided and identify patterns, insights, and actionable conclusions.",
            DEFAULT_MODEL,
        )
        .with_description("Analyzes data and draws conclusions")
        .with_color(palette_color(1)),
        Agent::new(
            "writer",
            "Writer",
            "You are a writing agent. Take the analysis provided and craft a clear, compelling, well-structured document.",
            DEFAULT_MODEL,
        )
        .with_description("Crafts polished written output")
        .with_color(palette_color(2)),
        Agent::new(
            "reviewer",
            "Reviewer",
            "You are a review agent. Critique the content for accuracy, clarity, and completeness. Provide an improved version.",
            DEFAULT_MODEL,
        )
        .with_description("Reviews and improves content quality")
        .with_color(palette_color(3)),
        Agent::new(
            "summarizer",
            "Summarizer",
            "You are a summarization agent. Distill the input into a clear, concise summary with key takeaways.",
            DEFAULT_MODEL,
        )
        .with_description("Creates concise summaries")
        .with_color(palette_color(4)),
    ]
}

/// Catalogue of preset and user-defined agents.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    presets: Vec<Agent>,
    custom: Vec<Agent>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    /// Create a registry holding the preset catalogue.
    pub fn new() -> Self {
        Self {
            presets: preset_agents(),
            custom: Vec::new(),
        }
    }

    /// Preset agents in catalogue order.
    pub fn list_presets(&self) -> &[Agent] {
        &self.presets
    }

    /// Custom agents in creation order.
    pub fn list_custom(&self) -> &[Agent] {
        &self.custom
    }

    /// All agents, presets first.
    pub fn list(&self) -> Vec<Agent> {
        self.presets.iter().chain(self.custom.iter()).cloned().collect()
    }

    /// Look up an agent by id.
    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.presets
            .iter()
            .chain(self.custom.iter())
            .find(|a| a.id == id)
    }

    /// Look up an agent by id, returning an error if not found.
    pub fn get_required(&self, id: &str) -> CoreResult<&Agent> {
        self.get(id)
            .ok_or_else(|| CoreError::AgentNotFound(id.to_string()))
    }

    /// Build a custom agent and add it to the catalogue.
    ///
    /// `position` is the current length of the pipeline the agent is meant
    /// for; it selects the display color. `name` and `system_prompt` must not
    /// be blank.
    pub fn make_custom(
        &mut self,
        name: &str,
        description: &str,
        system_prompt: &str,
        model_id: &str,
        position: usize,
    ) -> CoreResult<Agent> {
        let id = format!("custom-{}", Uuid::new_v4().simple());
        self.make_custom_as(id, name, description, system_prompt, model_id, position)
    }

    /// Like [`make_custom`](Self::make_custom), under a caller-chosen id.
    ///
    /// Used when agents come from configuration and are referenced by id.
    pub fn make_custom_as(
        &mut self,
        id: impl Into<String>,
        name: &str,
        description: &str,
        system_prompt: &str,
        model_id: &str,
        position: usize,
    ) -> CoreResult<Agent> {
        let id = id.into();
        if name.trim().is_empty() {
            return Err(CoreError::InvalidAgent("name is required".to_string()));
        }
        if system_prompt.trim().is_empty() {
            return Err(CoreError::InvalidAgent(
                "system prompt is required".to_string(),
            ));
        }
        if self.get(&id).is_some() {
            return Err(CoreError::InvalidAgent(format!("duplicate agent id: {}", id)));
        }

        let model_id = if model_id.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            model_id
        };

        let agent = Agent::new(id, name, system_prompt, model_id)
            .with_description(description)
            .with_color(palette_color(position));

        debug!("Registered custom agent: {} ({})", agent.name, agent.id);
        self.custom.push(agent.clone());
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles() {
        assert_eq!(palette_color(0), AGENT_COLORS[0]);
        assert_eq!(palette_color(5), AGENT_COLORS[5]);
        assert_eq!(palette_color(6), AGENT_COLORS[0]);
        assert_eq!(palette_color(13), AGENT_COLORS[1]);
    }

    #[test]
    fn test_presets_order() {
        let registry = AgentRegistry::new();
        let ids: Vec<&str> = registry.list_presets().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["researcher", "analyst", "writer", "reviewer", "summarizer"]);
        assert!(registry.list_presets().iter().all(|a| a.model_id == DEFAULT_MODEL));
    }

    #[test]
    fn test_make_custom() {
        let mut registry = AgentRegistry::new();
        let agent = registry
            .make_custom("Translator", "Translates text", "Translate to French.", "llama2", 2)
            .unwrap();

        assert!(agent.id.starts_with("custom-"));
        assert_eq!(agent.color, AGENT_COLORS[2]);
        assert_eq!(agent.model_id, "llama2");
        assert_eq!(registry.get(&agent.id), Some(&agent));

        let other = registry
            .make_custom("Translator", "", "Translate to French.", "llama2", 2)
            .unwrap();
        assert_ne!(agent.id, other.id);
    }

    #[test]
    fn test_make_custom_rejects_blank_fields() {
        let mut registry = AgentRegistry::new();

        let err = registry.make_custom("", "d", "prompt", "gpt-4o", 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAgent(_)));

        let err = registry.make_custom("Name", "d", "   ", "gpt-4o", 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAgent(_)));

        assert!(registry.list_custom().is_empty());
    }

    #[test]
    fn test_make_custom_defaults_model() {
        let mut registry = AgentRegistry::new();
        let agent = registry.make_custom("Name", "", "prompt", "", 0).unwrap();
        assert_eq!(agent.model_id, DEFAULT_MODEL);
    }

    #[test]
    fn test_make_custom_as_rejects_duplicates() {
        let mut registry = AgentRegistry::new();

        let err = registry
            .make_custom_as("writer", "Critic", "", "Be critical.", "gpt-4o", 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAgent(_)));

        registry
            .make_custom_as("critic", "Critic", "", "Be critical.", "gpt-4o", 0)
            .unwrap();
        assert_eq!(registry.get_required("critic").unwrap().name, "Critic");
        assert!(registry.get_required("missing").is_err());
        assert!(registry
            .make_custom_as("critic", "Again", "", "Be critical.", "gpt-4o", 0)
            .is_err());
    }
}
