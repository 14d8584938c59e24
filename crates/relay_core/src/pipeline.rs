//! Pipeline definitions and the pipeline store.
//!
//! A pipeline owns copies of its agents, so editing a preset later never
//! changes an existing chain.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::agent::{palette_color, preset_agents, Agent};

/// Pipeline identifier.
pub type PipelineId = String;

/// Id of the pipeline seeded by [`PipelineStore::with_default`].
pub const DEFAULT_PIPELINE_ID: &str = "default";

/// A named, ordered chain of agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub name: String,
    /// Agents in execution order
    pub agents: Vec<Agent>,
    pub created_at: DateTime<Utc>,
}

impl Pipeline {
    /// Whether the pipeline can be run.
    pub fn is_runnable(&self) -> bool {
        !self.agents.is_empty()
    }
}

/// Partial update for [`PipelineStore::update`]. `None` fields are unchanged.
#[derive(Debug, Clone, Default)]
pub struct PipelineUpdate {
    pub name: Option<String>,
    pub agents: Option<Vec<Agent>>,
}

impl PipelineUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents = Some(agents);
        self
    }
}

#[derive(Debug, Default)]
struct StoreState {
    pipelines: Vec<Pipeline>,
    active: Option<PipelineId>,
}

/// In-memory store of pipeline definitions.
///
/// All operations on unknown ids are silent no-ops: an edit can race with a
/// delete and must not fail the caller.
#[derive(Debug, Default)]
pub struct PipelineStore {
    state: RwLock<StoreState>,
    /// Disambiguator for agent copies.
    next_copy: AtomicU64,
}

impl PipelineStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the Research → Analyze → Write pipeline.
    pub fn with_default() -> Self {
        let store = Self::new();
        let agents: Vec<Agent> = preset_agents().into_iter().take(3).collect();
        store.insert(Pipeline {
            id: DEFAULT_PIPELINE_ID.to_string(),
            name: "Research → Analyze → Write".to_string(),
            agents,
            created_at: Utc::now(),
        });
        store
    }

    /// Create a pipeline and make it the active selection.
    pub fn create(&self, name: impl Into<String>, agents: Vec<Agent>) -> PipelineId {
        let pipeline = Pipeline {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            agents,
            created_at: Utc::now(),
        };
        let id = pipeline.id.clone();
        self.insert(pipeline);
        id
    }

    /// Create a pipeline under a caller-chosen id.
    ///
    /// Returns `false` without touching the store if the id is taken.
    pub fn create_with_id(
        &self,
        id: impl Into<PipelineId>,
        name: impl Into<String>,
        agents: Vec<Agent>,
    ) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.insert(Pipeline {
            id,
            name: name.into(),
            agents,
            created_at: Utc::now(),
        });
        true
    }

    fn insert(&self, pipeline: Pipeline) {
        debug!("Creating pipeline: {} ({})", pipeline.name, pipeline.id);
        let mut state = self.state.write();
        state.active = Some(pipeline.id.clone());
        state.pipelines.push(pipeline);
    }

    /// Apply a partial update.
    pub fn update(&self, id: &str, update: PipelineUpdate) {
        let mut state = self.state.write();
        let Some(pipeline) = state.pipelines.iter_mut().find(|p| p.id == id) else {
            debug!("Ignoring update for unknown pipeline: {}", id);
            return;
        };
        if let Some(name) = update.name {
            pipeline.name = name;
        }
        if let Some(agents) = update.agents {
            pipeline.agents = agents;
        }
        debug!("Updated pipeline: {}", id);
    }

    /// Rename a pipeline.
    pub fn rename(&self, id: &str, name: impl Into<String>) {
        self.update(id, PipelineUpdate::default().name(name));
    }

    /// Replace a pipeline's agent sequence.
    pub fn replace_agents(&self, id: &str, agents: Vec<Agent>) {
        self.update(id, PipelineUpdate::default().agents(agents));
    }

    /// Delete a pipeline. If it was active, selection falls back to the first
    /// remaining pipeline.
    pub fn delete(&self, id: &str) {
        let mut state = self.state.write();
        let before = state.pipelines.len();
        state.pipelines.retain(|p| p.id != id);
        if state.pipelines.len() == before {
            return;
        }
        debug!("Deleted pipeline: {}", id);
        if state.active.as_deref() == Some(id) {
            state.active = state.pipelines.first().map(|p| p.id.clone());
        }
    }

    /// Append a copy of `agent` with a fresh id and a position-based color.
    ///
    /// Returns the stored copy, or `None` if the pipeline is unknown.
    pub fn add_agent(&self, id: &str, agent: &Agent) -> Option<Agent> {
        let mut state = self.state.write();
        let pipeline = state.pipelines.iter_mut().find(|p| p.id == id)?;

        let seq = self.next_copy.fetch_add(1, Ordering::Relaxed);
        let copy = Agent {
            id: format!("{}-{}", agent.id, seq),
            color: palette_color(pipeline.agents.len()).to_string(),
            ..agent.clone()
        };
        debug!("Adding agent {} to pipeline {}", copy.id, id);
        pipeline.agents.push(copy.clone());
        Some(copy)
    }

    /// Remove the agent at `index`. Out-of-range indexes are ignored.
    pub fn remove_agent(&self, id: &str, index: usize) {
        let mut state = self.state.write();
        if let Some(pipeline) = state.pipelines.iter_mut().find(|p| p.id == id) {
            if index < pipeline.agents.len() {
                let removed = pipeline.agents.remove(index);
                debug!("Removed agent {} from pipeline {}", removed.id, id);
            }
        }
    }

    /// Snapshot of a pipeline.
    pub fn get(&self, id: &str) -> Option<Pipeline> {
        self.state.read().pipelines.iter().find(|p| p.id == id).cloned()
    }

    /// Find a pipeline by id or, failing that, by name.
    pub fn find(&self, id_or_name: &str) -> Option<Pipeline> {
        let state = self.state.read();
        state
            .pipelines
            .iter()
            .find(|p| p.id == id_or_name)
            .or_else(|| state.pipelines.iter().find(|p| p.name == id_or_name))
            .cloned()
    }

    /// Check if a pipeline exists.
    pub fn contains(&self, id: &str) -> bool {
        self.state.read().pipelines.iter().any(|p| p.id == id)
    }

    /// All pipelines in creation order.
    pub fn list(&self) -> Vec<Pipeline> {
        self.state.read().pipelines.clone()
    }

    /// Number of pipelines.
    pub fn len(&self) -> usize {
        self.state.read().pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().pipelines.is_empty()
    }

    /// The active pipeline, if any.
    pub fn active(&self) -> Option<Pipeline> {
        let state = self.state.read();
        let id = state.active.as_ref()?;
        state.pipelines.iter().find(|p| &p.id == id).cloned()
    }

    /// Id of the selected pipeline.
    pub fn active_id(&self) -> Option<PipelineId> {
        self.state.read().active.clone()
    }

    /// Select the active pipeline. Returns `false` if the id is unknown.
    pub fn set_active(&self, id: &str) -> bool {
        let mut state = self.state.write();
        if state.pipelines.iter().any(|p| p.id == id) {
            state.active = Some(id.to_string());
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AGENT_COLORS;

    fn preset(id: &str) -> Agent {
        preset_agents().into_iter().find(|a| a.id == id).unwrap()
    }

    #[test]
    fn test_create_selects_pipeline() {
        let store = PipelineStore::new();
        assert!(store.active().is_none());

        let id = store.create("Chain", vec![preset("researcher")]);
        assert_eq!(store.active_id(), Some(id.clone()));
        assert_eq!(store.get(&id).unwrap().agents.len(), 1);

        let second = store.create("Other", Vec::new());
        assert_ne!(id, second);
        assert_eq!(store.active_id(), Some(second));
    }

    #[test]
    fn test_default_pipeline() {
        let store = PipelineStore::with_default();
        let pipeline = store.get(DEFAULT_PIPELINE_ID).unwrap();
        let ids: Vec<&str> = pipeline.agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["researcher", "analyst", "writer"]);
        assert_eq!(store.active_id().as_deref(), Some(DEFAULT_PIPELINE_ID));
    }

    #[test]
    fn test_partial_update() {
        let store = PipelineStore::new();
        let id = store.create("Before", vec![preset("writer")]);

        store.update(&id, PipelineUpdate::default().name("After"));
        let pipeline = store.get(&id).unwrap();
        assert_eq!(pipeline.name, "After");
        assert_eq!(pipeline.agents.len(), 1);

        store.replace_agents(&id, Vec::new());
        let pipeline = store.get(&id).unwrap();
        assert_eq!(pipeline.name, "After");
        assert!(!pipeline.is_runnable());

        // Unknown ids are ignored
        store.update("missing", PipelineUpdate::default().name("x"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_falls_back_to_first() {
        let store = PipelineStore::new();
        let first = store.create("First", Vec::new());
        let second = store.create("Second", Vec::new());
        assert_eq!(store.active_id(), Some(second.clone()));

        store.delete(&second);
        assert_eq!(store.active_id(), Some(first.clone()));

        store.delete(&first);
        assert!(store.active_id().is_none());
        assert!(store.is_empty());

        store.delete("missing");
    }

    #[test]
    fn test_delete_inactive_keeps_selection() {
        let store = PipelineStore::new();
        let first = store.create("First", Vec::new());
        let second = store.create("Second", Vec::new());

        store.delete(&first);
        assert_eq!(store.active_id(), Some(second));
    }

    #[test]
    fn test_add_agent_copies_are_distinct() {
        let store = PipelineStore::new();
        let id = store.create("Chain", Vec::new());
        let researcher = preset("researcher");

        let a = store.add_agent(&id, &researcher).unwrap();
        let b = store.add_agent(&id, &researcher).unwrap();

        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("researcher-"));
        assert_eq!(a.color, AGENT_COLORS[0]);
        assert_eq!(b.color, AGENT_COLORS[1]);
        assert_eq!(a.system_prompt, researcher.system_prompt);

        assert!(store.add_agent("missing", &researcher).is_none());
    }

    #[test]
    fn test_add_agent_color_wraps() {
        let store = PipelineStore::new();
        let id = store.create("Chain", Vec::new());
        let writer = preset("writer");

        for _ in 0..AGENT_COLORS.len() {
            store.add_agent(&id, &writer);
        }
        let wrapped = store.add_agent(&id, &writer).unwrap();
        assert_eq!(wrapped.color, AGENT_COLORS[0]);
    }

    #[test]
    fn test_remove_agent() {
        let store = PipelineStore::new();
        let id = store.create("Chain", vec![preset("researcher"), preset("analyst")]);

        store.remove_agent(&id, 5);
        assert_eq!(store.get(&id).unwrap().agents.len(), 2);

        store.remove_agent(&id, 0);
        let agents = store.get(&id).unwrap().agents;
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, "analyst");

        store.remove_agent("missing", 0);
    }

    #[test]
    fn test_repeated_agent_allowed() {
        let store = PipelineStore::new();
        let id = store.create("Loop", vec![preset("writer"), preset("writer")]);
        assert_eq!(store.get(&id).unwrap().agents.len(), 2);
    }

    #[test]
    fn test_find_by_name() {
        let store = PipelineStore::with_default();
        let found = store.find("Research → Analyze → Write").unwrap();
        assert_eq!(found.id, DEFAULT_PIPELINE_ID);
        assert!(store.find("nope").is_none());
    }

    #[test]
    fn test_set_active() {
        let store = PipelineStore::with_default();
        let other = store.create("Other", Vec::new());
        assert!(store.set_active(DEFAULT_PIPELINE_ID));
        assert_eq!(store.active().unwrap().id, DEFAULT_PIPELINE_ID);
        assert!(!store.set_active("missing"));
        assert_ne!(store.active_id(), Some(other));
    }
}
