//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Pipeline has no agents: {0}")]
    EmptyPipeline(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Invalid agent: {0}")]
    InvalidAgent(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Completion provider failed: {0}")]
    Provider(String),

    /// Carries the 1-based step number
    #[error("Step {0} timed out")]
    Timeout(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Run task failed: {0}")]
    Join(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the error was raised before any run was created.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::PipelineNotFound(_) | Self::EmptyPipeline(_))
    }
}
