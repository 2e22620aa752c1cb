//! Error Types for Multi-Agent Coordination

use thiserror::Error;

/// Result type alias for coordination operations
pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Coordinator error types
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// A requested agent id is not registered
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// The resolved agent set is empty
    #[error("No agents available")]
    NoAgentsAvailable,

    /// Strategy-level failure
    #[error("Coordination failed: {0}")]
    CoordinationFailed(String),

    /// A participant's run failed; aborts the whole strategy
    #[error(transparent)]
    Agent(#[from] agent_core::AgentError),
}
