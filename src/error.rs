//! Parley error types

use thiserror::Error;

/// Errors surfaced to callers of the delegation engine
///
/// Permission denials, depth limits, marker parse failures and upstream
/// failures are not errors here: they travel as ordinary reply text.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// No orchestration configuration is active in the session
    #[error("No active orchestration configuration set")]
    NoActiveConfiguration,

    /// The agent, profile or engine for a hop could not be resolved
    #[error("Failed to initialize agent for profile {profile}: {source}")]
    AgentInitialization {
        profile: String,
        #[source]
        source: AgentError,
    },

    /// The streaming bridge could not start or lost its worker
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Errors reported by [`Agent`](crate::agent::Agent) and
/// [`AgentProvider`](crate::agent::AgentProvider) implementations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// No agent implementation is registered under this engine id
    #[error("Agent '{0}' not found.")]
    EngineNotFound(String),

    /// No profile is registered under this name
    #[error("Profile '{0}' not found.")]
    ProfileNotFound(String),

    /// The agent rejected its profile or bindings
    #[error("Configure failed: {0}")]
    Configure(String),

    /// The backing model call failed
    #[error("Upstream call failed: {0}")]
    Upstream(String),
}

pub type Result<T, E = ParleyError> = std::result::Result<T, E>;
