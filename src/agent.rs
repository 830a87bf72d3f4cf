//! Agent contract - the per-hop chat backend and the registry that hands it out

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AgentNetworkEntry;
use crate::error::AgentError;

/// Reference to a knowledge or memory store as written in configuration
///
/// Accepts either a single name or a list, in which case the first entry is
/// the one bound to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreRef {
    One(String),
    Many(Vec<String>),
}

impl StoreRef {
    /// The store name that gets bound, if any
    pub fn primary(&self) -> Option<&str> {
        let name = match self {
            StoreRef::One(name) => Some(name.as_str()),
            StoreRef::Many(names) => names.first().map(String::as_str),
        };
        name.filter(|n| !n.is_empty())
    }
}

impl From<&str> for StoreRef {
    fn from(name: &str) -> Self {
        StoreRef::One(name.to_string())
    }
}

/// A resolved knowledge or memory channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBinding {
    Store(String),
    /// Channel supported by the agent but nothing configured for it
    None,
}

impl std::fmt::Display for StoreBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBinding::Store(name) => f.write_str(name),
            StoreBinding::None => f.write_str("None"),
        }
    }
}

/// Profile definition resolved from the agent provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Default action names
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub knowledge: Option<StoreRef>,
    #[serde(default)]
    pub memory: Option<StoreRef>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_knowledge(mut self, store: impl Into<StoreRef>) -> Self {
        self.knowledge = Some(store.into());
        self
    }

    pub fn with_memory(mut self, store: impl Into<StoreRef>) -> Self {
        self.memory = Some(store.into());
        self
    }
}

/// Capability channels handed to [`Agent::configure`]
///
/// `None` in a field means the agent does not support that channel and it
/// was never consulted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentBindings {
    pub actions: Option<Vec<String>>,
    pub knowledge: Option<StoreBinding>,
    pub memory: Option<StoreBinding>,
}

impl AgentBindings {
    /// Resolve every channel the agent supports
    ///
    /// Each channel is resolved on its own: a non-empty override on the
    /// network entry first, then a non-empty default on the profile, then
    /// the explicit none value.
    pub fn resolve(
        agent: &dyn Agent,
        entry: Option<&AgentNetworkEntry>,
        profile: &AgentProfile,
    ) -> Self {
        let actions = agent.supports_actions().then(|| {
            entry
                .and_then(|e| e.actions.as_ref())
                .filter(|a| !a.is_empty())
                .or_else(|| Some(&profile.actions).filter(|a| !a.is_empty()))
                .cloned()
                .unwrap_or_default()
        });

        let knowledge = agent.supports_knowledge().then(|| {
            resolve_store(
                entry.and_then(|e| e.knowledge.as_ref()),
                profile.knowledge.as_ref(),
            )
        });

        let memory = agent.supports_memory().then(|| {
            resolve_store(
                entry.and_then(|e| e.memory.as_ref()),
                profile.memory.as_ref(),
            )
        });

        Self {
            actions,
            knowledge,
            memory,
        }
    }
}

fn resolve_store(entry: Option<&StoreRef>, profile: Option<&StoreRef>) -> StoreBinding {
    entry
        .and_then(StoreRef::primary)
        .or_else(|| profile.and_then(StoreRef::primary))
        .map(|name| StoreBinding::Store(name.to_string()))
        .unwrap_or(StoreBinding::None)
}

/// A chat/completion backend bound to one profile per hop
pub trait Agent: Send {
    /// Engine id this agent was created for
    fn name(&self) -> &str;

    fn supports_actions(&self) -> bool {
        false
    }

    fn supports_knowledge(&self) -> bool {
        false
    }

    fn supports_memory(&self) -> bool {
        false
    }

    /// Whether the agent can answer with a JSON [`ReplyEnvelope`](crate::marker::ReplyEnvelope)
    fn supports_structured_replies(&self) -> bool {
        false
    }

    /// Apply a profile and its resolved channels
    fn configure(&mut self, profile: AgentProfile, bindings: AgentBindings)
        -> Result<(), AgentError>;

    /// Drop any conversation state left over from an earlier call
    fn reset_transient_state(&mut self);

    /// Start a reply to `prompt`
    ///
    /// The stream is single-use and finite; the full reply is the
    /// concatenation of every fragment.
    fn response_stream(&mut self, prompt: &str) -> BoxStream<'_, Result<String, AgentError>>;
}

/// Registry resolving engine ids, profiles and action names
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Obtain an agent instance for an engine id
    async fn agent(&self, engine: &str) -> Result<Box<dyn Agent>, AgentError>;

    /// Look up a profile by name
    async fn profile(&self, name: &str) -> Result<AgentProfile, AgentError>;

    /// Filter action names down to the ones the provider knows
    fn resolve_actions(&self, names: &[String]) -> Vec<String> {
        names.to_vec()
    }
}

/// Drain an agent's reply stream into one string
pub async fn collect_response(agent: &mut dyn Agent, prompt: &str) -> Result<String, AgentError> {
    let mut stream = agent.response_stream(prompt);
    let mut full = String::new();

    while let Some(chunk) = stream.next().await {
        full.push_str(&chunk?);
    }

    debug!(chars = full.chars().count(), "Collected agent response");
    Ok(full)
}
