//! Messages exchanged between profiles

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Context key holding the request the user originally made
pub const CONTEXT_ORIGINAL_REQUEST: &str = "original_request";

/// Context key holding a short summary of the delegating reply
pub const CONTEXT_SUMMARY: &str = "summary";

/// Characters of the delegating reply kept as the summary
pub const SUMMARY_CHARS: usize = 200;

/// Kind of inter-agent message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Request,
    Response,
    Consultation,
}

/// A message handed from one profile to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Sending profile
    pub from_profile: String,
    /// Receiving profile
    pub to_profile: String,
    /// Task text
    pub content: String,
    /// Message kind, `message_type` on the wire
    #[serde(default, rename = "message_type")]
    pub kind: MessageKind,
    /// Free-form context such as the original request and a summary
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Hops from the top-level orchestrator call
    #[serde(default)]
    pub depth: u32,
}

impl AgentMessage {
    /// A depth-0 request with empty context
    pub fn request(
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            from_profile: from.into(),
            to_profile: to.into(),
            content: content.into(),
            kind: MessageKind::Request,
            context: Map::new(),
            depth: 0,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Context carried by a delegation hop: the original request and the
    /// first [`SUMMARY_CHARS`] characters of the reply that asked for it
    pub fn with_delegation_context(self, original_request: &str, delegating_reply: &str) -> Self {
        self.with_context(CONTEXT_ORIGINAL_REQUEST, original_request)
            .with_context(CONTEXT_SUMMARY, truncate_chars(delegating_reply, SUMMARY_CHARS))
    }

    /// Summary entry of the context as text, empty if absent
    pub fn summary(&self) -> String {
        match self.context.get(CONTEXT_SUMMARY) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
