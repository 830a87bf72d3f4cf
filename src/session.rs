//! Session context - the active configuration and its ledger

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ConfigStore, OrchestrationConfig};
use crate::ledger::{ConversationLedger, ConversationRecord};
use crate::router::CapabilityRouter;

/// Unique identifier for a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One logical conversation with the delegation engine
///
/// Holds at most one active configuration and the ledger of hops made under
/// it. Run one orchestration at a time per session; independent sessions can
/// share a single engine.
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Configuration new orchestrations run under
    active: RwLock<Option<Arc<OrchestrationConfig>>>,
    /// Hops recorded since the configuration was last set
    ledger: ConversationLedger,
}

impl Session {
    pub fn new() -> Self {
        let id = SessionId::new();
        info!(session_id = %id, "Creating new session");

        Self {
            id,
            active: RwLock::new(None),
            ledger: ConversationLedger::new(),
        }
    }

    /// Session with a configuration already active
    pub fn with_config(config: impl Into<Arc<OrchestrationConfig>>) -> Self {
        let session = Self::new();
        session.set_active(config);
        session
    }

    /// Replace the active configuration; the ledger is always cleared
    ///
    /// An orchestration already running keeps the configuration it started
    /// with and can still append its hops after the clear. Switch
    /// configurations only between orchestrations.
    pub fn set_active(&self, config: impl Into<Arc<OrchestrationConfig>>) {
        let config = config.into();
        info!(session_id = %self.id, orchestration = %config.name(), "Active orchestration set");

        *self.active.write() = Some(config);
        self.ledger.clear();
    }

    /// Activate a configuration from a store by name
    pub fn activate(&self, store: &ConfigStore, name: &str) -> bool {
        match store.get(name) {
            Some(config) => {
                self.set_active(config);
                true
            }
            None => {
                warn!(session_id = %self.id, orchestration = %name, "Orchestration not found");
                false
            }
        }
    }

    /// Drop the active configuration and its ledger
    pub fn deactivate(&self) {
        *self.active.write() = None;
        self.ledger.clear();
    }

    pub fn active(&self) -> Option<Arc<OrchestrationConfig>> {
        self.active.read().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.read().is_some()
    }

    /// Whether `from` may delegate to `to` under the active configuration
    pub fn can_delegate(&self, from: &str, to: &str) -> bool {
        self.active
            .read()
            .as_ref()
            .is_some_and(|config| config.network().can_delegate(from, to))
    }

    /// Route a task under the active configuration
    pub fn best_profile_for_task(&self, task: &str, required_capabilities: &[String]) -> Option<String> {
        self.active()
            .map(|config| CapabilityRouter::best_profile_for_task(&config, task, required_capabilities))
    }

    pub fn ledger(&self) -> &ConversationLedger {
        &self.ledger
    }

    /// Copy of the hops recorded under the active configuration
    pub fn conversation_history(&self) -> Vec<ConversationRecord> {
        self.ledger.snapshot()
    }

    pub fn clear_conversation_history(&self) {
        self.ledger.clear();
        info!(session_id = %self.id, "Conversation history cleared");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a session
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Session>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(session),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }
}

impl std::ops::Deref for SessionHandle {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::router_coder_writer;

    #[test]
    fn test_session_creation() {
        let session = Session::new();
        assert!(!session.is_active());
        assert!(session.conversation_history().is_empty());
    }

    #[test]
    fn test_can_delegate_requires_active_config() {
        let session = Session::new();
        assert!(!session.can_delegate("Router", "Coder"));

        session.set_active(router_coder_writer(3, true));
        assert!(session.can_delegate("Router", "Coder"));
        assert!(!session.can_delegate("Router", "Writer"));
        assert!(session.can_delegate("Coder", "Writer"));
        assert!(!session.can_delegate("Writer", "Router"));
    }

    #[test]
    fn test_set_active_clears_ledger() {
        let session = Session::with_config(router_coder_writer(3, true));
        session
            .ledger()
            .append(ConversationRecord::new("Router", "Coder", "q", "a", 1));
        assert_eq!(session.conversation_history().len(), 1);

        session.set_active(router_coder_writer(3, true));
        assert!(session.conversation_history().is_empty());
    }

    #[test]
    fn test_activate_by_name() {
        let mut store = ConfigStore::new();
        store.insert(router_coder_writer(3, true));
        let session = Session::new();

        assert!(!session.activate(&store, "Missing"));
        assert!(!session.is_active());

        assert!(session.activate(&store, "Scenario"));
        assert_eq!(session.active().unwrap().name(), "Scenario");
    }

    #[test]
    fn test_deactivate() {
        let session = Session::with_config(router_coder_writer(3, true));
        session.deactivate();

        assert!(!session.is_active());
        assert!(!session.can_delegate("Router", "Coder"));
    }

    #[test]
    fn test_best_profile_for_task() {
        let session = Session::new();
        assert_eq!(session.best_profile_for_task("anything", &[]), None);

        session.set_active(router_coder_writer(3, true));
        assert_eq!(
            session.best_profile_for_task("anything", &[]),
            Some("Router".to_string())
        );
        assert_eq!(
            session.best_profile_for_task("code it", &["code".to_string()]),
            Some("Coder".to_string())
        );
    }

    #[test]
    fn test_handle_derefs_to_session() {
        let handle = SessionHandle::new(Session::new());
        assert_eq!(handle.id(), handle.id);
        assert!(!handle.is_active());
    }
}
