//! Append-only audit trail of delegation hops

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One completed delegation hop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Delegating profile
    pub from: String,
    /// Profile that handled the hop
    pub to: String,
    /// Task text sent to the delegate, without the context preamble
    pub request: String,
    /// Raw reply of the delegate
    pub response: String,
    /// Depth of the hop
    pub depth: u32,
    /// When the reply was recorded
    pub recorded_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        request: impl Into<String>,
        response: impl Into<String>,
        depth: u32,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            request: request.into(),
            response: response.into(),
            depth,
            recorded_at: Utc::now(),
        }
    }
}

/// In-memory ledger of hops for the active configuration
#[derive(Debug, Default)]
pub struct ConversationLedger {
    records: RwLock<Vec<ConversationRecord>>,
}

impl ConversationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: ConversationRecord) {
        self.records.write().push(record);
    }

    /// Copy of the records in append order
    pub fn snapshot(&self) -> Vec<ConversationRecord> {
        self.records.read().clone()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
