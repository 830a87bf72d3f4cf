//! # Parley
//!
//! Bounded multi-agent delegation - an orchestrator hands work to permitted
//! specialists.
//!
//! An orchestration configuration names an orchestrator profile and a
//! network of specialist profiles, each with a role, capabilities, a backing
//! engine and the list of profiles it may delegate to. A user request goes to
//! the orchestrator first; if its reply starts with a delegation marker the
//! request is handed down the network, and the leaf result is folded back
//! into one final answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         DELEGATION ENGINE                        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Prompt Build │  │ Marker Parse │  │  Synthesis   │            │
//! │  └──────────────┘  └──────────────┘  └──────────────┘            │
//! └───────────┬───────────────────┬──────────────────────┬───────────┘
//!             │                   │                      │
//!             ▼                   ▼                      ▼
//!     ┌──────────────┐    ┌──────────────┐       ┌──────────────┐
//!     │   Session    │    │AgentProvider │       │ResponseStream│
//!     │ config+ledger│    │ agents/profs │       │ chars / iter │
//!     └──────┬───────┘    └──────┬───────┘       └──────────────┘
//!            │                   │
//!            ▼                   ▼
//!   Orchestrator ──[DELEGATE: Coder]──▶ Coder ──[DELEGATE: Writer]──▶ Writer
//!   (depth 0)                          (depth 1)                     (depth 2)
//! ```
//!
//! ## Key Concepts
//!
//! - **Network**: Who may delegate to whom, and which engine backs each profile
//! - **Hop**: One permission-checked, depth-bounded handoff, recorded in the ledger
//! - **Session**: The active configuration and its conversation ledger
//! - **Synthesis**: The orchestrator's second pass that turns a delegated
//!   result into the final answer

pub mod agent;
pub mod channel;
pub mod config;
pub mod error;
pub mod ledger;
pub mod marker;
pub mod message;
pub mod network;
pub mod orchestrator;
pub mod prompt;
pub mod router;
pub mod session;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentBindings, AgentProfile, AgentProvider, StoreBinding, StoreRef};
pub use channel::{BlockingChars, ResponseStream};
pub use config::{
    AgentNetworkEntry, Communication, ConfigStore, EngineSettings, OrchestrationConfig,
    OrchestrationSpec,
};
pub use error::{AgentError, ParleyError, Result};
pub use ledger::{ConversationLedger, ConversationRecord};
pub use marker::{Directive, ReplyEnvelope};
pub use message::{AgentMessage, MessageKind};
pub use network::AgentNetwork;
pub use orchestrator::DelegationEngine;
pub use router::CapabilityRouter;
pub use session::{Session, SessionHandle, SessionId};
