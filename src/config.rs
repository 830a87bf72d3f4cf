//! Orchestration configuration records and the store that loads them
//!
//! # Record Format
//!
//! ```yaml
//! orchestrationConfig:
//!   name: Research Team
//!   orchestrator_profile: Router
//!   orchestrator_engine: OpenAIAgent
//!   description: Routes coding work to a specialist
//!   agent_network:
//!     - profile: Coder
//!       role: implementation specialist
//!       capabilities: [code, debugging]
//!       can_delegate_to: [Writer]
//!       engine: OpenAIAgent
//!       knowledge: code_docs
//!   orchestration_rules: []
//!   communication:
//!     max_delegation_depth: 3
//!     include_context: true
//! ```

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::StoreRef;
use crate::network::{AgentNetwork, DEFAULT_ROLE};

/// Top-level key wrapping every orchestration record
pub const CONFIG_KEY: &str = "orchestrationConfig";

/// Engine used when neither a call nor the network names one
pub const DEFAULT_ENGINE: &str = "AzureOpenAIAgent";

/// Directory scanned for records when nothing else is configured
pub const DEFAULT_ORCHESTRATIONS_DIR: &str = "nexus_orchestrations";

pub const ORCHESTRATIONS_DIR_VAR: &str = "PARLEY_ORCHESTRATIONS_DIR";
pub const DEFAULT_ENGINE_VAR: &str = "PARLEY_DEFAULT_ENGINE";

fn default_name() -> String {
    "Unnamed".to_string()
}

fn default_engine() -> String {
    DEFAULT_ENGINE.to_string()
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

fn default_max_depth() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// One agent in a declared network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentNetworkEntry {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub can_delegate_to: Vec<String>,
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Action names overriding the profile's defaults
    #[serde(default)]
    pub actions: Option<Vec<String>>,
    #[serde(default)]
    pub knowledge: Option<StoreRef>,
    #[serde(default)]
    pub memory: Option<StoreRef>,
}

impl AgentNetworkEntry {
    /// Profile id, ignoring blank values
    pub fn profile_id(&self) -> Option<&str> {
        self.profile.as_deref().filter(|p| !p.is_empty())
    }
}

impl Default for AgentNetworkEntry {
    fn default() -> Self {
        Self {
            profile: None,
            role: default_role(),
            capabilities: Vec::new(),
            can_delegate_to: Vec::new(),
            engine: default_engine(),
            actions: None,
            knowledge: None,
            memory: None,
        }
    }
}

/// Hop limits and prompt shaping for delegation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Communication {
    #[serde(default = "default_max_depth")]
    pub max_delegation_depth: u32,
    /// Prefix delegate prompts with who is asking and why
    #[serde(default = "default_true")]
    pub include_context: bool,
}

impl Default for Communication {
    fn default() -> Self {
        Self {
            max_delegation_depth: default_max_depth(),
            include_context: true,
        }
    }
}

/// Body of an orchestration record as written on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationSpec {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub orchestrator_profile: String,
    #[serde(default = "default_engine")]
    pub orchestrator_engine: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent_network: Vec<AgentNetworkEntry>,
    /// Carried along, never interpreted
    #[serde(default)]
    pub orchestration_rules: Vec<serde_yaml::Value>,
    #[serde(default)]
    pub communication: Communication,
}

impl Default for OrchestrationSpec {
    fn default() -> Self {
        Self {
            name: default_name(),
            orchestrator_profile: String::new(),
            orchestrator_engine: default_engine(),
            description: String::new(),
            agent_network: Vec::new(),
            orchestration_rules: Vec::new(),
            communication: Communication::default(),
        }
    }
}

/// An immutable orchestration configuration with its derived indices
#[derive(Debug, Clone)]
pub struct OrchestrationConfig {
    spec: OrchestrationSpec,
    network: AgentNetwork,
}

impl OrchestrationConfig {
    pub fn new(spec: OrchestrationSpec) -> Self {
        let network = AgentNetwork::from_entries(&spec.agent_network);
        Self { spec, network }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn orchestrator_profile(&self) -> &str {
        &self.spec.orchestrator_profile
    }

    pub fn orchestrator_engine(&self) -> &str {
        &self.spec.orchestrator_engine
    }

    pub fn description(&self) -> &str {
        &self.spec.description
    }

    pub fn agent_network(&self) -> &[AgentNetworkEntry] {
        &self.spec.agent_network
    }

    pub fn orchestration_rules(&self) -> &[serde_yaml::Value] {
        &self.spec.orchestration_rules
    }

    pub fn communication(&self) -> &Communication {
        &self.spec.communication
    }

    /// Derived lookup indices
    pub fn network(&self) -> &AgentNetwork {
        &self.network
    }

    /// The network entry that defines a profile (the last declaration wins)
    pub fn entry(&self, profile: &str) -> Option<&AgentNetworkEntry> {
        self.spec
            .agent_network
            .iter()
            .rev()
            .find(|e| e.profile_id() == Some(profile))
    }

    pub fn spec(&self) -> &OrchestrationSpec {
        &self.spec
    }
}

impl From<OrchestrationSpec> for OrchestrationConfig {
    fn from(spec: OrchestrationSpec) -> Self {
        Self::new(spec)
    }
}

/// Process-level settings for locating records and picking engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub orchestrations_dir: PathBuf,
    pub default_engine: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            orchestrations_dir: PathBuf::from(DEFAULT_ORCHESTRATIONS_DIR),
            default_engine: default_engine(),
        }
    }
}

impl EngineSettings {
    /// Defaults overridden by `PARLEY_ORCHESTRATIONS_DIR` and `PARLEY_DEFAULT_ENGINE`
    ///
    /// Unset or empty variables leave the default in place.
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        let mut settings = Self::default();

        if let Some(dir) = var(ORCHESTRATIONS_DIR_VAR) {
            settings.orchestrations_dir = PathBuf::from(dir);
        }
        if let Some(engine) = var(DEFAULT_ENGINE_VAR) {
            settings.default_engine = engine;
        }

        debug!(
            dir = %settings.orchestrations_dir.display(),
            engine = %settings.default_engine,
            "Engine settings resolved"
        );
        settings
    }
}

/// Loaded orchestration configurations
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    configs: Vec<Arc<OrchestrationConfig>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.yaml`/`.yml` record in a directory
    ///
    /// A missing directory is created and yields an empty store. Records that
    /// cannot be read or parsed are skipped with a warning.
    pub fn load<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let mut store = Self::new();

        if !dir.exists() {
            match std::fs::create_dir_all(dir) {
                Ok(()) => info!(dir = %dir.display(), "Created orchestrations directory"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to create orchestrations directory"),
            }
            return store;
        }

        let mut paths: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
                })
                .collect(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read orchestrations directory");
                return store;
            }
        };
        paths.sort();

        for path in paths {
            match Self::parse_file(&path) {
                Ok(Some(config)) => store.insert(config),
                Ok(None) => {}
                Err(e) => warn!(file = %path.display(), error = %format!("{e:#}"), "Error loading orchestration"),
            }
        }

        info!(count = store.len(), "Loaded orchestration configurations");
        store
    }

    /// Load the directory named by the settings
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::load(&settings.orchestrations_dir)
    }

    /// Build a store from in-memory records, labelled for diagnostics
    pub fn from_sources<I, L, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = (L, S)>,
        L: Display,
        S: AsRef<str>,
    {
        let mut store = Self::new();

        for (label, yaml) in sources {
            match Self::parse_record(yaml.as_ref()) {
                Ok(Some(config)) => store.insert(config),
                Ok(None) => {}
                Err(e) => warn!(source = %label, error = %format!("{e:#}"), "Error loading orchestration"),
            }
        }

        store
    }

    /// Parse one record
    ///
    /// Returns `Ok(None)` when the record lacks the [`CONFIG_KEY`] wrapper.
    pub fn parse_record(yaml: &str) -> Result<Option<OrchestrationConfig>> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(yaml).context("Failed to parse orchestration YAML")?;

        let Some(body) = document.get(CONFIG_KEY) else {
            warn!("Orchestration record missing '{}' key", CONFIG_KEY);
            return Ok(None);
        };

        let spec: OrchestrationSpec = serde_yaml::from_value(body.clone())
            .context("Invalid orchestration record")?;

        debug!(name = %spec.name, profiles = spec.agent_network.len(), "Parsed orchestration record");
        Ok(Some(OrchestrationConfig::new(spec)))
    }

    /// Read and parse one record file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Option<OrchestrationConfig>> {
        let yaml = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read orchestration file: {:?}", path.as_ref()))?;

        Self::parse_record(&yaml)
    }

    pub fn insert(&mut self, config: OrchestrationConfig) {
        self.configs.push(Arc::new(config));
    }

    /// Names of all loaded configurations, in load order
    pub fn names(&self) -> Vec<&str> {
        self.configs.iter().map(|c| c.name()).collect()
    }

    /// First configuration with the given name
    pub fn get(&self, name: &str) -> Option<Arc<OrchestrationConfig>> {
        self.configs.iter().find(|c| c.name() == name).cloned()
    }

    pub fn configs(&self) -> &[Arc<OrchestrationConfig>] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
