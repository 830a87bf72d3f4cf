//! Scripted agents and a provider for exercising the engine in tests

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;

use crate::agent::{Agent, AgentBindings, AgentProfile, AgentProvider};
use crate::config::{AgentNetworkEntry, Communication, OrchestrationConfig, OrchestrationSpec};
use crate::error::AgentError;

/// Install a test subscriber once; output shows with `--nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Which optional channels a fake engine claims to support
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub actions: bool,
    pub knowledge: bool,
    pub memory: bool,
    pub structured: bool,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            actions: true,
            knowledge: true,
            memory: true,
            structured: false,
        }
    }
}

enum Script {
    Reply(Vec<String>),
    Fail(String),
    Panic,
}

#[derive(Default)]
struct Recorder {
    scripts: HashMap<String, VecDeque<Script>>,
    prompts: Vec<(String, String)>,
    bindings: Vec<(String, AgentBindings)>,
    resets: usize,
}

/// Provider whose agents answer from per-profile scripts
///
/// Unscripted calls answer `"{profile} done"`. Clones share scripts and
/// recordings.
#[derive(Clone, Default)]
pub struct FakeProvider {
    engines: HashMap<String, Capabilities>,
    profiles: HashMap<String, AgentProfile>,
    known_actions: Option<Vec<String>>,
    recorder: Arc<Mutex<Recorder>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: &str, capabilities: Capabilities) -> Self {
        self.engines.insert(engine.to_string(), capabilities);
        self
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profiles.insert(profile.name.clone(), profile);
        self
    }

    pub fn with_known_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    /// Queue a one-fragment reply for the next call made as `profile`
    pub fn script(self, profile: &str, reply: &str) -> Self {
        self.push(profile, Script::Reply(vec![reply.to_string()]))
    }

    pub fn script_chunks<I, S>(self, profile: &str, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(profile, Script::Reply(chunks.into_iter().map(Into::into).collect()))
    }

    /// Queue an upstream failure for the next call made as `profile`
    pub fn script_failure(self, profile: &str, error: &str) -> Self {
        self.push(profile, Script::Fail(error.to_string()))
    }

    /// Make the next call made as `profile` panic inside the agent
    pub fn script_panic(self, profile: &str) -> Self {
        self.push(profile, Script::Panic)
    }

    fn push(self, profile: &str, script: Script) -> Self {
        self.recorder
            .lock()
            .scripts
            .entry(profile.to_string())
            .or_default()
            .push_back(script);
        self
    }

    /// Prompts sent to agents configured as `profile`, in call order
    pub fn prompts_for(&self, profile: &str) -> Vec<String> {
        self.recorder
            .lock()
            .prompts
            .iter()
            .filter(|(p, _)| p == profile)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn bindings_for(&self, profile: &str) -> Vec<AgentBindings> {
        self.recorder
            .lock()
            .bindings
            .iter()
            .filter(|(p, _)| p == profile)
            .map(|(_, b)| b.clone())
            .collect()
    }

    pub fn resets(&self) -> usize {
        self.recorder.lock().resets
    }
}

#[async_trait]
impl AgentProvider for FakeProvider {
    async fn agent(&self, engine: &str) -> Result<Box<dyn Agent>, AgentError> {
        let capabilities = self
            .engines
            .get(engine)
            .copied()
            .ok_or_else(|| AgentError::EngineNotFound(engine.to_string()))?;

        Ok(Box::new(FakeAgent {
            engine: engine.to_string(),
            capabilities,
            profile: None,
            recorder: Arc::clone(&self.recorder),
        }))
    }

    async fn profile(&self, name: &str) -> Result<AgentProfile, AgentError> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::ProfileNotFound(name.to_string()))
    }

    fn resolve_actions(&self, names: &[String]) -> Vec<String> {
        match &self.known_actions {
            Some(known) => names.iter().filter(|n| known.contains(*n)).cloned().collect(),
            None => names.to_vec(),
        }
    }
}

struct FakeAgent {
    engine: String,
    capabilities: Capabilities,
    profile: Option<String>,
    recorder: Arc<Mutex<Recorder>>,
}

impl Agent for FakeAgent {
    fn name(&self) -> &str {
        &self.engine
    }

    fn supports_actions(&self) -> bool {
        self.capabilities.actions
    }

    fn supports_knowledge(&self) -> bool {
        self.capabilities.knowledge
    }

    fn supports_memory(&self) -> bool {
        self.capabilities.memory
    }

    fn supports_structured_replies(&self) -> bool {
        self.capabilities.structured
    }

    fn configure(&mut self, profile: AgentProfile, bindings: AgentBindings) -> Result<(), AgentError> {
        self.recorder.lock().bindings.push((profile.name.clone(), bindings));
        self.profile = Some(profile.name);
        Ok(())
    }

    fn reset_transient_state(&mut self) {
        self.recorder.lock().resets += 1;
    }

    fn response_stream(&mut self, prompt: &str) -> BoxStream<'_, Result<String, AgentError>> {
        let profile = self.profile.clone().unwrap_or_else(|| self.engine.clone());

        let script = {
            let mut recorder = self.recorder.lock();
            recorder.prompts.push((profile.clone(), prompt.to_string()));
            recorder
                .scripts
                .get_mut(&profile)
                .and_then(VecDeque::pop_front)
        };

        let items: Vec<Result<String, AgentError>> = match script {
            Some(Script::Reply(chunks)) => chunks.into_iter().map(Ok).collect(),
            Some(Script::Fail(error)) => vec![Err(AgentError::Upstream(error))],
            Some(Script::Panic) => panic!("scripted agent panic for {profile}"),
            None => vec![Ok(format!("{profile} done"))],
        };

        stream::iter(items).boxed()
    }
}

/// Provider with a plain `chat` engine and Router, Coder and Writer profiles
pub fn standard_provider() -> FakeProvider {
    FakeProvider::new()
        .with_engine("chat", Capabilities::none())
        .with_profile(AgentProfile::new("Router"))
        .with_profile(AgentProfile::new("Coder"))
        .with_profile(AgentProfile::new("Writer"))
}

/// Router may delegate to Coder only; Coder may delegate to Writer
pub fn router_coder_writer(max_delegation_depth: u32, include_context: bool) -> OrchestrationConfig {
    let entry = |profile: &str, role: &str, capability: &str, delegates: &[&str]| AgentNetworkEntry {
        profile: Some(profile.to_string()),
        role: role.to_string(),
        capabilities: vec![capability.to_string()],
        can_delegate_to: delegates.iter().map(|s| s.to_string()).collect(),
        engine: "chat".to_string(),
        ..Default::default()
    };

    OrchestrationConfig::new(OrchestrationSpec {
        name: "Scenario".into(),
        orchestrator_profile: "Router".into(),
        orchestrator_engine: "chat".into(),
        description: "Router, Coder and Writer".into(),
        agent_network: vec![
            entry("Router", "orchestrator", "planning", &["Coder"]),
            entry("Coder", "implementation specialist", "code", &["Writer"]),
            entry("Writer", "technical writer", "prose", &[]),
        ],
        orchestration_rules: Vec::new(),
        communication: Communication {
            max_delegation_depth,
            include_context,
        },
    })
}
