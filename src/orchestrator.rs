//! Delegation engine - routes a request through the orchestrator and its specialists

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::agent::{collect_response, Agent, AgentBindings, AgentProvider};
use crate::config::{EngineSettings, OrchestrationConfig};
use crate::error::{AgentError, ParleyError, Result};
use crate::ledger::ConversationRecord;
use crate::marker::{self, Directive, MARKER_PARSE_ERROR};
use crate::message::AgentMessage;
use crate::prompt;
use crate::session::Session;

/// Reply returned when a hop would exceed the configured depth
pub const MAX_DEPTH_REPLY: &str = "Maximum delegation depth reached. Unable to process request.";

/// Profile named in the synthesis prompt when the marker could not be parsed
const UNKNOWN_DELEGATE: &str = "Unknown";

/// Reply returned when the network does not allow a hop
pub fn permission_denied_reply(from: &str, to: &str) -> String {
    format!("Delegation from {from} to {to} not allowed by configuration.")
}

/// Outcome of a single hop
struct Hop {
    reply: String,
    /// Whether the replying agent speaks the JSON envelope
    structured: bool,
}

/// The delegation engine
///
/// Stateless apart from its collaborators: the active configuration and the
/// ledger live in the [`Session`] passed to every call.
pub struct DelegationEngine {
    provider: Arc<dyn AgentProvider>,
    settings: EngineSettings,
}

impl DelegationEngine {
    pub fn new(provider: Arc<dyn AgentProvider>) -> Self {
        Self::with_settings(provider, EngineSettings::default())
    }

    pub fn with_settings(provider: Arc<dyn AgentProvider>, settings: EngineSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Obtain and configure the agent for a profile
    ///
    /// The engine is `engine_override`, else the engine the network binds to
    /// the profile, else the configured default engine.
    #[instrument(skip(self, config), fields(orchestration = %config.name()))]
    pub async fn initialize_agent(
        &self,
        config: &OrchestrationConfig,
        profile: &str,
        engine_override: Option<&str>,
    ) -> Result<Box<dyn Agent>> {
        let engine = engine_override
            .or_else(|| config.network().engine(profile))
            .unwrap_or(self.settings.default_engine.as_str());

        let init = async {
            let mut agent = self.provider.agent(engine).await?;
            let agent_profile = self.provider.profile(profile).await?;

            let mut bindings =
                AgentBindings::resolve(agent.as_ref(), config.entry(profile), &agent_profile);
            if let Some(actions) = bindings.actions.take() {
                bindings.actions = Some(self.provider.resolve_actions(&actions));
            }

            agent.configure(agent_profile, bindings)?;
            agent.reset_transient_state();
            Ok::<_, AgentError>(agent)
        };

        match init.await {
            Ok(agent) => {
                debug!(profile = %profile, engine = %engine, "Agent initialized");
                Ok(agent)
            }
            Err(source) => {
                error!(profile = %profile, engine = %engine, error = %source, "Error initializing agent with profile");
                Err(ParleyError::AgentInitialization {
                    profile: profile.to_string(),
                    source,
                })
            }
        }
    }

    /// Handle a user request under the session's active configuration
    pub async fn orchestrate(&self, session: &Session, user_input: &str) -> Result<String> {
        self.run(session, user_input, None).await
    }

    /// Like [`orchestrate`](Self::orchestrate), also pushing the final
    /// answer onto `sink` as it is produced
    pub async fn orchestrate_with_sink(
        &self,
        session: &Session,
        user_input: &str,
        sink: &mpsc::UnboundedSender<String>,
    ) -> Result<String> {
        self.run(session, user_input, Some(sink)).await
    }

    #[instrument(skip_all, fields(session_id = %session.id))]
    async fn run(
        &self,
        session: &Session,
        user_input: &str,
        sink: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<String> {
        let config = session.active().ok_or(ParleyError::NoActiveConfiguration)?;
        let orchestrator_profile = config.orchestrator_profile();

        let mut orchestrator = self
            .initialize_agent(&config, orchestrator_profile, Some(config.orchestrator_engine()))
            .await?;
        let structured = orchestrator.supports_structured_replies();

        info!(orchestration = %config.name(), profile = %orchestrator_profile, "Routing request");
        let routing_prompt = prompt::orchestration_prompt(&config, user_input, structured);
        let initial = respond(orchestrator.as_mut(), &routing_prompt, "orchestration").await;

        let (delegate, delegated) = match marker::interpret(&initial, structured) {
            Directive::Answer(answer) => {
                info!(profile = %orchestrator_profile, "Orchestrator answered directly");
                if let Some(sink) = sink {
                    let _ = sink.send(answer.clone());
                }
                return Ok(answer);
            }
            Directive::Malformed => {
                warn!(profile = %orchestrator_profile, "Orchestrator emitted a malformed delegation marker");
                (UNKNOWN_DELEGATE.to_string(), MARKER_PARSE_ERROR.to_string())
            }
            Directive::Delegate { profile, task } => {
                let message = AgentMessage::request(
                    orchestrator_profile,
                    profile.as_str(),
                    task.unwrap_or_else(|| user_input.to_string()),
                )
                .with_depth(1)
                .with_delegation_context(user_input, &initial);

                let result = self.chain(session, &config, user_input, message).await?;
                (profile, result)
            }
        };

        info!(profile = %orchestrator_profile, delegate = %delegate, "Synthesizing delegated result");
        let synthesis = prompt::synthesis_prompt(user_input, &initial, &delegate, &delegated);

        if structured {
            let reply = respond(orchestrator.as_mut(), &synthesis, "orchestration").await;
            let answer = match marker::interpret(&reply, true) {
                Directive::Answer(answer) => answer,
                _ => reply,
            };
            if let Some(sink) = sink {
                let _ = sink.send(answer.clone());
            }
            return Ok(answer);
        }

        Ok(respond_streaming(orchestrator.as_mut(), &synthesis, sink).await)
    }

    /// Run one delegation hop under the session's active configuration
    pub async fn delegate(&self, session: &Session, message: AgentMessage) -> Result<String> {
        let config = session.active().ok_or(ParleyError::NoActiveConfiguration)?;
        Ok(self.hop(session, &config, &message).await?.reply)
    }

    /// Run a hop and keep following delegations until a leaf reply
    ///
    /// Each further hop goes from the current delegate to the profile it
    /// names, one level deeper. Only the leaf reply is returned; no
    /// intermediate hop is synthesized.
    pub async fn follow_delegation(
        &self,
        session: &Session,
        original_request: &str,
        message: AgentMessage,
    ) -> Result<String> {
        let config = session.active().ok_or(ParleyError::NoActiveConfiguration)?;
        self.chain(session, &config, original_request, message).await
    }

    async fn chain(
        &self,
        session: &Session,
        config: &OrchestrationConfig,
        original_request: &str,
        mut message: AgentMessage,
    ) -> Result<String> {
        loop {
            let hop = self.hop(session, config, &message).await?;

            match marker::interpret(&hop.reply, hop.structured) {
                Directive::Answer(answer) => return Ok(answer),
                Directive::Malformed => {
                    warn!(profile = %message.to_profile, "Delegate emitted a malformed delegation marker");
                    return Ok(MARKER_PARSE_ERROR.to_string());
                }
                Directive::Delegate { profile, task } => {
                    debug!(
                        from = %message.to_profile,
                        to = %profile,
                        depth = message.depth + 1,
                        "Delegate requested further delegation"
                    );
                    message = AgentMessage::request(
                        message.to_profile.as_str(),
                        profile,
                        task.unwrap_or_else(|| original_request.to_string()),
                    )
                    .with_depth(message.depth + 1)
                    .with_delegation_context(original_request, &hop.reply);
                }
            }
        }
    }

    #[instrument(
        skip_all,
        fields(from = %message.from_profile, to = %message.to_profile, depth = message.depth)
    )]
    async fn hop(
        &self,
        session: &Session,
        config: &OrchestrationConfig,
        message: &AgentMessage,
    ) -> Result<Hop> {
        let communication = config.communication();

        if message.depth >= communication.max_delegation_depth {
            warn!(max = communication.max_delegation_depth, "Maximum delegation depth reached");
            return Ok(Hop {
                reply: MAX_DEPTH_REPLY.to_string(),
                structured: false,
            });
        }

        if !config
            .network()
            .can_delegate(&message.from_profile, &message.to_profile)
        {
            warn!("Delegation not allowed by configuration");
            return Ok(Hop {
                reply: permission_denied_reply(&message.from_profile, &message.to_profile),
                structured: false,
            });
        }

        let mut agent = self
            .initialize_agent(config, &message.to_profile, None)
            .await?;
        let structured = agent.supports_structured_replies();

        let delegate_prompt = prompt::delegate_prompt(message, communication.include_context);
        let reply = respond(agent.as_mut(), &delegate_prompt, "delegation").await;

        session.ledger().append(ConversationRecord::new(
            message.from_profile.as_str(),
            message.to_profile.as_str(),
            message.content.as_str(),
            reply.as_str(),
            message.depth,
        ));
        info!("Delegation hop recorded");

        Ok(Hop { reply, structured })
    }
}

/// Full reply from an agent, with upstream failures turned into reply text
async fn respond(agent: &mut dyn Agent, prompt: &str, stage: &str) -> String {
    match collect_response(agent, prompt).await {
        Ok(reply) => reply,
        Err(e) => upstream_failure(agent.name(), stage, &e),
    }
}

/// Like [`respond`], forwarding each fragment to `sink` as it arrives
async fn respond_streaming(
    agent: &mut dyn Agent,
    prompt: &str,
    sink: Option<&mpsc::UnboundedSender<String>>,
) -> String {
    let Some(sink) = sink else {
        return respond(agent, prompt, "orchestration").await;
    };

    let mut full = String::new();
    let mut failure = None;
    {
        let mut stream = agent.response_stream(prompt);
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(fragment) => {
                    let _ = sink.send(fragment.clone());
                    full.push_str(&fragment);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
    }

    match failure {
        // Fragments already sent stay with the consumer; the error text follows them.
        Some(e) => {
            let text = upstream_failure(agent.name(), "orchestration", &e);
            let _ = sink.send(text.clone());
            text
        }
        None => full,
    }
}

fn upstream_failure(engine: &str, stage: &str, e: &AgentError) -> String {
    error!(engine = %engine, stage = %stage, error = %e, "Upstream call failed");
    format!("Error during {stage}: {e}")
}
