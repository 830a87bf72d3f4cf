//! Prompt builders for the orchestrator, delegates and synthesis

use crate::config::OrchestrationConfig;
use crate::message::AgentMessage;

/// Prompt for the orchestrator's first pass over a user request
///
/// Lists every profile the orchestrator may delegate to. Without permitted
/// delegates the specialist section and the delegation instructions are left
/// out entirely.
pub fn orchestration_prompt(config: &OrchestrationConfig, user_input: &str, structured: bool) -> String {
    let current = config.orchestrator_profile();
    let network = config.network();

    let specialists: Vec<String> = network
        .delegates(current)
        .iter()
        .map(|profile| {
            format!(
                "- {}: {} (capabilities: {})",
                profile,
                network.role(profile),
                network.capabilities(profile).join(", ")
            )
        })
        .collect();

    if specialists.is_empty() {
        return format!(
            "You are processing this request with profile: {current}.\n\nUser request: {user_input}"
        );
    }

    let instructions = if structured {
        "Reply with a single JSON object. To answer directly use \
         {\"type\": \"final_answer\", \"answer\": \"...\"}. To hand work to a specialist use \
         {\"type\": \"delegate\", \"profile\": \"ProfileName\", \"task\": \"...\"}."
    } else {
        "If you need specialist help, indicate this by starting your response with \
         [DELEGATE: ProfileName]\nfollowed by the specific question or task for that specialist."
    };

    format!(
        "You are the orchestrator with profile: {current}.\n\
         You can coordinate with other specialist agents when needed.\n\n\
         Available specialists you can delegate to:\n{}\n\n\
         {instructions}\n\n\
         User request: {user_input}\n\n\
         Process this request. If you can handle it completely, respond directly.\n\
         If a specialist would provide better results, delegate to them.",
        specialists.join("\n")
    )
}

/// Prompt sent to a delegate: the task, then an optional context preamble
pub fn delegate_prompt(message: &AgentMessage, include_context: bool) -> String {
    let mut prompt = message.content.clone();

    if include_context {
        prompt.push_str(&format!(
            "\n\nContext: You are receiving this request from {}. ",
            message.from_profile
        ));
        if !message.context.is_empty() {
            prompt.push_str(&format!("Previous context: {}", message.summary()));
        }
    }

    prompt
}

/// Prompt asking the orchestrator to fold a delegated result into a final answer
pub fn synthesis_prompt(
    user_input: &str,
    initial_response: &str,
    delegate_profile: &str,
    delegated_result: &str,
) -> String {
    format!(
        "Based on the following information:\n\
         Original request: {user_input}\n\
         Your initial processing: {initial_response}\n\
         Result from {delegate_profile}: {delegated_result}\n\n\
         Provide a comprehensive final response to the user."
    )
}
