//! Capability-based routing of a task to a profile

use tracing::debug;

use crate::config::OrchestrationConfig;

/// Picks the profile whose declared capabilities best cover a task
pub struct CapabilityRouter;

impl CapabilityRouter {
    /// Best profile for a task given the capabilities it needs
    ///
    /// With no required capabilities the orchestrator profile is returned
    /// without scoring. Otherwise each profile scores one point per required
    /// capability it declares; the highest score wins and ties go to the
    /// profile declared first. No overlap at all falls back to the
    /// orchestrator profile.
    pub fn best_profile_for_task(
        config: &OrchestrationConfig,
        task: &str,
        required_capabilities: &[String],
    ) -> String {
        let orchestrator = config.orchestrator_profile();

        if required_capabilities.is_empty() {
            return orchestrator.to_string();
        }

        let network = config.network();
        let mut best: Option<(&str, usize)> = None;

        for profile in network.profiles() {
            let declared = network.capabilities(profile);
            let score = required_capabilities
                .iter()
                .filter(|cap| declared.contains(*cap))
                .count();

            if score == 0 {
                continue;
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((profile, score));
            }
        }

        match best {
            Some((profile, score)) => {
                debug!(task = %task, profile = %profile, score, "Routed task by capability");
                profile.to_string()
            }
            None => {
                debug!(task = %task, "No capability overlap, routing to orchestrator");
                orchestrator.to_string()
            }
        }
    }
}
