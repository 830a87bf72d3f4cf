//! Derived lookup indices over an agent network

use std::collections::HashMap;

use crate::config::AgentNetworkEntry;

/// Role reported for a profile whose network entry carries none
pub const DEFAULT_ROLE: &str = "specialist";

/// Lookup structures derived from a declared agent network
///
/// Built once from the ordered list of network entries and never mutated
/// afterwards, so every map holds exactly the profile ids that appear in the
/// network. Entries without a profile id are left out of every index. When a
/// profile is declared more than once the later entry's values win, while
/// the position of its first declaration is kept for ordering.
#[derive(Debug, Clone, Default)]
pub struct AgentNetwork {
    /// Profile ids in first-declared order
    order: Vec<String>,
    profile_capabilities: HashMap<String, Vec<String>>,
    profile_delegation_map: HashMap<String, Vec<String>>,
    profile_to_engine: HashMap<String, String>,
    roles: HashMap<String, String>,
}

impl AgentNetwork {
    /// Build the indices from network entries
    pub fn from_entries(entries: &[AgentNetworkEntry]) -> Self {
        let mut network = Self::default();

        for entry in entries {
            let Some(profile) = entry.profile_id() else {
                continue;
            };

            if !network.profile_to_engine.contains_key(profile) {
                network.order.push(profile.to_string());
            }

            network
                .profile_capabilities
                .insert(profile.to_string(), entry.capabilities.clone());
            network
                .profile_delegation_map
                .insert(profile.to_string(), entry.can_delegate_to.clone());
            network
                .profile_to_engine
                .insert(profile.to_string(), entry.engine.clone());
            network.roles.insert(profile.to_string(), entry.role.clone());
        }

        network
    }

    /// Profile ids in declared network order
    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, profile: &str) -> bool {
        self.profile_to_engine.contains_key(profile)
    }

    /// Capabilities declared for a profile (empty if unknown)
    pub fn capabilities(&self, profile: &str) -> &[String] {
        self.profile_capabilities
            .get(profile)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Profiles this profile may delegate to (empty if unknown)
    pub fn delegates(&self, profile: &str) -> &[String] {
        self.profile_delegation_map
            .get(profile)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Check whether `from` may hand work to `to`
    pub fn can_delegate(&self, from: &str, to: &str) -> bool {
        self.delegates(from).iter().any(|p| p == to)
    }

    /// Engine bound to a profile
    pub fn engine(&self, profile: &str) -> Option<&str> {
        self.profile_to_engine.get(profile).map(String::as_str)
    }

    /// Role label of a profile, falling back to [`DEFAULT_ROLE`]
    pub fn role(&self, profile: &str) -> &str {
        self.roles
            .get(profile)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ROLE)
    }

    pub fn profile_capabilities(&self) -> &HashMap<String, Vec<String>> {
        &self.profile_capabilities
    }

    pub fn profile_delegation_map(&self) -> &HashMap<String, Vec<String>> {
        &self.profile_delegation_map
    }

    pub fn profile_to_engine(&self) -> &HashMap<String, String> {
        &self.profile_to_engine
    }

    /// Number of indexed profiles
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
