//! Agent and client level filtering of capabilities.
//!
//! Everything here is a pure function of its inputs.

use super::client::ClientConfig;
use crate::agents::config::AgentProfile;

/// Effective set of clients an agent may use: every provider when the
/// profile has no allow-list, otherwise the intersection.
pub fn filter_clients_for_request(
    profile: Option<&AgentProfile>,
    all_clients: &[String],
) -> Vec<String> {
    match profile.and_then(|p| p.allowed_clients.as_ref()) {
        Some(allowed) => all_clients
            .iter()
            .filter(|client| allowed.contains(client))
            .cloned()
            .collect(),
        None => all_clients.to_vec(),
    }
}

/// Components minus the profile's exclusions.
pub fn filter_component_list(components: &[String], profile: Option<&AgentProfile>) -> Vec<String> {
    match profile {
        Some(profile) => components
            .iter()
            .filter(|name| !profile.is_excluded(name))
            .cloned()
            .collect(),
        None => components.to_vec(),
    }
}

/// Whether a client may register a capability under `name`.
pub fn is_registration_allowed(name: &str, client_config: &ClientConfig) -> bool {
    !client_config.exclude.iter().any(|excluded| excluded == name)
}
