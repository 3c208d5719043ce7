//! Name to owning-client index and client resolution.

use std::collections::{BTreeSet, HashMap};

use super::error::{DispatchError, DispatchResult};
use crate::domain::CapabilityKind;

/// Maps a capability name to the clients that provide it.
///
/// Empty sets are never kept: removing the last owner drops the name.
#[derive(Debug, Default, Clone)]
pub struct RoutingIndex {
    entries: HashMap<String, BTreeSet<String>>,
}

impl RoutingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, client_id: &str) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .insert(client_id.to_string());
    }

    pub fn remove(&mut self, name: &str, client_id: &str) {
        if let Some(clients) = self.entries.get_mut(name) {
            clients.remove(client_id);
            if clients.is_empty() {
                self.entries.remove(name);
            }
        }
    }

    /// Drop every entry owned by `client_id`.
    pub fn remove_client(&mut self, client_id: &str) {
        self.entries.retain(|_, clients| {
            clients.remove(client_id);
            !clients.is_empty()
        });
    }

    /// Clients providing `name`, in id order.
    pub fn candidates(&self, name: &str) -> Vec<String> {
        self.entries
            .get(name)
            .map(|clients| clients.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve the single client that should serve `name`.
///
/// A hint is used directly once it passes the allow filter. Without a hint
/// the candidates come from the index, narrowed by the filter, and must be
/// exactly one.
pub fn resolve(
    index: &RoutingIndex,
    kind: CapabilityKind,
    name: &str,
    client_hint: Option<&str>,
    allow_filter: Option<&[String]>,
) -> DispatchResult<String> {
    if let Some(hint) = client_hint {
        if let Some(filter) = allow_filter {
            if !filter.iter().any(|allowed| allowed == hint) {
                return Err(DispatchError::NotInFilter {
                    kind,
                    name: name.to_string(),
                    client: hint.to_string(),
                });
            }
        }
        return Ok(hint.to_string());
    }

    let mut candidates = index.candidates(name);
    if let Some(filter) = allow_filter {
        candidates.retain(|client| filter.iter().any(|allowed| allowed == client));
    }
    let filtered = allow_filter.is_some();

    match candidates.len() {
        0 => Err(DispatchError::NotFound {
            kind,
            name: name.to_string(),
            filtered,
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(DispatchError::Ambiguous {
            kind,
            name: name.to_string(),
            candidates,
            filtered,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> RoutingIndex {
        let mut index = RoutingIndex::new();
        index.add("search", "A");
        index.add("search", "B");
        index.add("save_plan", "planning");
        index
    }

    #[test]
    fn test_remove_last_owner_drops_name() {
        let mut index = index();
        index.remove("save_plan", "planning");
        assert!(!index.contains("save_plan"));

        index.remove_client("A");
        assert_eq!(index.candidates("search"), vec!["B".to_string()]);
        index.remove_client("B");
        assert!(index.is_empty());
    }

    #[test]
    fn test_resolve_single_owner() {
        let client = resolve(&index(), CapabilityKind::Tool, "save_plan", None, None).unwrap();
        assert_eq!(client, "planning");
    }

    #[test]
    fn test_resolve_ambiguous_without_filter() {
        let err = resolve(&index(), CapabilityKind::Tool, "search", None, None).unwrap_err();
        match err {
            DispatchError::Ambiguous {
                candidates,
                filtered,
                ..
            } => {
                assert_eq!(candidates, vec!["A".to_string(), "B".to_string()]);
                assert!(!filtered);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_filter_narrows_to_one() {
        let filter = vec!["B".to_string()];
        let client = resolve(
            &index(),
            CapabilityKind::Tool,
            "search",
            None,
            Some(&filter),
        )
        .unwrap();
        assert_eq!(client, "B");
    }

    #[test]
    fn test_resolve_filter_excludes_all() {
        let filter = vec!["C".to_string()];
        let err = resolve(
            &index(),
            CapabilityKind::Tool,
            "search",
            None,
            Some(&filter),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Tool 'search' not found matching filter");
    }

    #[test]
    fn test_hint_bypasses_index_but_not_filter() {
        let client = resolve(&index(), CapabilityKind::Tool, "unknown", Some("A"), None).unwrap();
        assert_eq!(client, "A");

        let filter = vec!["B".to_string()];
        let err = resolve(
            &index(),
            CapabilityKind::Tool,
            "search",
            Some("A"),
            Some(&filter),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not in allowed filter"));
    }
}
