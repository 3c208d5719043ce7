//! Per-client access boundaries.
//!
//! A client may declare a set of root URIs at connect time. Resource reads
//! routed to that client must stay inside one of them.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum RootError {
    #[error("invalid root URI '{uri}' for client '{client}': {reason}")]
    InvalidRoot {
        client: String,
        uri: String,
        reason: String,
    },

    #[error("Access denied: client '{client}' may not access '{uri}'")]
    AccessDenied { client: String, uri: String },
}

/// Registered roots, keyed by client id.
#[derive(Debug, Default)]
pub struct RootRegistry {
    roots: HashMap<String, Vec<Url>>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the roots of a client, replacing any previous set.
    ///
    /// Every URI must parse and carry a scheme; nothing is stored if one
    /// does not.
    pub fn register(&mut self, client_id: &str, roots: &[String]) -> Result<(), RootError> {
        let parsed = parse_roots(client_id, roots)?;
        self.set_roots(client_id, parsed);
        Ok(())
    }

    /// Store roots that were already parsed with [`parse_roots`].
    pub fn set_roots(&mut self, client_id: &str, roots: Vec<Url>) {
        let root_count = roots.len();
        if self.roots.insert(client_id.to_string(), roots).is_some() {
            warn!(client = %client_id, "Re-registering roots, previous roots overwritten");
        } else {
            debug!(client = %client_id, root_count, "Registered roots");
        }
    }

    pub fn unregister(&mut self, client_id: &str) -> bool {
        self.roots.remove(client_id).is_some()
    }

    /// True when the client is known to the registry.
    pub fn validate_access(&self, client_id: &str) -> bool {
        self.roots.contains_key(client_id)
    }

    /// Check that `uri` lies within one of the client's roots.
    ///
    /// A client that declared no roots may not read any resource.
    pub fn validate_resource_access(&self, uri: &str, client_id: &str) -> Result<(), RootError> {
        let denied = || RootError::AccessDenied {
            client: client_id.to_string(),
            uri: uri.to_string(),
        };

        let roots = self.roots.get(client_id).ok_or_else(denied)?;
        let candidate = Url::parse(uri).map_err(|_| denied())?;
        if roots.iter().any(|root| within_root(root, &candidate)) {
            Ok(())
        } else {
            Err(denied())
        }
    }

    pub fn roots_for(&self, client_id: &str) -> Option<&[Url]> {
        self.roots.get(client_id).map(Vec::as_slice)
    }
}

/// Parse root URIs, failing on the first one without a scheme.
pub fn parse_roots(client_id: &str, roots: &[String]) -> Result<Vec<Url>, RootError> {
    roots
        .iter()
        .map(|raw| {
            Url::parse(raw).map_err(|e| RootError::InvalidRoot {
                client: client_id.to_string(),
                uri: raw.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn within_root(root: &Url, candidate: &Url) -> bool {
    if root.scheme() != candidate.scheme() || root.host_str() != candidate.host_str() {
        return false;
    }
    if root.port_or_known_default() != candidate.port_or_known_default() {
        return false;
    }

    let root_path = root.path().trim_end_matches('/');
    let path = candidate.path();
    // "/data" must admit "/data" and "/data/x" but not "/database"
    path == root_path
        || root_path.is_empty()
        || path
            .strip_prefix(root_path)
            .is_some_and(|rest| rest.starts_with('/'))
}
