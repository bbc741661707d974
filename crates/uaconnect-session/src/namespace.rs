//! Local to server namespace index mapping.
//!
//! Node ids in the host configuration use local namespace indexes. Each
//! local index is bound to a namespace URI, and after every connect the
//! URI is looked up in the server's namespace array to find the server
//! index:
//!
//! ```text
//!   local 2 ──→ "urn:plc:machine" ──→ server 5
//!   local 3 ──→ "urn:plc:recipes" ──→ (unknown on server: stays 3)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

#[derive(Debug, Clone, Default)]
pub(crate) struct NamespaceMap {
    /// Configured bindings, local index → URI.
    by_index: BTreeMap<u16, String>,
    /// Resolved after connect, local index → server index.
    server_index: HashMap<u16, u16>,
}

impl NamespaceMap {
    /// Binds `uri` to `index`. A URI belongs to one index only, so an older
    /// binding of the same URI is removed; an older URI of `index` is
    /// replaced.
    pub(crate) fn add(&mut self, index: u16, uri: impl Into<String>) {
        let uri = uri.into();
        self.by_index.retain(|i, u| *i == index || *u != uri);
        self.by_index.insert(index, uri);
        // Resolution of the changed binding is stale until the next update.
        self.server_index
            .retain(|i, _| *i != index && self.by_index.contains_key(i));
    }

    /// Resolves every binding against the server's namespace array.
    ///
    /// Returns the URIs the server does not know.
    pub(crate) fn update(&mut self, server_namespaces: &[String]) -> Vec<String> {
        self.server_index.clear();
        let mut unknown = Vec::new();

        for (&local, uri) in &self.by_index {
            match server_namespaces.iter().position(|ns| ns == uri) {
                Some(pos) => match u16::try_from(pos) {
                    Ok(server) => {
                        self.server_index.insert(local, server);
                    }
                    Err(_) => unknown.push(uri.clone()),
                },
                None => unknown.push(uri.clone()),
            }
        }
        unknown
    }

    /// The server index for `local`; `local` itself when unmapped.
    pub(crate) fn map_index(&self, local: u16) -> u16 {
        self.server_index.get(&local).copied().unwrap_or(local)
    }

    /// `local -> URI -> server` lines under a heading.
    pub(crate) fn write_report(&self, out: &mut String) {
        if self.by_index.is_empty() {
            return;
        }
        let _ = writeln!(out, "Configured Namespace Mapping (local -> Namespace URI -> server)");
        for (&local, uri) in &self.by_index {
            let _ = writeln!(out, " {local} -> {uri} -> {}", self.map_index(local));
        }
    }
}
