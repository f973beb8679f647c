//! Module identifiers, names, and the build configuration that keys the cache.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::GraphError;

/// Opaque handle for an interned dotted module name.
///
/// Unique per [`crate::graph::ImportGraph`] / [`crate::interner::Interner`]
/// instance; ids from two different graphs are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    /// Construct a `ModuleId` from a raw index. Only meaningful for ids
    /// that actually came from an [`crate::interner::Interner`]; exposed
    /// for tests that need an id guaranteed absent from a given graph.
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[cfg(test)]
    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

/// Metadata recorded for a module in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    pub is_squashed: bool,
}

/// Validate that `name` is a non-empty, dot-separated sequence of
/// identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn validate_module_name(name: &str) -> Result<(), GraphError> {
    if name.is_empty() {
        return Err(GraphError::InvalidModuleName(name.to_string()));
    }
    for segment in name.split('.') {
        if !is_identifier(segment) {
            return Err(GraphError::InvalidModuleName(name.to_string()));
        }
    }
    Ok(())
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// The root segment of a dotted module name, e.g. `"pkg"` for `"pkg.a.b"`.
pub fn root_segment(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Dotted-name prefix one segment shorter than `name`, or `None` if `name`
/// has only one segment.
pub fn parent_name(name: &str) -> Option<&str> {
    name.rfind('.').map(|i| &name[..i])
}

/// `true` if `name` is exactly `prefix.<one more segment>`.
pub fn is_direct_child(prefix: &str, name: &str) -> bool {
    parent_name(name) == Some(prefix)
}

/// `true` if `name` is strictly nested under `prefix.`.
pub fn is_descendant(prefix: &str, name: &str) -> bool {
    name.len() > prefix.len() && name.starts_with(prefix) && name.as_bytes()[prefix.len()] == b'.'
}

/// Ordered tuple of root names plus build flags; the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub roots: Vec<String>,
    pub include_external_packages: bool,
    pub exclude_type_checking_imports: bool,
}

impl BuildConfiguration {
    pub fn new(roots: Vec<String>) -> Self {
        Self {
            roots,
            include_external_packages: false,
            exclude_type_checking_imports: false,
        }
    }

    /// Stable hash of this configuration, used as the cache file name.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for root in &self.roots {
            hasher.update(root.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([self.include_external_packages as u8]);
        hasher.update([self.exclude_type_checking_imports as u8]);
        hex::encode(hasher.finalize())
    }
}
