//! Consensus version records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A consensus version. Valid versions start at 1.
pub type ConsensusVersion = u64;

/// A module name paired with one of its consensus versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleVersion {
    /// Module name.
    pub module: String,
    /// Consensus version.
    pub version: ConsensusVersion,
}

impl ModuleVersion {
    /// Create a new module version pair.
    pub fn new(module: impl Into<String>, version: ConsensusVersion) -> Self {
        Self {
            module: module.into(),
            version,
        }
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.module, self.version)
    }
}

/// Durable record of the last applied consensus version of every module.
///
/// A module without an entry has never initialized state. Iteration is
/// ordered by module name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionMap {
    versions: BTreeMap<String, ConsensusVersion>,
}

impl VersionMap {
    /// Create an empty version map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, module: impl Into<String>, version: ConsensusVersion) -> Self {
        self.set(module, version);
        self
    }

    /// Get the recorded version of a module.
    pub fn get(&self, module: &str) -> Option<ConsensusVersion> {
        self.versions.get(module).copied()
    }

    /// Record a version for a module, returning the previous one.
    pub fn set(
        &mut self,
        module: impl Into<String>,
        version: ConsensusVersion,
    ) -> Option<ConsensusVersion> {
        self.versions.insert(module.into(), version)
    }

    /// Remove a module's record.
    pub fn remove(&mut self, module: &str) -> Option<ConsensusVersion> {
        self.versions.remove(module)
    }

    /// Check whether a module has a recorded version.
    pub fn contains(&self, module: &str) -> bool {
        self.versions.contains_key(module)
    }

    /// Number of recorded modules.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Check if no module has a record.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Iterate over `(module, version)` pairs in module name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ConsensusVersion)> {
        self.versions.iter().map(|(name, v)| (name.as_str(), *v))
    }

    /// Module names in order.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    /// Keep only the modules for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, ConsensusVersion) -> bool) {
        self.versions.retain(|name, v| keep(name, *v));
    }

    /// Serialize the version map to bytes (JSON).
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a version map from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl<S: Into<String>> FromIterator<(S, ConsensusVersion)> for VersionMap {
    fn from_iter<I: IntoIterator<Item = (S, ConsensusVersion)>>(iter: I) -> Self {
        Self {
            versions: iter.into_iter().map(|(m, v)| (m.into(), v)).collect(),
        }
    }
}

impl fmt::Display for VersionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (module, version)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: v{}", module, version)?;
        }
        write!(f, "}}")
    }
}
