//! Core domain types shared by the collector, reconciler and executor.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReaperError, Result};

/// A CI build number, kept as text.
///
/// Build numbers are never parsed as integers so that `"0470"` and `"470"`
/// stay distinct and comparison never depends on number formatting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildId(pub String);

impl BuildId {
    pub fn new(id: impl Into<String>) -> Self {
        BuildId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of infrastructure a CI build provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Kubernetes namespace
    Namespace,
    /// Compute instance
    Vm,
    /// Helm release
    Release,
}

impl ResourceKind {
    /// Order in which inventories are snapshotted.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Namespace,
        ResourceKind::Vm,
        ResourceKind::Release,
    ];

    /// Order in which deletion batches are applied.
    ///
    /// Releases, then namespaces, then VMs. Nothing is known to depend on
    /// this order.
    pub const DELETION_ORDER: [ResourceKind; 3] = [
        ResourceKind::Release,
        ResourceKind::Namespace,
        ResourceKind::Vm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespace",
            ResourceKind::Vm => "vm",
            ResourceKind::Release => "release",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resource as reported by a backend listing, before correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResource {
    /// Native name in the external system.
    pub name: String,

    /// The external system already reports this resource as going away.
    pub tearing_down: bool,
}

impl RawResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tearing_down: false,
        }
    }

    pub fn tearing_down(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tearing_down: true,
        }
    }
}

/// A resource with its correlated build, if its name follows the convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedResource {
    pub kind: ResourceKind,
    pub native_name: String,
    /// `None` means the name did not match; such resources are never deleted.
    pub build_id: Option<BuildId>,
}

/// Builds the CI service currently reports as running for a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBuildSet(BTreeSet<BuildId>);

impl ActiveBuildSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a raw oracle payload.
    ///
    /// Only a JSON array of records each carrying `build_num` is accepted.
    /// Anything else means the set of live builds is unknown, so the whole
    /// payload is returned in the error and nothing may be deleted.
    pub fn from_response(payload: &Value) -> Result<Self> {
        let unexpected = || ReaperError::UnexpectedOracleResponse {
            payload: payload.to_string(),
        };

        let records = payload.as_array().ok_or_else(unexpected)?;
        let mut builds = BTreeSet::new();
        for record in records {
            let id = match record.get("build_num") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return Err(unexpected()),
            };
            builds.insert(BuildId(id));
        }
        Ok(Self(builds))
    }

    pub fn contains(&self, id: &BuildId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildId> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for ActiveBuildSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|s| BuildId(s.into())).collect())
    }
}
