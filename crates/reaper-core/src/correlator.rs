//! Naming-convention rules that tie a resource back to the build that created it.
//!
//! | kind      | pattern                       |
//! |-----------|-------------------------------|
//! | namespace | `<prefix>-<digits>`           |
//! | vm        | `condor-<prefix>-<digits>`    |
//! | release   | `<anything>-<prefix>-<digits>`|

use regex::Regex;

use crate::domain::{BuildId, ManagedResource, ResourceKind};
use crate::error::{ReaperError, Result};

/// Default naming prefix used by the CI pipelines.
pub const DEFAULT_PREFIX: &str = "circleci";

/// Compiled per-kind patterns for one prefix.
#[derive(Debug, Clone)]
pub struct Correlator {
    prefix: String,
    namespace: Regex,
    vm: Regex,
    release: Regex,
}

impl Correlator {
    /// Compile the patterns for `prefix`.
    ///
    /// The prefix is matched literally. `[0-9]` is used instead of `\d`
    /// because `\d` in the regex crate also matches non-ASCII digits.
    pub fn new(prefix: &str) -> Result<Self> {
        if prefix.is_empty() {
            return Err(ReaperError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: "prefix must not be empty".to_string(),
            });
        }

        let escaped = regex::escape(prefix);
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| ReaperError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            prefix: prefix.to_string(),
            namespace: compile(format!(r"^{escaped}-([0-9]+)$"))?,
            vm: compile(format!(r"^condor-{escaped}-([0-9]+)$"))?,
            release: compile(format!(r"^\S*-{escaped}-([0-9]+)$"))?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn pattern(&self, kind: ResourceKind) -> &Regex {
        match kind {
            ResourceKind::Namespace => &self.namespace,
            ResourceKind::Vm => &self.vm,
            ResourceKind::Release => &self.release,
        }
    }

    /// Extract the build number from `name`, if it follows the kind's convention.
    pub fn build_id(&self, kind: ResourceKind, name: &str) -> Option<BuildId> {
        self.pattern(kind)
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| BuildId(m.as_str().to_string()))
    }

    pub fn classify(&self, kind: ResourceKind, name: &str) -> ManagedResource {
        ManagedResource {
            kind,
            native_name: name.to_string(),
            build_id: self.build_id(kind, name),
        }
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX).expect("default prefix compiles")
    }
}
