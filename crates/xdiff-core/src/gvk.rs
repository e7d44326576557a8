//! Group/Version/Kind handling
//!
//! Mirrors `gvk_from_type_meta` in the teacher's resource manager, generalized
//! into a standalone value type used throughout the diff pipeline instead of
//! being a private helper of one function.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Kubernetes Group/Version/Kind triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Parse `apiVersion` + `kind` into a `Gvk`.
    ///
    /// "apps/v1" -> group="apps", version="v1"
    /// "v1" -> group="", version="v1" (core API)
    pub fn from_api_version_kind(api_version: &str, kind: &str) -> Self {
        let (group, version) = split_api_version(api_version);
        Self {
            group,
            version,
            kind: kind.to_string(),
        }
    }

    /// Reconstruct the `apiVersion` string this GVK was derived from.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

fn split_api_version(api_version: &str) -> (String, String) {
    match api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}
