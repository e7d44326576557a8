//! `ResourceDiff` and supporting types produced by the Diff Calculator
//! (§3, §4.6) and consumed by the Diff Processor's report renderer (§4.7,
//! §6.4).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The classification of a single resource's diff outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
    Unchanged,
}

impl ChangeType {
    /// The unified-diff header sigil this change type renders as (§6.4):
    /// `+++` / `---` / `~~~`. `Unchanged` never reaches the renderer.
    pub fn header_sigil(&self) -> &'static str {
        match self {
            ChangeType::Added => "+++",
            ChangeType::Modified => "~~~",
            ChangeType::Removed => "---",
            ChangeType::Unchanged => "",
        }
    }
}

/// Running totals rendered as the report's summary line (§4.7, §6.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

impl SummaryCounts {
    pub fn record(&mut self, change: ChangeType) {
        match change {
            ChangeType::Added => self.added += 1,
            ChangeType::Modified => self.modified += 1,
            ChangeType::Removed => self.removed += 1,
            ChangeType::Unchanged => {}
        }
    }

    pub fn total(&self) -> usize {
        self.added + self.modified + self.removed
    }

    /// Render as `Summary: X added, Y modified, Z removed`, omitting zero
    /// counts (§4.7).
    pub fn summary_line(&self) -> String {
        let mut parts = Vec::new();
        if self.added > 0 {
            parts.push(format!("{} added", self.added));
        }
        if self.modified > 0 {
            parts.push(format!("{} modified", self.modified));
        }
        if self.removed > 0 {
            parts.push(format!("{} removed", self.removed));
        }
        format!("Summary: {}", parts.join(", "))
    }
}

/// A single resource's computed diff, ordered for output by
/// `(kind, namespace, name)` (§3, §8 Ordering property).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
    pub change_type: ChangeType,
    pub unified_diff_text: String,
}

impl ResourceDiff {
    pub fn sort_key(&self) -> (&str, &str, &str) {
        (&self.kind, self.namespace.as_deref().unwrap_or(""), &self.name)
    }

    pub fn header(&self) -> String {
        format!("{} {}/{}", self.change_type.header_sigil(), self.kind, self.name)
    }
}

impl PartialEq for ResourceDiff {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl Eq for ResourceDiff {}

impl PartialOrd for ResourceDiff {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceDiff {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
