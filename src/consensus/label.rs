use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Separator used when a label set is rendered as text.
pub const LABEL_SEPARATOR: char = ',';

// ---------------------------------------------------------------------------
// LabelSet
// ---------------------------------------------------------------------------

/// An ordered, de-duplicated set of labels. Only joined into `"A,B"` text
/// at the output boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet(BTreeSet<String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a joined label string. Blank components are ignored.
    pub fn parse(joined: &str) -> Self {
        joined
            .split(LABEL_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        self.0.insert(label.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// More than one label.
    pub fn is_ambiguous(&self) -> bool {
        self.0.len() > 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn join(&self) -> String {
        let mut out = String::new();
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(LABEL_SEPARATOR);
            }
            out.push_str(label);
        }
        out
    }

    /// Map every component through `rename`. A target holding several
    /// comma-separated labels contributes each of them. Returns `None` when
    /// nothing survives.
    pub fn rename(&self, rename: &LabelRename) -> Option<LabelSet> {
        let mapped: LabelSet = self
            .iter()
            .filter_map(|label| rename.map(label))
            .flat_map(LabelSet::parse)
            .collect();
        if mapped.is_empty() {
            None
        } else {
            Some(mapped)
        }
    }
}

impl FromIterator<String> for LabelSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        LabelSet(iter.into_iter().collect())
    }
}

impl IntoIterator for LabelSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> FromIterator<&'a str> for LabelSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        LabelSet(iter.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

// ---------------------------------------------------------------------------
// LabelRename
// ---------------------------------------------------------------------------

/// Many-to-one label renaming. A `None` target drops the label; labels
/// without an entry pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelRename(BTreeMap<String, Option<String>>);

impl LabelRename {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: Option<String>) {
        self.0.insert(from.into(), to);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn map<'a>(&'a self, label: &'a str) -> Option<&'a str> {
        match self.0.get(label) {
            Some(target) => target.as_deref(),
            None => Some(label),
        }
    }

    /// Merge `other` on top of `self`.
    pub fn extend(&mut self, other: LabelRename) {
        self.0.extend(other.0);
    }

    /// Parse a `FROM=TO` pair; an empty `TO` drops the label.
    pub fn parse_pair(pair: &str) -> Result<(String, Option<String>), GateError> {
        let (from, to) = pair.split_once('=').ok_or_else(|| {
            GateError::Configuration(format!("rename '{pair}' is not of the form FROM=TO"))
        })?;
        let from = from.trim();
        if from.is_empty() {
            return Err(GateError::Configuration(format!(
                "rename '{pair}' has an empty source label"
            )));
        }
        let to = to.trim();
        Ok((from.to_string(), (!to.is_empty()).then(|| to.to_string())))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelRename {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LabelRename(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        )
    }
}
