//! Per-model purity calls.

use std::fmt;
use std::str::FromStr;

use crate::error::GateError;

/// Suffix of the per-model purity column in exported tables.
pub const PURITY_SUFFIX: &str = ".is.pure";

/// Name of the purity column written for `model`.
pub fn purity_column(model: &str) -> String {
    format!("{model}{PURITY_SUFFIX}")
}

/// Outcome of one gate model for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purity {
    Pure,
    Impure,
}

impl Purity {
    /// Parse an externally produced purity label. Empty and `NA` are
    /// undefined; every label other than `Pure` counts as impure.
    pub fn from_label(label: &str) -> Option<Purity> {
        match label.trim() {
            "" | "NA" => None,
            "Pure" => Some(Purity::Pure),
            _ => Some(Purity::Impure),
        }
    }
}

impl fmt::Display for Purity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purity::Pure => write!(f, "Pure"),
            Purity::Impure => write!(f, "Impure"),
        }
    }
}

impl FromStr for Purity {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Purity::from_label(s)
            .ok_or_else(|| GateError::Configuration(format!("'{s}' is not a purity label")))
    }
}

/// Purity calls for every cell under every model that was run, in run order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurityTable {
    cell_ids: Vec<String>,
    columns: Vec<(String, Vec<Option<Purity>>)>,
}

impl PurityTable {
    pub fn new(cell_ids: Vec<String>) -> Self {
        Self {
            cell_ids,
            columns: Vec::new(),
        }
    }

    /// Record the calls of one model. Re-running a model replaces its column.
    pub fn insert(&mut self, model: &str, calls: Vec<Option<Purity>>) -> Result<(), GateError> {
        if calls.len() != self.cell_ids.len() {
            return Err(GateError::Configuration(format!(
                "model '{model}' returned {} calls for {} cells",
                calls.len(),
                self.cell_ids.len()
            )));
        }
        match self.columns.iter_mut().find(|(name, _)| name == model) {
            Some((_, existing)) => *existing = calls,
            None => self.columns.push((model.to_string(), calls)),
        }
        Ok(())
    }

    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    /// Model names in run order.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, model: &str) -> Option<&[Option<Purity>]> {
        self.columns
            .iter()
            .find(|(name, _)| name == model)
            .map(|(_, calls)| calls.as_slice())
    }

    /// Number of cells called `Pure` by `model`.
    pub fn pure_count(&self, model: &str) -> usize {
        self.get(model)
            .map(|calls| calls.iter().filter(|c| **c == Some(Purity::Pure)).count())
            .unwrap_or(0)
    }
}
