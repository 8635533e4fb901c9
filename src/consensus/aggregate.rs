use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::info;

use super::label::{LabelRename, LabelSet, LABEL_SEPARATOR};
use super::natural::natural_cmp;
use crate::calls::{Purity, PurityTable};
use crate::error::GateError;

/// How purity calls are combined into one label per cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsensusOptions {
    /// Models whose calls take part in the consensus. `None` means every
    /// model in the purity table.
    pub consensus_models: Option<Vec<String>>,
    /// Optional many-to-one renaming of model names to final labels.
    pub label_rename: Option<LabelRename>,
    /// Set multi-label consensus values to undefined.
    pub drop_ambiguous: bool,
}

/// Per-cell consensus, aligned with the rows of the purity table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsensusResult {
    /// Models called pure, before renaming.
    pub raw: Vec<Option<LabelSet>>,
    /// Final labels after renaming and ambiguity dropping.
    pub consensus: Vec<Option<LabelSet>>,
    /// Ambiguous values removed by `drop_ambiguous`, with cell counts.
    pub dropped: BTreeMap<LabelSet, usize>,
    /// Distinct final labels in natural order.
    pub levels: Vec<LabelSet>,
}

impl ConsensusResult {
    /// Number of cells with a defined final label.
    pub fn labeled(&self) -> usize {
        self.consensus.iter().filter(|c| c.is_some()).count()
    }

    /// Cells per final label in level order; undefined cells excluded.
    pub fn counts(&self) -> Vec<(LabelSet, usize)> {
        let mut tally: HashMap<&LabelSet, usize> = HashMap::new();
        for label in self.consensus.iter().flatten() {
            *tally.entry(label).or_default() += 1;
        }
        self.levels
            .iter()
            .map(|l| (l.clone(), tally.get(l).copied().unwrap_or(0)))
            .collect()
    }
}

/// Combine per-model purity calls into one consensus label per cell.
///
/// Raw consensus is the set of eligible models that called the cell pure.
/// Renaming is evaluated once per distinct raw set and shared by every
/// cell holding it.
pub fn aggregate(calls: &PurityTable, options: &ConsensusOptions) -> Result<ConsensusResult, GateError> {
    let eligible: Vec<&str> = match &options.consensus_models {
        Some(models) => models.iter().map(String::as_str).collect(),
        None => calls.models().collect(),
    };

    let columns = eligible
        .iter()
        .map(|model| {
            calls
                .get(model)
                .map(|c| (*model, c))
                .ok_or_else(|| GateError::unknown_model(model, calls.models()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(model) = eligible.iter().find(|m| m.contains(LABEL_SEPARATOR)) {
        return Err(GateError::invalid_model(
            model,
            format!("model names may not contain '{LABEL_SEPARATOR}'"),
        ));
    }

    let raw: Vec<Option<LabelSet>> = (0..calls.len())
        .map(|cell| {
            let set: LabelSet = columns
                .iter()
                .filter(|(_, c)| c[cell] == Some(Purity::Pure))
                .map(|(model, _)| *model)
                .collect();
            (!set.is_empty()).then_some(set)
        })
        .collect();

    let mut consensus = match &options.label_rename {
        Some(rename) => apply_rename(&raw, rename),
        None => raw.clone(),
    };

    let dropped = if options.drop_ambiguous {
        drop_ambiguous(&mut consensus)
    } else {
        BTreeMap::new()
    };

    let levels = natural_levels(&consensus);

    let result = ConsensusResult {
        raw,
        consensus,
        dropped,
        levels,
    };
    info!(
        "consensus over {} models: {} of {} cells labeled, {} distinct labels",
        columns.len(),
        result.labeled(),
        calls.len(),
        result.levels.len()
    );
    Ok(result)
}

fn apply_rename(raw: &[Option<LabelSet>], rename: &LabelRename) -> Vec<Option<LabelSet>> {
    let mut memo: HashMap<&LabelSet, Option<LabelSet>> = HashMap::new();
    raw.iter()
        .map(|value| {
            let set = value.as_ref()?;
            memo.entry(set)
                .or_insert_with(|| set.rename(rename))
                .clone()
        })
        .collect()
}

fn drop_ambiguous(consensus: &mut [Option<LabelSet>]) -> BTreeMap<LabelSet, usize> {
    let mut dropped: BTreeMap<LabelSet, usize> = BTreeMap::new();
    for value in consensus.iter_mut() {
        if value.as_ref().is_some_and(LabelSet::is_ambiguous) {
            if let Some(set) = value.take() {
                *dropped.entry(set).or_default() += 1;
            }
        }
    }

    if !dropped.is_empty() {
        info!("Dropping ambiguous consensus values:");
        for (label, count) in &dropped {
            info!("  {label}: {count}");
        }
    }
    dropped
}

fn natural_levels(consensus: &[Option<LabelSet>]) -> Vec<LabelSet> {
    let distinct: BTreeSet<&LabelSet> = consensus.iter().flatten().collect();
    let mut levels: Vec<LabelSet> = distinct.into_iter().cloned().collect();
    levels.sort_by(|a, b| natural_cmp(&a.join(), &b.join()));
    levels
}
