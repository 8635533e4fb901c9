use std::collections::HashSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::model::{GateModel, Signature};
use super::scoring::{CellRanks, ResolvedSignature};
use crate::calls::{purity_column, Purity};
use crate::data::model::{CellDataset, MetadataValue};
use crate::error::GateError;

/// Signature score cut-offs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// A cell passes a level when its best positive score reaches this.
    pub positive: f64,
    /// ...and its best negative score stays below this.
    pub negative: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            positive: 0.2,
            negative: 0.2,
        }
    }
}

/// Parameters handed to a classifier for every model.
#[derive(Debug, Clone, PartialEq)]
pub struct GateParams {
    pub thresholds: Thresholds,
    /// Genes ranked past this count as unexpressed (default: 1500).
    pub max_rank: usize,
    /// Stop descending levels when fewer candidates remain (default: 30).
    pub min_cells: usize,
    /// Genes never used for scoring.
    pub gene_blocklist: HashSet<String>,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            max_rank: 1500,
            min_cells: 30,
            gene_blocklist: HashSet::new(),
        }
    }
}

/// A routine producing one purity call per cell for a gate model.
pub trait PurityClassifier {
    fn name(&self) -> &str;

    fn classify(
        &self,
        dataset: &CellDataset,
        model: &GateModel,
        params: &GateParams,
    ) -> Result<Vec<Option<Purity>>, GateError>;
}

// ---------------------------------------------------------------------------
// SignatureGate
// ---------------------------------------------------------------------------

/// Hierarchical gating on rank-based signature scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureGate;

impl SignatureGate {
    fn best(signatures: &[ResolvedSignature], ranks: &CellRanks) -> f64 {
        signatures
            .iter()
            .map(|s| s.score(ranks))
            .fold(0.0, f64::max)
    }
}

impl PurityClassifier for SignatureGate {
    fn name(&self) -> &str {
        "signature-gate"
    }

    fn classify(
        &self,
        dataset: &CellDataset,
        model: &GateModel,
        params: &GateParams,
    ) -> Result<Vec<Option<Purity>>, GateError> {
        if !dataset.has_expression() {
            return Err(GateError::Configuration(format!(
                "model {} needs an expression matrix",
                model.name
            )));
        }

        let index = dataset.gene_index();
        let resolve = |sigs: &[Signature]| -> Vec<ResolvedSignature> {
            sigs.iter()
                .map(|s| ResolvedSignature::resolve(s, &index, &params.gene_blocklist))
                .collect()
        };

        let ranks: Vec<CellRanks> = dataset
            .cells
            .iter()
            .map(|c| CellRanks::new(&c.expression, params.max_rank))
            .collect();

        let mut calls = vec![Some(Purity::Pure); dataset.len()];
        let mut candidates: Vec<usize> = (0..dataset.len()).collect();

        for (depth, level) in model.levels.iter().enumerate() {
            let positive = resolve(&level.positive);
            let negative = resolve(&level.negative);
            if positive.iter().all(|s| s.up.is_empty()) {
                warn!(
                    "{}/{}: no positive signature gene is present in the matrix",
                    model.name, level.name
                );
            }

            let before = candidates.len();
            candidates.retain(|&cell| {
                let pos = Self::best(&positive, &ranks[cell]);
                let neg = Self::best(&negative, &ranks[cell]);
                let pass = pos >= params.thresholds.positive && neg < params.thresholds.negative;
                if !pass {
                    calls[cell] = Some(Purity::Impure);
                }
                pass
            });
            debug!(
                "{}/{}: {} of {before} cells pass",
                model.name,
                level.name,
                candidates.len()
            );

            let more_levels = depth + 1 < model.levels.len();
            if more_levels && candidates.len() < params.min_cells {
                warn!(
                    "{}: only {} cells left after {}, below min_cells={}; skipping remaining levels",
                    model.name,
                    candidates.len(),
                    level.name,
                    params.min_cells
                );
                break;
            }
        }

        Ok(calls)
    }
}

// ---------------------------------------------------------------------------
// PrecomputedCalls
// ---------------------------------------------------------------------------

/// Reads `<model>.is.pure` columns produced by an external gating run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedCalls;

impl PurityClassifier for PrecomputedCalls {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn classify(
        &self,
        dataset: &CellDataset,
        model: &GateModel,
        _params: &GateParams,
    ) -> Result<Vec<Option<Purity>>, GateError> {
        let column = dataset.column(&purity_column(&model.name))?;
        Ok(column
            .into_iter()
            .map(|value| match value {
                MetadataValue::String(s) => Purity::from_label(s),
                MetadataValue::Bool(true) => Some(Purity::Pure),
                MetadataValue::Null => None,
                _ => Some(Purity::Impure),
            })
            .collect())
    }
}
