//! Run configuration for gating and consensus

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::consensus::{ConsensusOptions, LabelRename};
use crate::error::GateError;
use crate::gate::registry::builtin_names;
use crate::gate::{GateParams, ModelRegistry, Thresholds};

/// Largest accepted `max_rank`; well above any transcriptome size.
pub const MAX_RANK_LIMIT: usize = 1_000_000;

/// Gating and consensus parameters, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Models to run, in order.
    pub models: Vec<String>,

    /// Models whose calls form the consensus (default: all of `models`).
    pub consensus_models: Option<Vec<String>>,

    /// Model/label name → final label; `null` drops the label.
    pub label_rename: LabelRename,

    /// Clear consensus values that still hold more than one label.
    pub drop_ambiguous: bool,

    /// Signature score cut-offs (default: 0.2 / 0.2)
    pub thresholds: Thresholds,

    /// Rank cap for signature scoring (default: 1500)
    pub max_rank: usize,

    /// Minimum candidates needed to descend to the next gate level (default: 30)
    pub min_cells: usize,

    /// Genes excluded from every signature.
    pub gene_blocklist: Vec<String>,

    /// Extra directories of `*.tsv` gate tables.
    pub model_dirs: Vec<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        let params = GateParams::default();
        Self {
            models: Vec::new(),
            consensus_models: None,
            label_rename: LabelRename::new(),
            drop_ambiguous: false,
            thresholds: params.thresholds,
            max_rank: params.max_rank,
            min_cells: params.min_cells,
            gene_blocklist: Vec::new(),
            model_dirs: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Every bundled rhesus model, merged into broad lineages, with
    /// ambiguous consensus values dropped.
    pub fn rhesus() -> Self {
        let label_rename: LabelRename = [
            ("Bcell.RM", "Bcell"),
            ("Tcell.RM", "T_NK"),
            ("NK.RM", "T_NK"),
            ("Myeloid.RM", "Myeloid"),
            ("pDC.RM", "pDC"),
            ("Erythrocyte.RM", "Erythrocyte"),
            ("Platelet.RM", "Platelet_MK"),
            ("Stromal.RM", "Stromal"),
            ("Epithelial.RM", "Epithelial"),
            ("Endothelial.RM", "Endothelial"),
        ]
        .into_iter()
        .collect();

        Self {
            models: builtin_names().into_iter().map(String::from).collect(),
            label_rename,
            drop_ambiguous: true,
            ..Self::default()
        }
    }

    /// Check parameter ranges. Model names are checked against the
    /// registry in [`ModelRegistry::resolve`].
    pub fn validate(&self) -> Result<(), GateError> {
        if self.models.is_empty() {
            return Err(GateError::Configuration("no models selected".into()));
        }
        if self.max_rank == 0 || self.max_rank > MAX_RANK_LIMIT {
            return Err(GateError::Configuration(format!(
                "max_rank must be in 1..={MAX_RANK_LIMIT}, got {}",
                self.max_rank
            )));
        }
        for (name, value) in [
            ("positive", self.thresholds.positive),
            ("negative", self.thresholds.negative),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GateError::Configuration(format!(
                    "{name} threshold {value} is outside [0, 1]"
                )));
            }
        }
        if let Some(consensus) = &self.consensus_models {
            if let Some(missing) = consensus.iter().find(|m| !self.models.contains(m)) {
                return Err(GateError::unknown_model(missing, self.models.iter().cloned()));
            }
        }
        Ok(())
    }

    /// Built-in models plus every configured model directory.
    pub fn registry(&self) -> Result<ModelRegistry> {
        let mut registry = ModelRegistry::builtin()?;
        for dir in &self.model_dirs {
            registry.load_dir(dir)?;
        }
        Ok(registry)
    }

    pub fn gate_params(&self) -> GateParams {
        GateParams {
            thresholds: self.thresholds,
            max_rank: self.max_rank,
            min_cells: self.min_cells,
            gene_blocklist: self.gene_blocklist.iter().cloned().collect(),
        }
    }

    pub fn consensus_options(&self) -> ConsensusOptions {
        ConsensusOptions {
            consensus_models: self.consensus_models.clone(),
            label_rename: (!self.label_rename.is_empty()).then(|| self.label_rename.clone()),
            drop_ambiguous: self.drop_ambiguous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_takes_defaults() {
        let config: GateConfig = serde_json::from_str(
            r#"{"models": ["Bcell.RM", "Tcell.RM"], "label_rename": {"Tcell.RM": "T_NK"}}"#,
        )
        .unwrap();
        assert_eq!(config.max_rank, 1500);
        assert_eq!(config.min_cells, 30);
        assert_eq!(config.thresholds, Thresholds::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.consensus_options().label_rename.unwrap().map("Tcell.RM"), Some("T_NK"));
    }

    #[test]
    fn rhesus_preset_is_valid_and_resolvable() {
        let config = GateConfig::rhesus();
        config.validate().unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.resolve(&config.models).unwrap().len(), config.models.len());
        assert_eq!(config.label_rename.map("NK.RM"), Some("T_NK"));
        assert!(config.drop_ambiguous);
    }

    #[test]
    fn consensus_models_must_be_run() {
        let config = GateConfig {
            models: vec!["Bcell.RM".into()],
            consensus_models: Some(vec!["Tcell.RM".into()]),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GateError::UnknownModel { ref name, .. }) if name == "Tcell.RM"
        ));
    }

    #[test]
    fn rejects_bad_ranges() {
        let mut config = GateConfig {
            models: vec!["Bcell.RM".into()],
            ..Default::default()
        };
        config.thresholds.positive = 1.5;
        assert!(config.validate().is_err());

        config.thresholds.positive = 0.2;
        config.max_rank = 0;
        assert!(config.validate().is_err());

        config.max_rank = usize::MAX;
        assert!(matches!(config.validate(), Err(GateError::Configuration(_))));
        config.max_rank = MAX_RANK_LIMIT;
        assert!(config.validate().is_ok());

        assert!(GateConfig::default().validate().is_err());
    }
}
