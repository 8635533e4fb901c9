use std::collections::HashMap;

use crate::calls::{purity_column, PurityTable};
use crate::config::GateConfig;
use crate::consensus::{aggregate, ConsensusResult, LabelSet};
use crate::data::model::{Cell, CellDataset, MetadataValue};
use crate::data::writer::OutputTable;
use crate::error::GateError;
use crate::gate::{run_models, ModelRegistry, PurityClassifier};

/// Column holding the joined raw consensus.
pub const RAW_COLUMN: &str = "scGateRaw";
/// Column holding the final consensus label.
pub const CONSENSUS_COLUMN: &str = "scGateConsensus";

// ---------------------------------------------------------------------------
// GatingOutput – everything a run derives, kept apart from the input
// ---------------------------------------------------------------------------

/// Result of gating a dataset: per-model calls plus the consensus.
#[derive(Debug, Clone, PartialEq)]
pub struct GatingOutput {
    pub purity: PurityTable,
    pub consensus: ConsensusResult,
}

impl GatingOutput {
    /// Flatten into an exportable table, one row per gated cell.
    ///
    /// Columns: id, optionally the dataset's metadata columns, one
    /// `<model>.is.pure` column per model, then raw and final consensus.
    /// Metadata is matched by cell id; cells absent from `dataset` get
    /// empty metadata.
    pub fn to_table(&self, dataset: &CellDataset, id_column: &str, keep_metadata: bool) -> OutputTable {
        let models: Vec<&str> = self.purity.models().collect();

        // Purity columns replace same-named input columns.
        let metadata_columns: Vec<&String> = if keep_metadata {
            let derived: Vec<String> = models.iter().map(|m| purity_column(m)).collect();
            dataset
                .column_names
                .iter()
                .filter(|c| !derived.contains(c) && *c != RAW_COLUMN && *c != CONSENSUS_COLUMN)
                .collect()
        } else {
            Vec::new()
        };

        let mut headers = vec![id_column.to_string()];
        headers.extend(metadata_columns.iter().map(|c| c.to_string()));
        headers.extend(models.iter().map(|m| purity_column(m)));
        headers.push(RAW_COLUMN.to_string());
        headers.push(CONSENSUS_COLUMN.to_string());

        let by_id: HashMap<&str, &Cell> = dataset
            .cells
            .iter()
            .map(|cell| (cell.id.as_str(), cell))
            .collect();
        let joined = |values: &[Option<LabelSet>], i: usize| {
            values.get(i).and_then(Option::as_ref).map(LabelSet::join)
        };

        let rows = self
            .purity
            .cell_ids()
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut row = Vec::with_capacity(headers.len());
                row.push(Some(id.clone()));
                let cell = by_id.get(id.as_str());
                for col in &metadata_columns {
                    row.push(
                        cell.and_then(|c| c.metadata.get(*col))
                            .and_then(MetadataValue::as_text),
                    );
                }
                for model in &models {
                    let call = self
                        .purity
                        .get(model)
                        .and_then(|calls| calls.get(i).copied().flatten());
                    row.push(call.map(|c| c.to_string()));
                }
                row.push(joined(&self.consensus.raw, i));
                row.push(joined(&self.consensus.consensus, i));
                row
            })
            .collect();

        OutputTable { headers, rows }
    }
}

/// Resolve the configured models, run them, and build the consensus.
///
/// Every model name is resolved before any classification starts.
pub fn run(
    dataset: &CellDataset,
    config: &GateConfig,
    registry: &ModelRegistry,
    classifier: &dyn PurityClassifier,
) -> Result<GatingOutput, GateError> {
    config.validate()?;
    let models = registry.resolve(&config.models)?;

    let purity = run_models(dataset, &models, classifier, &config.gate_params())?;
    let consensus = aggregate(&purity, &config.consensus_options())?;

    Ok(GatingOutput { purity, consensus })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::gate::PrecomputedCalls;

    fn cell(id: &str, calls: &[(&str, &str)]) -> Cell {
        let mut metadata: BTreeMap<String, MetadataValue> = calls
            .iter()
            .map(|(m, v)| (purity_column(m), MetadataValue::String(v.to_string())))
            .collect();
        metadata.insert("sample".into(), MetadataValue::String("S1".into()));
        Cell {
            id: id.to_string(),
            expression: Vec::new(),
            metadata,
        }
    }

    fn dataset() -> CellDataset {
        CellDataset::from_cells(
            vec![
                cell("c1", &[("Tcell.RM", "Pure"), ("NK.RM", "Pure"), ("Bcell.RM", "Impure")]),
                cell("c2", &[("Tcell.RM", "Pure"), ("NK.RM", "Impure"), ("Bcell.RM", "Pure")]),
                cell("c3", &[("Tcell.RM", "Impure"), ("NK.RM", "Impure"), ("Bcell.RM", "Impure")]),
            ],
            Vec::new(),
        )
    }

    fn config() -> GateConfig {
        GateConfig {
            models: vec!["Tcell.RM".into(), "NK.RM".into(), "Bcell.RM".into()],
            label_rename: [("Tcell.RM", "T_NK"), ("NK.RM", "T_NK"), ("Bcell.RM", "Bcell")]
                .into_iter()
                .collect(),
            drop_ambiguous: true,
            ..Default::default()
        }
    }

    #[test]
    fn run_builds_consensus_from_precomputed_calls() {
        let registry = ModelRegistry::builtin().unwrap();
        let out = run(&dataset(), &config(), &registry, &PrecomputedCalls).unwrap();

        let table = out.to_table(&dataset(), "cell", false);
        assert_eq!(
            table.column(RAW_COLUMN).unwrap(),
            vec![Some("NK.RM,Tcell.RM"), Some("Bcell.RM,Tcell.RM"), None]
        );
        assert_eq!(
            table.column(CONSENSUS_COLUMN).unwrap(),
            vec![Some("T_NK"), None, None]
        );
        assert_eq!(
            table.headers,
            vec![
                "cell",
                "Tcell.RM.is.pure",
                "NK.RM.is.pure",
                "Bcell.RM.is.pure",
                "scGateRaw",
                "scGateConsensus"
            ]
        );
    }

    #[test]
    fn keep_metadata_does_not_duplicate_purity_columns() {
        let registry = ModelRegistry::builtin().unwrap();
        let ds = dataset();
        let out = run(&ds, &config(), &registry, &PrecomputedCalls).unwrap();
        let table = out.to_table(&ds, "cell", true);
        assert_eq!(table.headers[1], "sample");
        assert_eq!(
            table.headers.iter().filter(|h| *h == "NK.RM.is.pure").count(),
            1
        );
    }

    #[test]
    fn table_rows_follow_gated_cells_not_the_passed_dataset() {
        let registry = ModelRegistry::builtin().unwrap();
        let out = run(&dataset(), &config(), &registry, &PrecomputedCalls).unwrap();

        let other = CellDataset::from_cells(vec![cell("c2", &[])], Vec::new());
        let table = out.to_table(&other, "cell", true);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.column("cell").unwrap(), vec![Some("c1"), Some("c2"), Some("c3")]);
        assert_eq!(table.column("sample").unwrap(), vec![None, Some("S1"), None]);
    }

    #[test]
    fn unknown_model_fails_before_classification() {
        let registry = ModelRegistry::builtin().unwrap();
        let mut cfg = config();
        cfg.models.push("Foo.RM".into());
        assert!(matches!(
            run(&dataset(), &cfg, &registry, &PrecomputedCalls),
            Err(GateError::UnknownModel { ref name, .. }) if name == "Foo.RM"
        ));
    }
}
