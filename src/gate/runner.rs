use log::{error, info};

use super::classifier::{GateParams, PurityClassifier};
use super::model::GateModel;
use crate::calls::PurityTable;
use crate::data::model::CellDataset;
use crate::error::GateError;

/// Run every model once against the dataset and collect the calls.
///
/// A failing model aborts the run; it is not retried.
pub fn run_models(
    dataset: &CellDataset,
    models: &[&GateModel],
    classifier: &dyn PurityClassifier,
    params: &GateParams,
) -> Result<PurityTable, GateError> {
    if dataset.is_empty() {
        return Err(GateError::EmptyDataset);
    }

    let mut table = PurityTable::new(dataset.cell_ids());
    for model in models {
        let calls = classifier.classify(dataset, model, params).map_err(|e| {
            error!("{} failed on model {}: {e}", classifier.name(), model.name);
            e
        })?;
        table.insert(&model.name, calls)?;
        info!(
            "{}: {} of {} cells pure",
            model.name,
            table.pure_count(&model.name),
            dataset.len()
        );
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::*;
    use crate::calls::Purity;
    use crate::data::model::Cell;

    /// Calls every cell pure and remembers which models it saw.
    #[derive(Default)]
    struct Recording {
        seen: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl PurityClassifier for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn classify(
            &self,
            dataset: &CellDataset,
            model: &GateModel,
            _params: &GateParams,
        ) -> Result<Vec<Option<Purity>>, GateError> {
            self.seen.borrow_mut().push(model.name.clone());
            if self.fail_on == Some(model.name.as_str()) {
                return Err(GateError::Configuration("boom".into()));
            }
            Ok(vec![Some(Purity::Pure); dataset.len()])
        }
    }

    fn model(name: &str) -> GateModel {
        GateModel::parse(name, "levels\tuse_as\tname\tsignature\nl1\tpositive\tX\tCD3E\n").unwrap()
    }

    fn dataset() -> CellDataset {
        let cells = ["c1", "c2"]
            .iter()
            .map(|id| Cell {
                id: id.to_string(),
                expression: Vec::new(),
                metadata: BTreeMap::new(),
            })
            .collect();
        CellDataset::from_cells(cells, Vec::new())
    }

    #[test]
    fn runs_each_model_once_in_order() {
        let (a, b) = (model("A"), model("B"));
        let classifier = Recording::default();
        let table = run_models(&dataset(), &[&a, &b], &classifier, &GateParams::default()).unwrap();

        assert_eq!(*classifier.seen.borrow(), vec!["A", "B"]);
        assert_eq!(table.models().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(table.pure_count("B"), 2);
    }

    #[test]
    fn failure_stops_the_run() {
        let (a, b) = (model("A"), model("B"));
        let classifier = Recording {
            fail_on: Some("A"),
            ..Default::default()
        };
        let err = run_models(&dataset(), &[&a, &b], &classifier, &GateParams::default());
        assert!(err.is_err());
        assert_eq!(*classifier.seen.borrow(), vec!["A"]);
    }

    #[test]
    fn empty_dataset_is_an_error() {
        let ds = CellDataset::from_cells(Vec::new(), Vec::new());
        let a = model("A");
        assert_eq!(
            run_models(&ds, &[&a], &Recording::default(), &GateParams::default()),
            Err(GateError::EmptyDataset)
        );
    }
}
