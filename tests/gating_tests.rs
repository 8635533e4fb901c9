//! Integration tests: fixture tables through loading, gating and consensus

use std::path::PathBuf;

use cellgate::data::{loader, writer};
use cellgate::pipeline::{CONSENSUS_COLUMN, RAW_COLUMN};
use cellgate::{
    run, GateConfig, GateError, MetadataValue, ModelRegistry, PrecomputedCalls, Purity,
    SignatureGate,
};

fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename)
}

fn consensus_of(table: &writer::OutputTable, column: &str) -> Vec<Option<String>> {
    table
        .column(column)
        .expect("column present")
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

fn some(s: &str) -> Option<String> {
    Some(s.to_string())
}

#[test]
fn signature_gating_labels_lineages() {
    let dataset = loader::load_dataset(Some(&fixture_path("expression.csv")), None, "cell")
        .expect("fixture loads");
    let config = GateConfig::from_file(&fixture_path("gate_config.json")).expect("config loads");
    let registry = config.registry().unwrap();

    let output = run(&dataset, &config, &registry, &SignatureGate).expect("gating succeeds");

    assert_eq!(output.purity.get("Tcell.RM").unwrap()[0], Some(Purity::Pure));
    assert_eq!(output.purity.get("Bcell.RM").unwrap()[0], Some(Purity::Impure));
    // no stromal marker is in the matrix
    assert_eq!(output.purity.pure_count("Stromal.RM"), 0);

    let table = output.to_table(&dataset, "cell", false);
    assert_eq!(
        consensus_of(&table, CONSENSUS_COLUMN),
        vec![
            some("T_NK"),
            some("T_NK"),
            some("Bcell"),
            some("Bcell"),
            some("T_NK"),
            some("Myeloid"),
            None,
            None,
        ]
    );
    assert_eq!(consensus_of(&table, RAW_COLUMN)[4], some("NK.RM"));
    assert_eq!(
        output.consensus.levels.iter().map(|l| l.join()).collect::<Vec<_>>(),
        vec!["Bcell", "Myeloid", "T_NK"]
    );
}

#[test]
fn precomputed_calls_merge_and_drop_ambiguous() {
    let dataset =
        loader::load_dataset(None, Some(&fixture_path("calls.tsv")), "cell").expect("fixture loads");
    let config = GateConfig {
        models: ["Bcell.RM", "Tcell.RM", "NK.RM", "Myeloid.RM"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ..GateConfig::rhesus()
    };
    let registry = config.registry().unwrap();

    let output = run(&dataset, &config, &registry, &PrecomputedCalls).expect("run succeeds");
    let table = output.to_table(&dataset, "cell", true);

    assert_eq!(
        consensus_of(&table, RAW_COLUMN),
        vec![
            some("NK.RM,Tcell.RM"),
            some("Bcell.RM"),
            some("Bcell.RM,Tcell.RM"),
            some("Myeloid.RM"),
            None,
            None,
            some("Myeloid.RM,Tcell.RM"),
        ]
    );
    assert_eq!(
        consensus_of(&table, CONSENSUS_COLUMN),
        vec![some("T_NK"), some("Bcell"), None, some("Myeloid"), None, None, None]
    );
    assert_eq!(output.consensus.dropped.len(), 2);
    assert!(table.headers.contains(&"sample".to_string()));
    // NA in the input stays undefined
    assert_eq!(output.purity.get("Bcell.RM").unwrap()[4], None);
}

#[test]
fn consensus_subset_changes_raw_labels() {
    let dataset =
        loader::load_dataset(None, Some(&fixture_path("calls.tsv")), "cell").expect("fixture loads");
    let config = GateConfig {
        models: vec!["Bcell.RM".into(), "Tcell.RM".into(), "Myeloid.RM".into()],
        consensus_models: Some(vec!["Myeloid.RM".into()]),
        ..Default::default()
    };
    let registry = ModelRegistry::builtin().unwrap();
    let output = run(&dataset, &config, &registry, &PrecomputedCalls).unwrap();

    let labeled: Vec<usize> = output
        .consensus
        .consensus
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_some())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(labeled, vec![3, 6]);
}

#[test]
fn missing_purity_column_is_reported() {
    let dataset =
        loader::load_dataset(None, Some(&fixture_path("calls.tsv")), "cell").expect("fixture loads");
    let config = GateConfig {
        models: vec!["Bcell.RM".into(), "pDC.RM".into()],
        ..Default::default()
    };
    let registry = ModelRegistry::builtin().unwrap();
    assert_eq!(
        run(&dataset, &config, &registry, &PrecomputedCalls).unwrap_err(),
        GateError::MissingColumn("pDC.RM.is.pure".into())
    );
}

#[test]
fn metadata_joins_onto_expression() {
    let dataset = loader::load_dataset(
        Some(&fixture_path("expression.csv")),
        Some(&fixture_path("sample_metadata.json")),
        "cell",
    )
    .unwrap();
    assert_eq!(dataset.len(), 8);
    let sample = dataset.column("sample").unwrap();
    assert_eq!(sample[0], &MetadataValue::String("S1".into()));
    assert_eq!(sample[1], &MetadataValue::Null);
    assert_eq!(sample[2], &MetadataValue::String("S2".into()));
}

#[test]
fn model_dir_adds_custom_gates() {
    let dataset = loader::load_dataset(Some(&fixture_path("expression.csv")), None, "cell").unwrap();
    let config = GateConfig {
        models: vec!["CD8T".into(), "Tcell.RM".into()],
        model_dirs: vec![fixture_path("models")],
        min_cells: 1,
        ..Default::default()
    };
    let registry = config.registry().unwrap();
    assert!(registry.get("CD8T").is_ok());

    let output = run(&dataset, &config, &registry, &SignatureGate).unwrap();
    // CD8A/CD8B are absent, so the third level rejects every T cell
    assert_eq!(output.purity.pure_count("CD8T"), 0);
    assert_eq!(output.consensus.consensus[0].as_ref().map(|l| l.join()), some("Tcell.RM"));
}

#[test]
fn written_table_reads_back() {
    let dataset =
        loader::load_dataset(None, Some(&fixture_path("calls.tsv")), "cell").expect("fixture loads");
    let config = GateConfig {
        models: vec!["Bcell.RM".into(), "Tcell.RM".into()],
        ..Default::default()
    };
    let registry = ModelRegistry::builtin().unwrap();
    let output = run(&dataset, &config, &registry, &PrecomputedCalls).unwrap();
    let table = output.to_table(&dataset, "cell", false);

    let path = std::env::temp_dir().join(format!("cellgate-{}.tsv", std::process::id()));
    writer::write_table(&table, &path).unwrap();
    let back = loader::read_table(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(back.headers, table.headers);
    assert_eq!(back.rows.len(), table.rows.len());
    assert_eq!(back.rows[2][3], MetadataValue::String("Bcell.RM,Tcell.RM".into()));
    assert_eq!(back.rows[4][3], MetadataValue::Null);
}
