use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Cell, CellDataset, MetadataValue};

// ---------------------------------------------------------------------------
// Raw tables
// ---------------------------------------------------------------------------

/// A parsed table before column roles (id / gene / metadata) are assigned.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<MetadataValue>>,
}

impl RawTable {
    fn column_index(&self, name: &str, source: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("{source}: missing id column '{name}'"))
    }
}

/// Read a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` / `.pq` – flat columns, one row per cell (recommended)
/// * `.json`            – `[{ "cell": "AAAC-1", "CD3E": 2.0, ... }, ...]`
/// * `.csv`             – comma separated with a header row
/// * `.tsv` / `.txt`    – tab separated with a header row
pub fn read_table(path: &Path) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => read_parquet(path),
        "json" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            read_json_records(&text)
        }
        "csv" => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            read_delimited(file, b',')
        }
        "tsv" | "txt" => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            read_delimited(file, b'\t')
        }
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load an expression matrix and/or a metadata table into one dataset.
///
/// When both are given the expression matrix defines the cells and their
/// order; metadata rows are joined by cell id.
pub fn load_dataset(
    expression: Option<&Path>,
    metadata: Option<&Path>,
    id_column: &str,
) -> Result<CellDataset> {
    let dataset = match (expression, metadata) {
        (Some(expr), Some(meta)) => {
            let expr = load_expression(expr, id_column)?;
            let meta = load_metadata(meta, id_column)?;
            CellDataset::join_metadata(expr, meta)
        }
        (Some(expr), None) => load_expression(expr, id_column)?,
        (None, Some(meta)) => load_metadata(meta, id_column)?,
        (None, None) => bail!("need an expression matrix or a metadata table"),
    };
    info!(
        "loaded {} cells, {} genes, {} metadata columns",
        dataset.len(),
        dataset.genes.len(),
        dataset.column_names.len()
    );
    Ok(dataset)
}

/// Load a cell × gene expression matrix.
pub fn load_expression(path: &Path, id_column: &str) -> Result<CellDataset> {
    let table = read_table(path)?;
    expression_from_table(&table, id_column, &path.display().to_string())
}

/// Load a per-cell metadata table.
pub fn load_metadata(path: &Path, id_column: &str) -> Result<CellDataset> {
    let table = read_table(path)?;
    metadata_from_table(table, id_column, &path.display().to_string())
}

/// Interpret a raw table as an expression matrix: the id column plus one
/// numeric column per gene. Nulls read as zero.
pub fn expression_from_table(table: &RawTable, id_column: &str, source: &str) -> Result<CellDataset> {
    let id_idx = table.column_index(id_column, source)?;
    let genes: Vec<String> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != id_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let mut seen = HashSet::new();
    let mut cells = Vec::with_capacity(table.rows.len());

    for (row_no, row) in table.rows.iter().enumerate() {
        let id = cell_id(row, id_idx, row_no, source)?;
        if !seen.insert(id.clone()) {
            bail!("{source}: duplicate cell id '{id}' at row {row_no}");
        }

        let mut expression = Vec::with_capacity(genes.len());
        for (col_idx, value) in row.iter().enumerate() {
            if col_idx == id_idx {
                continue;
            }
            let level = value.as_f64().with_context(|| {
                format!(
                    "{source}: row {row_no}, column '{}': '{value}' is not a number",
                    table.headers[col_idx]
                )
            })?;
            expression.push(level);
        }

        cells.push(Cell {
            id,
            expression,
            metadata: BTreeMap::new(),
        });
    }

    Ok(CellDataset::from_cells(cells, genes))
}

/// Interpret a raw table as cell metadata: the id column plus arbitrary
/// typed columns.
pub fn metadata_from_table(table: RawTable, id_column: &str, source: &str) -> Result<CellDataset> {
    let id_idx = table.column_index(id_column, source)?;
    let mut seen = HashSet::new();
    let mut cells = Vec::with_capacity(table.rows.len());

    for (row_no, row) in table.rows.into_iter().enumerate() {
        let id = cell_id(&row, id_idx, row_no, source)?;
        if !seen.insert(id.clone()) {
            bail!("{source}: duplicate cell id '{id}' at row {row_no}");
        }

        let metadata = row
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i != id_idx)
            .map(|(i, v)| (table.headers[i].clone(), v))
            .collect();

        cells.push(Cell {
            id,
            expression: Vec::new(),
            metadata,
        });
    }

    Ok(CellDataset::from_cells(cells, Vec::new()))
}

fn cell_id(row: &[MetadataValue], id_idx: usize, row_no: usize, source: &str) -> Result<String> {
    match row.get(id_idx) {
        Some(MetadataValue::Null) | None => bail!("{source}: row {row_no} has no cell id"),
        Some(v) => Ok(v.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "cell": "AAACCTG-1", "CD3E": 2.3, "MS4A1": 0.0 },
///   ...
/// ]
/// ```
pub fn read_json_records(text: &str) -> Result<RawTable> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map(json_to_metadata).unwrap_or(MetadataValue::Null))
                .collect()
        })
        .collect();

    Ok(RawTable { headers, rows })
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV / TSV loader
// ---------------------------------------------------------------------------

/// Header row with column names, one row per cell.
pub fn read_delimited<R: Read>(reader: R, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .context("reading headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        rows.push(record.iter().map(guess_metadata_type).collect());
    }

    Ok(RawTable { headers, rows })
}

/// Typed value for a text field. Numbers are only typed when they print
/// back as the same text, so `001` or `1.50` stay strings.
pub(crate) fn guess_metadata_type(s: &str) -> MetadataValue {
    let s = s.trim();
    if s.is_empty() || s == "NA" {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        if i.to_string() == s {
            return MetadataValue::Integer(i);
        }
    } else if let Ok(f) = s.parse::<f64>() {
        if f.to_string() == s {
            return MetadataValue::Float(f);
        }
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per gene / metadata field.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn read_parquet(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_metadata_value(col, row))
                    .collect(),
            );
        }
    }

    Ok(RawTable { headers, rows })
}

/// Extract a single value from an Arrow column at a given row.
fn extract_metadata_value(col: &ArrayRef, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => MetadataValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => MetadataValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => MetadataValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => MetadataValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => MetadataValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => MetadataValue::Bool(col.as_boolean().value(row)),
        other => MetadataValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_expression_matrix() {
        let text = "cell\tCD3E\tMS4A1\nc1\t2.5\t0\nc2\t\t3\n";
        let table = read_delimited(text.as_bytes(), b'\t').unwrap();
        let ds = expression_from_table(&table, "cell", "test").unwrap();

        assert_eq!(ds.genes, vec!["CD3E", "MS4A1"]);
        assert_eq!(ds.cells[0].expression, vec![2.5, 0.0]);
        // empty field reads as zero
        assert_eq!(ds.cells[1].expression, vec![0.0, 3.0]);
    }

    #[test]
    fn non_numeric_expression_is_rejected() {
        let text = "cell,CD3E\nc1,high\n";
        let table = read_delimited(text.as_bytes(), b',').unwrap();
        let err = expression_from_table(&table, "cell", "test").unwrap_err();
        assert!(err.to_string().contains("CD3E"));
    }

    #[test]
    fn duplicate_cell_ids_are_rejected() {
        let text = "cell,CD3E\nc1,1\nc1,2\n";
        let table = read_delimited(text.as_bytes(), b',').unwrap();
        assert!(expression_from_table(&table, "cell", "test").is_err());
    }

    #[test]
    fn missing_id_column() {
        let text = "barcode,CD3E\nc1,1\n";
        let table = read_delimited(text.as_bytes(), b',').unwrap();
        let err = metadata_from_table(table, "cell", "meta.csv").unwrap_err();
        assert!(err.to_string().contains("missing id column 'cell'"));
    }

    #[test]
    fn json_metadata_guesses_types() {
        let text = r#"[
            {"cell": "c1", "Bcell.RM.is.pure": "Pure", "nCount": 1200},
            {"cell": "c2", "Bcell.RM.is.pure": null}
        ]"#;
        let table = read_json_records(text).unwrap();
        let ds = metadata_from_table(table, "cell", "test").unwrap();

        let col = ds.column("Bcell.RM.is.pure").unwrap();
        assert_eq!(col[0], &MetadataValue::String("Pure".into()));
        assert_eq!(col[1], &MetadataValue::Null);
        assert_eq!(
            ds.cells[0].metadata.get("nCount"),
            Some(&MetadataValue::Integer(1200))
        );
        assert_eq!(ds.cells[1].metadata.get("nCount"), Some(&MetadataValue::Null));
    }

    #[test]
    fn na_and_blank_are_null() {
        assert_eq!(guess_metadata_type("NA"), MetadataValue::Null);
        assert_eq!(guess_metadata_type(" "), MetadataValue::Null);
        assert_eq!(guess_metadata_type("0.5"), MetadataValue::Float(0.5));
        assert_eq!(guess_metadata_type("Pure"), MetadataValue::String("Pure".into()));
    }

    #[test]
    fn number_like_text_keeps_its_formatting() {
        assert_eq!(guess_metadata_type("001"), MetadataValue::String("001".into()));
        assert_eq!(guess_metadata_type("1.50"), MetadataValue::String("1.50".into()));
        assert_eq!(guess_metadata_type("42"), MetadataValue::Integer(42));
        assert_eq!(guess_metadata_type("-3.25"), MetadataValue::Float(-3.25));
    }

    #[test]
    fn zero_padded_ids_stay_distinct() {
        let text = "cell,CD3E,sample\n001,1.50,07\n1,2,7\n01,0,1.0\n";
        let table = read_delimited(text.as_bytes(), b',').unwrap();
        let expr = expression_from_table(&table, "cell", "t").unwrap();
        assert_eq!(expr.cell_ids(), vec!["001", "1", "01"]);
        assert_eq!(expr.cells[0].expression, vec![1.5, 7.0]);

        let meta = metadata_from_table(table, "cell", "t").unwrap();
        let sample: Vec<Option<String>> = meta
            .column("sample")
            .unwrap()
            .into_iter()
            .map(MetadataValue::as_text)
            .collect();
        assert_eq!(
            sample,
            vec![Some("07".into()), Some("7".into()), Some("1.0".into())]
        );
    }
}
