use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use log::warn;

use crate::error::GateError;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value as found in exported cell tables.
/// Using `BTreeMap` / `BTreeSet` downstream so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put MetadataValue in BTreeSet --

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "NA"),
        }
    }
}

impl MetadataValue {
    /// Interpret the value as an expression level. Nulls count as zero;
    /// numeric text such as `1.50` parses.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Null => Some(0.0),
            MetadataValue::String(s) => s.trim().parse().ok(),
            MetadataValue::Bool(_) => None,
        }
    }

    /// Text form for output tables; `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            MetadataValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Cell – one row of the expression / metadata tables
// ---------------------------------------------------------------------------

/// A single cell (one row of the source tables).
#[derive(Debug, Clone)]
pub struct Cell {
    /// Cell barcode / identifier.
    pub id: String,
    /// Expression values, aligned with `CellDataset::genes`. Empty for
    /// metadata-only datasets.
    pub expression: Vec<f64>,
    /// Dynamic metadata columns: column_name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

// ---------------------------------------------------------------------------
// CellDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset with pre-computed column indices.
#[derive(Debug, Clone)]
pub struct CellDataset {
    /// All cells (rows).
    pub cells: Vec<Cell>,
    /// Gene symbols of the expression matrix, in column order.
    pub genes: Vec<String>,
    /// Ordered list of metadata column names.
    pub column_names: Vec<String>,
    /// For each metadata column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<MetadataValue>>,
}

impl CellDataset {
    /// Build column indices from the loaded cells.
    pub fn from_cells(cells: Vec<Cell>, genes: Vec<String>) -> Self {
        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut unique_values: BTreeMap<String, BTreeSet<MetadataValue>> = BTreeMap::new();

        for cell in &cells {
            for (col, val) in &cell.metadata {
                column_names_set.insert(col.clone());
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        let column_names: Vec<String> = column_names_set.into_iter().collect();
        CellDataset {
            cells,
            genes,
            column_names,
            unique_values,
        }
    }

    /// Attach metadata rows to the cells of an expression dataset by id.
    ///
    /// The expression dataset defines the cell set and order. Cells with no
    /// metadata row get nulls in every metadata column.
    pub fn join_metadata(expression: CellDataset, metadata: CellDataset) -> Self {
        let columns = metadata.column_names.clone();
        let mut by_id: HashMap<String, BTreeMap<String, MetadataValue>> = metadata
            .cells
            .into_iter()
            .map(|c| (c.id, c.metadata))
            .collect();

        let mut missing = 0usize;
        let cells: Vec<Cell> = expression
            .cells
            .into_iter()
            .map(|mut cell| {
                match by_id.remove(&cell.id) {
                    Some(meta) => cell.metadata.extend(meta),
                    None => {
                        missing += 1;
                        for col in &columns {
                            cell.metadata.insert(col.clone(), MetadataValue::Null);
                        }
                    }
                }
                cell
            })
            .collect();

        if missing > 0 {
            warn!("{missing} cells have no metadata row");
        }
        if !by_id.is_empty() {
            warn!(
                "{} metadata rows do not match any cell in the expression matrix",
                by_id.len()
            );
        }

        CellDataset::from_cells(cells, expression.genes)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether an expression matrix was loaded.
    pub fn has_expression(&self) -> bool {
        !self.genes.is_empty()
    }

    /// Cell identifiers in row order.
    pub fn cell_ids(&self) -> Vec<String> {
        self.cells.iter().map(|c| c.id.clone()).collect()
    }

    /// Values of one metadata column in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&MetadataValue>, GateError> {
        if !self.unique_values.contains_key(name) {
            return Err(GateError::MissingColumn(name.to_string()));
        }
        Ok(self
            .cells
            .iter()
            .map(|c| c.metadata.get(name).unwrap_or(&MetadataValue::Null))
            .collect())
    }

    /// Map gene symbol → column index.
    pub fn gene_index(&self) -> HashMap<&str, usize> {
        self.genes
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(id: &str, meta: &[(&str, MetadataValue)]) -> Cell {
        Cell {
            id: id.to_string(),
            expression: Vec::new(),
            metadata: meta
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn join_keeps_expression_order_and_fills_nulls() {
        let expr = CellDataset::from_cells(
            vec![
                Cell {
                    id: "c1".into(),
                    expression: vec![1.0],
                    metadata: BTreeMap::new(),
                },
                Cell {
                    id: "c2".into(),
                    expression: vec![2.0],
                    metadata: BTreeMap::new(),
                },
            ],
            vec!["CD3E".into()],
        );
        let meta = CellDataset::from_cells(
            vec![cell("c2", &[("sample", MetadataValue::String("A".into()))])],
            Vec::new(),
        );

        let joined = CellDataset::join_metadata(expr, meta);
        assert_eq!(joined.cell_ids(), vec!["c1", "c2"]);
        let sample = joined.column("sample").unwrap();
        assert_eq!(sample[0], &MetadataValue::Null);
        assert_eq!(sample[1], &MetadataValue::String("A".into()));
        assert!(joined.has_expression());
    }

    #[test]
    fn missing_column_is_reported() {
        let ds = CellDataset::from_cells(vec![cell("c1", &[])], Vec::new());
        assert_eq!(
            ds.column("Bcell.RM.is.pure"),
            Err(GateError::MissingColumn("Bcell.RM.is.pure".into()))
        );
    }
}
