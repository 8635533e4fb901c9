/// Data layer: core types, loading, and export.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv / .tsv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → CellDataset (expression ⋈ metadata)
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ CellDataset │  Vec<Cell>, gene list, column index
///   └─────────────┘
///        │   gating + consensus
///        ▼
///   ┌──────────┐
///   │  writer   │  OutputTable → .csv / .tsv / .json / .parquet
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
