use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

// ---------------------------------------------------------------------------
// OutputTable – string columns ready for export
// ---------------------------------------------------------------------------

/// A rectangular table of nullable text values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl OutputTable {
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.headers.iter().position(|h| h == name)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).and_then(|v| v.as_deref()))
                .collect(),
        )
    }
}

/// Write a table to a file.  Dispatch by extension (`.csv`, `.tsv`,
/// `.json`, `.parquet`).
pub fn write_table(table: &OutputTable, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let open = || {
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))
    };

    match ext.as_str() {
        "csv" => write_delimited(table, open()?, b','),
        "tsv" | "txt" => write_delimited(table, open()?, b'\t'),
        "json" => write_json(table, open()?),
        "parquet" | "pq" => write_parquet(table, open()?),
        other => bail!("Unsupported output extension: .{other}"),
    }
}

/// Nulls are written as `NA`.
pub fn write_delimited<W: Write>(table: &OutputTable, writer: W, delimiter: u8) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    wtr.write_record(&table.headers).context("writing header")?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|v| v.as_deref().unwrap_or("NA")))
            .context("writing row")?;
    }
    wtr.flush().context("flushing table")?;
    Ok(())
}

/// Records-oriented JSON array; nulls stay `null`.
pub fn write_json<W: Write>(table: &OutputTable, writer: W) -> Result<()> {
    let records: Vec<JsonValue> = table
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            for (h, v) in table.headers.iter().zip(row) {
                let value = match v {
                    Some(s) => JsonValue::String(s.clone()),
                    None => JsonValue::Null,
                };
                obj.insert(h.clone(), value);
            }
            JsonValue::Object(obj)
        })
        .collect();
    serde_json::to_writer_pretty(writer, &records).context("writing JSON")?;
    Ok(())
}

fn write_parquet(table: &OutputTable, file: std::fs::File) -> Result<()> {
    let schema = Arc::new(Schema::new(
        table
            .headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let columns: Vec<ArrayRef> = (0..table.headers.len())
        .map(|idx| {
            let values: StringArray = table
                .rows
                .iter()
                .map(|r| r.get(idx).and_then(|v| v.as_deref()))
                .collect();
            Arc::new(values) as ArrayRef
        })
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
