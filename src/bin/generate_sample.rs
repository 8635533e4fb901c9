use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Dropout-prone count: zero with probability `dropout`, otherwise a
    /// level around `mean`.
    fn count(&mut self, mean: f64, dropout: f64) -> f64 {
        if self.next_f64() < dropout {
            0.0
        } else {
            (mean * (0.5 + self.next_f64())).round()
        }
    }
}

/// Background genes shared by every cell type.
const HOUSEKEEPING: [&str; 6] = ["ACTB", "GAPDH", "B2M", "MALAT1", "RPL13", "RPS27"];

fn main() {
    let mut rng = SimpleRng::new(42);

    // (cell type, number of cells, marker genes)
    let populations: Vec<(&str, usize, Vec<&str>)> = vec![
        ("Bcell", 40, vec!["PTPRC", "MS4A1", "CD79A", "CD79B", "BANK1", "CD19"]),
        ("Tcell", 60, vec!["PTPRC", "CD3E", "CD3D", "CD3G", "CD2"]),
        ("NK", 30, vec!["PTPRC", "NKG7", "GNLY", "KLRD1", "KLRF1"]),
        ("Myeloid", 40, vec!["PTPRC", "LYZ", "CD14", "CSF1R", "CD68", "FCGR3A"]),
        ("Stromal", 15, vec!["COL1A1", "COL1A2", "COL3A1", "DCN", "LUM"]),
        ("Doublet", 10, vec!["PTPRC", "CD3E", "CD3D", "MS4A1", "CD79A"]),
    ];

    let mut genes: Vec<&str> = HOUSEKEEPING.to_vec();
    for (_, _, markers) in &populations {
        for g in markers {
            if !genes.contains(g) {
                genes.push(g);
            }
        }
    }

    let mut cell_ids: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); genes.len()];

    for (cell_type, n, markers) in &populations {
        for i in 0..*n {
            cell_ids.push(format!("{cell_type}_{i:03}"));
            for (g, gene) in genes.iter().enumerate() {
                let value = if markers.contains(gene) {
                    rng.count(8.0, 0.15)
                } else if HOUSEKEEPING.contains(gene) {
                    rng.count(30.0, 0.0)
                } else {
                    rng.count(1.0, 0.95)
                };
                columns[g].push(value);
            }
        }
    }

    let mut fields = vec![Field::new("cell", DataType::Utf8, false)];
    fields.extend(genes.iter().map(|g| Field::new(*g, DataType::Float64, false)));
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(cell_ids.clone()))];
    arrays.extend(
        columns
            .into_iter()
            .map(|values| Arc::new(Float64Array::from(values)) as ArrayRef),
    );

    let batch = RecordBatch::try_new(schema.clone(), arrays).expect("Failed to create RecordBatch");

    // Write Parquet
    let output_path = "sample_expression.parquet";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {} cells ({} genes each) to {output_path}",
        cell_ids.len(),
        genes.len()
    );
}
