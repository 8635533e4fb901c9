use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::consensus::LABEL_SEPARATOR;
use crate::error::GateError;

const HEADER: [&str; 4] = ["levels", "use_as", "name", "signature"];

/// Whether a signature selects for or against a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRole {
    Positive,
    Negative,
}

impl FromStr for GateRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(GateRole::Positive),
            "negative" => Ok(GateRole::Negative),
            other => Err(format!("use_as must be 'positive' or 'negative', got '{other}'")),
        }
    }
}

impl fmt::Display for GateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateRole::Positive => write!(f, "positive"),
            GateRole::Negative => write!(f, "negative"),
        }
    }
}

/// A named gene signature. `down` genes count against the score.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl Signature {
    /// Parse `GENE1;GENE2;GENE3-`. A trailing `-` marks a down gene.
    pub fn parse(name: &str, genes: &str) -> Self {
        let mut up = Vec::new();
        let mut down = Vec::new();
        for gene in genes.split(';').map(str::trim).filter(|g| !g.is_empty()) {
            match gene.strip_suffix('-') {
                Some(g) if !g.is_empty() => down.push(g.to_string()),
                _ => up.push(gene.to_string()),
            }
        }
        Signature {
            name: name.to_string(),
            up,
            down,
        }
    }

    fn encode(&self) -> String {
        self.up
            .iter()
            .cloned()
            .chain(self.down.iter().map(|g| format!("{g}-")))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// One level of a hierarchical gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateLevel {
    pub name: String,
    pub positive: Vec<Signature>,
    pub negative: Vec<Signature>,
}

/// A validated gate model: levels are applied in order.
#[derive(Debug, Clone, PartialEq)]
pub struct GateModel {
    pub name: String,
    pub levels: Vec<GateLevel>,
}

impl GateModel {
    /// Parse a tab-separated gate table with header
    /// `levels  use_as  name  signature`. Lines starting with `#` are ignored.
    pub fn parse(model: &str, text: &str) -> Result<Self, GateError> {
        let invalid = |reason: String| GateError::invalid_model(model, reason);
        if model.contains(LABEL_SEPARATOR) {
            return Err(invalid(format!("name may not contain '{LABEL_SEPARATOR}'")));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| invalid(format!("reading header: {e}")))?
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();

        let mut idx = [0usize; 4];
        for (slot, want) in idx.iter_mut().zip(HEADER) {
            *slot = headers
                .iter()
                .position(|h| h == want)
                .ok_or_else(|| invalid(format!("missing column '{want}'")))?;
        }
        let [level_idx, role_idx, name_idx, sig_idx] = idx;

        let mut levels: Vec<GateLevel> = Vec::new();
        for (row_no, record) in reader.records().enumerate() {
            let record = record.map_err(|e| invalid(format!("row {row_no}: {e}")))?;
            let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");

            let level_name = field(level_idx);
            if level_name.is_empty() {
                return Err(invalid(format!("row {row_no}: empty level")));
            }
            let role: GateRole = field(role_idx)
                .parse()
                .map_err(|e| invalid(format!("row {row_no}: {e}")))?;
            let signature = Signature::parse(field(name_idx), field(sig_idx));
            if signature.up.is_empty() && signature.down.is_empty() {
                return Err(invalid(format!("row {row_no}: empty signature")));
            }

            let level = match levels.iter().position(|l| l.name == level_name) {
                Some(i) => &mut levels[i],
                None => {
                    levels.push(GateLevel {
                        name: level_name.to_string(),
                        positive: Vec::new(),
                        negative: Vec::new(),
                    });
                    let last = levels.len() - 1;
                    &mut levels[last]
                }
            };
            match role {
                GateRole::Positive => level.positive.push(signature),
                GateRole::Negative => level.negative.push(signature),
            }
        }

        if levels.is_empty() {
            return Err(invalid("no gate rows".to_string()));
        }
        if let Some(level) = levels.iter().find(|l| l.positive.is_empty()) {
            return Err(invalid(format!(
                "level '{}' has no positive signature",
                level.name
            )));
        }

        Ok(GateModel {
            name: model.to_string(),
            levels,
        })
    }

    /// Every gene referenced by the model.
    pub fn genes(&self) -> BTreeSet<&str> {
        self.levels
            .iter()
            .flat_map(|l| l.positive.iter().chain(l.negative.iter()))
            .flat_map(|s| s.up.iter().chain(s.down.iter()))
            .map(String::as_str)
            .collect()
    }

    /// Render back to the tab-separated gate table format.
    pub fn to_table(&self) -> String {
        let mut out = HEADER.join("\t");
        out.push('\n');
        for level in &self.levels {
            let rows = level
                .positive
                .iter()
                .map(|s| (GateRole::Positive, s))
                .chain(level.negative.iter().map(|s| (GateRole::Negative, s)));
            for (role, sig) in rows {
                out.push_str(&format!(
                    "{}\t{}\t{}\t{}\n",
                    level.name,
                    role,
                    sig.name,
                    sig.encode()
                ));
            }
        }
        out
    }
}
