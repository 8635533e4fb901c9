//! Rank-based signature scores (Mann-Whitney U statistic over per-cell gene
//! ranks, as in UCell).

use std::collections::{HashMap, HashSet};

use log::debug;

use super::model::Signature;

/// Gene ranks of one cell. Rank 1 is the highest expressed gene; genes
/// with zero expression or ranked past `max_rank` share `max_rank + 1`.
#[derive(Debug, Clone)]
pub struct CellRanks {
    ranks: Vec<usize>,
    max_rank: usize,
}

impl CellRanks {
    pub fn new(expression: &[f64], max_rank: usize) -> Self {
        let unranked = max_rank.saturating_add(1);
        let mut order: Vec<usize> = (0..expression.len())
            .filter(|&i| expression[i] > 0.0)
            .collect();
        // stable sort keeps matrix order among ties
        order.sort_by(|&a, &b| expression[b].total_cmp(&expression[a]));

        let mut ranks = vec![unranked; expression.len()];
        for (pos, &gene) in order.iter().take(max_rank).enumerate() {
            ranks[gene] = pos + 1;
        }
        CellRanks { ranks, max_rank }
    }

    pub fn rank(&self, gene: usize) -> usize {
        self.ranks[gene]
    }

    /// U-statistic score of a gene set in `[0, 1]`: 1 when the set holds
    /// the top ranks, 0 when none of its genes is ranked or the set is empty.
    pub fn score(&self, genes: &[usize]) -> f64 {
        let n = genes.len() as f64;
        if genes.is_empty() {
            return 0.0;
        }
        let rank_sum: f64 = genes.iter().map(|&g| self.rank(g) as f64).sum();
        let u = rank_sum - n * (n + 1.0) / 2.0;
        let u_max = n * (self.max_rank as f64 + 1.0) - n * (n + 1.0) / 2.0;
        if u_max <= 0.0 {
            return 0.0;
        }
        (1.0 - u / u_max).clamp(0.0, 1.0)
    }
}

/// A signature with gene symbols resolved to matrix columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSignature {
    pub name: String,
    pub up: Vec<usize>,
    pub down: Vec<usize>,
}

impl ResolvedSignature {
    /// Drop genes missing from the matrix or on the blocklist.
    pub fn resolve(
        signature: &Signature,
        gene_index: &HashMap<&str, usize>,
        blocklist: &HashSet<String>,
    ) -> Self {
        let lookup = |genes: &[String]| -> Vec<usize> {
            genes
                .iter()
                .filter_map(|g| {
                    if blocklist.contains(g) {
                        debug!("signature {}: {g} is blocklisted", signature.name);
                        return None;
                    }
                    let idx = gene_index.get(g.as_str()).copied();
                    if idx.is_none() {
                        debug!("signature {}: {g} not in expression matrix", signature.name);
                    }
                    idx
                })
                .collect()
        };
        ResolvedSignature {
            name: signature.name.clone(),
            up: lookup(&signature.up),
            down: lookup(&signature.down),
        }
    }

    /// `max(0, up - down)`.
    pub fn score(&self, ranks: &CellRanks) -> f64 {
        if self.up.is_empty() {
            return 0.0;
        }
        let up = ranks.score(&self.up);
        let down = if self.down.is_empty() {
            0.0
        } else {
            ranks.score(&self.down)
        };
        (up - down).max(0.0)
    }
}
