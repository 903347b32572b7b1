// ========================================================================================
//
//                         THE PAIRWISE IMPLICATION STATISTIC
//
// ========================================================================================
//
// For two genes A and B the statistic is computed over the samples where BOTH genes
// are confidently classified, as a 2×2 table:
//
//                 B low    B high
//       A low      c0        c1
//       A high     c2        c3
//
// A Boolean implication shows up as a cell that is far emptier than its marginals
// predict. Each cell gets a continuity-corrected residual
//
//       res[k] = (row_k · col_k / total − c_k + 1) / sqrt(row_k · col_k / total + 1)
//
// and, when the residual clears `stat_threshold`, an error score
//
//       score[k] = ½ · c_k / (c_k + row partner + 1) + ½ · c_k / (c_k + col partner + 1)
//
// Cells whose score is at most `prob_threshold` are "sparse". These formulas are
// reproduced exactly, including the `+1` terms, so that networks stay comparable
// with previously published ones.

use crate::bits::GeneProfile;
use crate::config::AnalysisConfig;
use crate::types::{ContingencyCounts, RelationCode};

/// For each cell, the indices of the cell sharing its row and its column.
const MARGINAL_PARTNERS: [(usize, usize); 4] = [(1, 2), (0, 3), (0, 3), (1, 2)];

/// Score of a cell that is not significant.
pub const NOT_SIGNIFICANT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairOutcome {
    pub counts: ContingencyCounts,
    pub scores: [f64; 4],
    pub code: RelationCode,
    /// The worst passing score behind `code`; `NOT_SIGNIFICANT` for no relation.
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PairStatistic {
    stat_threshold: f64,
    prob_threshold: f64,
}

impl PairStatistic {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            stat_threshold: config.stat_threshold,
            prob_threshold: config.prob_threshold,
        }
    }

    #[inline]
    pub fn evaluate(&self, a: &GeneProfile, b: &GeneProfile) -> PairOutcome {
        self.evaluate_counts(contingency_counts(a, b))
    }

    pub fn evaluate_counts(&self, counts: ContingencyCounts) -> PairOutcome {
        let scores = self.error_scores(&counts);
        let (code, score) = self.assign_code(&scores);
        PairOutcome {
            counts,
            scores,
            code,
            score,
        }
    }

    pub fn error_scores(&self, counts: &ContingencyCounts) -> [f64; 4] {
        let total = counts.total();
        if total == 0 {
            return [NOT_SIGNIFICANT; 4];
        }
        let total = total as f64;
        let c = counts.cells.map(f64::from);

        let mut scores = [NOT_SIGNIFICANT; 4];
        for (k, score) in scores.iter_mut().enumerate() {
            let (row_partner, col_partner) = MARGINAL_PARTNERS[k];
            let row = c[k] + c[row_partner];
            let col = c[k] + c[col_partner];
            let expected = row * col / total;
            let residual = (expected - c[k] + 1.0) / (expected + 1.0).sqrt();
            // NaN compares false and stays non-significant.
            if residual > self.stat_threshold {
                *score = 0.5 * c[k] / (c[k] + c[row_partner] + 1.0)
                    + 0.5 * c[k] / (c[k] + c[col_partner] + 1.0);
            }
        }
        scores
    }

    /// Later matches overwrite earlier ones: single cells in order, then the
    /// equivalent pair, then the opposite pair.
    fn assign_code(&self, scores: &[f64; 4]) -> (RelationCode, f64) {
        let passes = scores.map(|s| s <= self.prob_threshold);
        let mut code = RelationCode::None;
        let mut score = NOT_SIGNIFICANT;

        for cell in 0..4 {
            if passes[cell] {
                code = RelationCode::for_cell(cell);
                score = scores[cell];
            }
        }
        if passes[1] && passes[2] {
            code = RelationCode::Equivalent;
            score = scores[1].max(scores[2]);
        }
        if passes[0] && passes[3] {
            code = RelationCode::Opposite;
            score = scores[0].max(scores[3]);
        }
        (code, score)
    }
}

/// Counts the 2×2 table over samples confident in both genes, one word at a time.
pub fn contingency_counts(a: &GeneProfile, b: &GeneProfile) -> ContingencyCounts {
    debug_assert_eq!(a.width(), b.width(), "profiles must share a sample space");
    let (va, ca) = (a.value_words(), a.confidence_words());
    let (vb, cb) = (b.value_words(), b.confidence_words());

    let mut both_total = 0u32;
    let mut low_high = 0u32;
    let mut high_low = 0u32;
    let mut high_high = 0u32;
    for i in 0..ca.len() {
        let both = ca[i] & cb[i];
        both_total += both.count_ones();
        low_high += (both & vb[i] & !va[i]).count_ones();
        high_low += (both & va[i] & !vb[i]).count_ones();
        high_high += (both & va[i] & vb[i]).count_ones();
    }

    ContingencyCounts {
        cells: [
            both_total - low_high - high_low - high_high,
            low_high,
            high_low,
            high_high,
        ],
    }
}
