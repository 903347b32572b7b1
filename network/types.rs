// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used in one file.

use crate::config::AnalysisConfig;
use std::fmt;

/// The 0-based row of a gene in the bit-vector source. Sparse output is
/// addressed by this index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneIndex(pub usize);

/// The dense, 0-based position of a balanced gene among all balanced genes,
/// assigned in row order. Dense output is addressed by this index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalancedIndex(pub u32);

/// The three gene lists every network file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneCategory {
    Low,
    High,
    Balanced,
}

impl GeneCategory {
    pub const ALL: [GeneCategory; 3] = [
        GeneCategory::Low,
        GeneCategory::High,
        GeneCategory::Balanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Balanced => "balanced",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "low" => Some(Self::Low),
            "high" => Some(Self::High),
            "balanced" => Some(Self::Balanced),
            _ => None,
        }
    }
}

impl fmt::Display for GeneCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of the single-gene pass for one row. Only `Balanced` genes are
/// ever paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneStatus {
    /// Not present in the gene-list filter. Reported nowhere.
    Excluded,
    /// Too few confidently classified samples. Reported nowhere.
    NoRange,
    Low,
    High,
    Balanced(BalancedIndex),
}

impl GeneStatus {
    pub fn category(self) -> Option<GeneCategory> {
        match self {
            Self::Excluded | Self::NoRange => None,
            Self::Low => Some(GeneCategory::Low),
            Self::High => Some(GeneCategory::High),
            Self::Balanced(_) => Some(GeneCategory::Balanced),
        }
    }

    #[inline]
    pub fn balanced_index(self) -> Option<BalancedIndex> {
        match self {
            Self::Balanced(idx) => Some(idx),
            _ => None,
        }
    }
}

/// The Boolean relationship between gene A (lower row) and gene B (higher row).
///
/// Codes 1..=4 name the single sparse cell of the 2×2 table
/// (cell 0 = A low/B low, 1 = A low/B high, 2 = A high/B low, 3 = both high);
/// code `k + 1` means cell `k` is (almost) empty. Codes 5 and 6 are the
/// symmetric relations formed by two sparse cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RelationCode {
    None = 0,
    /// Cell 0 empty: A low ⇒ B high.
    LowImpliesHigh = 1,
    /// Cell 1 empty: A low ⇒ B low.
    LowImpliesLow = 2,
    /// Cell 2 empty: A high ⇒ B high.
    HighImpliesHigh = 3,
    /// Cell 3 empty: A high ⇒ B low.
    HighImpliesLow = 4,
    /// Cells 1 and 2 empty.
    Equivalent = 5,
    /// Cells 0 and 3 empty.
    Opposite = 6,
}

impl RelationCode {
    /// Number of distinct codes, including `None`.
    pub const CATEGORIES: usize = 7;

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::LowImpliesHigh,
            2 => Self::LowImpliesLow,
            3 => Self::HighImpliesHigh,
            4 => Self::HighImpliesLow,
            5 => Self::Equivalent,
            6 => Self::Opposite,
            _ => return None,
        })
    }

    /// The code for a single sparse cell `0..4`.
    pub(crate) fn for_cell(cell: usize) -> Self {
        match cell {
            0 => Self::LowImpliesHigh,
            1 => Self::LowImpliesLow,
            2 => Self::HighImpliesHigh,
            _ => Self::HighImpliesLow,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_relation(self) -> bool {
        self != Self::None
    }

    /// The code of the same relation read with the two genes swapped.
    pub fn mirrored(self) -> Self {
        match self {
            Self::LowImpliesLow => Self::HighImpliesHigh,
            Self::HighImpliesHigh => Self::LowImpliesLow,
            other => other,
        }
    }
}

impl fmt::Display for RelationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::LowImpliesHigh => "low=>high",
            Self::LowImpliesLow => "low=>low",
            Self::HighImpliesHigh => "high=>high",
            Self::HighImpliesLow => "high=>low",
            Self::Equivalent => "equivalent",
            Self::Opposite => "opposite",
        };
        f.pad(label)
    }
}

/// The 2×2 contingency table of two genes over their shared confident samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContingencyCounts {
    /// Indexed by cell: `[A low/B low, A low/B high, A high/B low, A high/B high]`.
    pub cells: [u32; 4],
}

impl ContingencyCounts {
    #[inline]
    pub fn total(&self) -> u32 {
        self.cells.iter().sum()
    }

    /// The table with the roles of A and B exchanged.
    pub fn swapped(&self) -> Self {
        let [c0, c1, c2, c3] = self.cells;
        Self {
            cells: [c0, c2, c1, c3],
        }
    }
}

/// A significant relation, ready to be handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationHit {
    pub gene_a: GeneIndex,
    pub gene_b: GeneIndex,
    pub balanced_a: BalancedIndex,
    pub balanced_b: BalancedIndex,
    pub code: RelationCode,
    /// The worst passing error score that produced `code`.
    pub score: f64,
    pub counts: ContingencyCounts,
}

/// Run metadata written at the top of every network file.
#[derive(Debug, Clone)]
pub struct NetworkHeader {
    pub source: String,
    pub phenotype: String,
    pub gene_count: usize,
    pub raw_sample_count: usize,
    /// Samples remaining after the phenotype projection.
    pub sample_count: usize,
    pub config: AnalysisConfig,
}

impl NetworkHeader {
    /// Ordered `key, value` pairs, shared by both output formats.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("source", self.source.clone()),
            ("phenotype", self.phenotype.clone()),
            ("genes", self.gene_count.to_string()),
            ("raw_samples", self.raw_sample_count.to_string()),
            ("samples", self.sample_count.to_string()),
            ("threshold", self.config.prob_threshold.to_string()),
            ("stat_threshold", self.config.stat_threshold.to_string()),
            ("single_threshold", self.config.single_threshold.to_string()),
            ("single_cutoff", self.config.single_cutoff.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrored_swaps_only_the_cross_implications() {
        assert_eq!(RelationCode::LowImpliesLow.mirrored(), RelationCode::HighImpliesHigh);
        assert_eq!(RelationCode::HighImpliesHigh.mirrored(), RelationCode::LowImpliesLow);
        for code in [
            RelationCode::None,
            RelationCode::LowImpliesHigh,
            RelationCode::HighImpliesLow,
            RelationCode::Equivalent,
            RelationCode::Opposite,
        ] {
            assert_eq!(code.mirrored(), code);
        }
    }

    #[test]
    fn relation_codes_survive_byte_conversion() {
        for value in 0..RelationCode::CATEGORIES as u8 {
            let code = RelationCode::from_u8(value).unwrap();
            assert_eq!(code.as_u8(), value);
        }
        assert_eq!(RelationCode::from_u8(7), None);
    }

    #[test]
    fn swapped_counts_exchange_the_off_diagonal_cells() {
        let counts = ContingencyCounts { cells: [1, 2, 3, 4] };
        assert_eq!(counts.swapped().cells, [1, 3, 2, 4]);
        assert_eq!(counts.total(), 10);
    }
}
