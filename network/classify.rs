//! Single-gene gates applied once per gene, after phenotype projection.
//!
//! The dynamic-range gate drops genes with too few confidently classified
//! samples. The bias test then separates genes that are almost always high or
//! almost always low from the balanced genes that enter pairwise testing.

use crate::bits::GeneProfile;
use crate::config::AnalysisConfig;
use crate::types::GeneCategory;

#[derive(Debug, Clone, Copy)]
pub struct SingleGeneClassifier {
    /// Sample count after phenotype projection.
    sample_count: usize,
    single_cutoff: usize,
    single_threshold: f64,
}

impl SingleGeneClassifier {
    pub fn new(config: &AnalysisConfig, sample_count: usize) -> Self {
        Self {
            sample_count,
            single_cutoff: config.single_cutoff,
            single_threshold: config.single_threshold,
        }
    }

    /// True when at least a third of the projected samples are confidently
    /// classified.
    #[inline]
    pub fn has_range(&self, confident_count: usize) -> bool {
        self.sample_count <= 3 * confident_count
    }

    /// Bias classification from the high count and the confident-low count.
    pub fn classify_counts(&self, high: usize, confident_low: usize) -> GeneCategory {
        let total = high + confident_low;
        if total == 0 {
            return GeneCategory::Balanced;
        }
        let p_low = confident_low as f64 / total as f64;
        if confident_low < self.single_cutoff && p_low < self.single_threshold {
            return GeneCategory::High;
        }
        if high < self.single_cutoff && (1.0 - p_low) < self.single_threshold {
            return GeneCategory::Low;
        }
        GeneCategory::Balanced
    }

    pub fn classify(&self, profile: &GeneProfile) -> GeneCategory {
        self.classify_counts(profile.high_count(), profile.confident_low_count())
    }

    /// Both gates in order. `None` means the gene failed the range gate.
    pub fn evaluate(&self, profile: &GeneProfile) -> Option<GeneCategory> {
        debug_assert_eq!(profile.width(), self.sample_count);
        if !self.has_range(profile.confident_count()) {
            return None;
        }
        Some(self.classify(profile))
    }
}
