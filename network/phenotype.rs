//! # Phenotype Sample Masks
//!
//! A run may be restricted to a subset of samples named by one row of a
//! phenotype file. Every gene profile is projected through the mask before any
//! statistic sees it, so the projected width is fixed for the whole run.
//!
//! Phenotype file rows are tab-separated:
//!
//! ```text
//! <phenotype id> \t <name> \t <description> \t <flag 1> ... \t <flag n>
//! ```
//!
//! A sample is included iff its flag is exactly `1`.

use crate::bits::{Bits, GeneProfile};
use crate::error::{NetworkError, Result};
use bitvec::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Leading non-flag columns of a phenotype row.
pub const PHENOTYPE_HEADER_COLUMNS: usize = 3;

/// The phenotype id that selects every sample.
pub const ALL_SAMPLES: &str = "All";

/// Which samples a run should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskSpec {
    All,
    Named { file: PathBuf, id: String },
}

impl MaskSpec {
    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL_SAMPLES,
            Self::Named { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhenotypeMask {
    raw_width: usize,
    /// Raw column of every included sample, ascending.
    included: Vec<usize>,
}

impl PhenotypeMask {
    pub fn all(raw_width: usize) -> Self {
        Self {
            raw_width,
            included: (0..raw_width).collect(),
        }
    }

    pub fn from_flags(flags: &[bool]) -> Self {
        Self {
            raw_width: flags.len(),
            included: flags
                .iter()
                .enumerate()
                .filter_map(|(i, &keep)| keep.then_some(i))
                .collect(),
        }
    }

    /// Resolves a [`MaskSpec`] against a data set with `raw_width` samples.
    ///
    /// A missing phenotype id is a configuration error; a row whose column count
    /// does not match `raw_width` is a format error.
    pub fn load(spec: &MaskSpec, raw_width: usize) -> Result<Self> {
        let (path, id) = match spec {
            MaskSpec::All => return Ok(Self::all(raw_width)),
            MaskSpec::Named { file, id } if id == ALL_SAMPLES => {
                log::debug!(
                    "Phenotype '{ALL_SAMPLES}' requested; ignoring {}",
                    file.display()
                );
                return Ok(Self::all(raw_width));
            }
            MaskSpec::Named { file, id } => (file, id),
        };

        let file = File::open(path).map_err(|e| NetworkError::resource(path, e))?;
        let reader = BufReader::new(file);

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| NetworkError::resource(path, e))?;
            let line = line.trim_end_matches('\r');
            let columns: Vec<&str> = line.split('\t').collect();
            if columns[0] != id.as_str() {
                continue;
            }

            let expected = raw_width + PHENOTYPE_HEADER_COLUMNS;
            if columns.len() != expected {
                return Err(NetworkError::format(
                    path,
                    line_idx + 1,
                    format!(
                        "phenotype '{id}' has {} columns, expected {expected} ({PHENOTYPE_HEADER_COLUMNS} header columns + {raw_width} samples)",
                        columns.len()
                    ),
                ));
            }

            let flags: Vec<bool> = columns[PHENOTYPE_HEADER_COLUMNS..]
                .iter()
                .map(|flag| flag.trim() == "1")
                .collect();
            let mask = Self::from_flags(&flags);
            if mask.cardinality() == 0 {
                log::warn!("Phenotype '{id}' selects no samples; no pair can reach significance");
            }
            return Ok(mask);
        }

        Err(NetworkError::config(format!(
            "phenotype '{id}' was not found in {}",
            path.display()
        )))
    }

    #[inline]
    pub fn raw_width(&self) -> usize {
        self.raw_width
    }

    /// Number of included samples, the width of every projected bit-set.
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.included.len()
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.included.len() == self.raw_width
    }

    /// Re-indexes a raw-width bit-set onto the included samples, preserving order.
    ///
    /// # Panics
    /// Panics if `bits` is not `raw_width` wide.
    pub fn project_bits(&self, bits: &BitSlice<u64, Lsb0>) -> Bits {
        assert_eq!(bits.len(), self.raw_width, "bit-set width does not match mask");
        if self.is_identity() {
            return bits.to_bitvec();
        }
        let mut projected = bitvec![u64, Lsb0; 0; self.included.len()];
        for (dst, &src) in self.included.iter().enumerate() {
            if bits[src] {
                projected.set(dst, true);
            }
        }
        projected
    }

    pub fn project(&self, profile: GeneProfile) -> GeneProfile {
        if self.is_identity() && profile.width() == self.raw_width {
            return profile;
        }
        GeneProfile::new(
            self.project_bits(profile.value()),
            self.project_bits(profile.confidence()),
        )
    }
}
