use crate::error::{NetworkError, Result};
use ahash::AHashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Restricts a run to a named set of genes. Genes outside the list are ignored
/// entirely, including in the low/high/balanced lists.
#[derive(Clone, Debug, Default)]
pub struct GeneList {
    ids: AHashSet<String>,
}

impl GeneList {
    /// Reads one identifier per line (the first whitespace-separated token).
    /// Blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            NetworkError::config(format!("cannot read gene list {}: {e}", path.display()))
        })?;
        let reader = BufReader::new(file);

        let mut ids = AHashSet::new();
        for line in reader.lines() {
            let line = line.map_err(|e| {
                NetworkError::config(format!("cannot read gene list {}: {e}", path.display()))
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(id) = trimmed.split_whitespace().next() {
                ids.insert(id.to_string());
            }
        }

        if ids.is_empty() {
            log::warn!("Gene list {} contains no identifiers", path.display());
        }
        Ok(Self { ids })
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
