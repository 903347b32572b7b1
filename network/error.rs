//! # Error Taxonomy
//!
//! Every failure the engine can surface is fatal for the run. Per-gene and
//! per-pair degeneracies (empty confidence sets, empty contingency tables) are
//! not errors; they fall through the range gate or score as non-significant.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coarse classification of a [`NetworkError`], used by callers that only need
/// to know which part of the input was at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input data has the wrong shape (width mismatch, malformed rows).
    Format,
    /// A requested setting or named entity is invalid or missing.
    Config,
    /// The underlying storage failed mid-run.
    Resource,
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Format error in '{}' at line {line}: {message}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse configuration file '{}': {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, NetworkError>;

impl NetworkError {
    pub fn format(path: impl AsRef<Path>, line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.as_ref().to_path_buf(),
            line,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn resource(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Resource {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format { .. } => ErrorKind::Format,
            Self::Config { .. } | Self::ConfigFile { .. } => ErrorKind::Config,
            Self::Resource { .. } => ErrorKind::Resource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(NetworkError::format("a.bv", 3, "bad").kind(), ErrorKind::Format);
        assert_eq!(NetworkError::config("missing").kind(), ErrorKind::Config);
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(
            NetworkError::resource("a.bv", io_err).kind(),
            ErrorKind::Resource
        );
    }

    #[test]
    fn format_message_names_file_and_line() {
        let err = NetworkError::format("genes.bv", 12, "expected 40 samples, found 39");
        let text = err.to_string();
        assert!(text.contains("genes.bv"));
        assert!(text.contains("line 12"));
        assert!(text.contains("expected 40 samples"));
    }
}
