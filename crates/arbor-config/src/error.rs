//! Errors for loading, saving and building network descriptions.

use std::fmt;
use std::path::{Path, PathBuf};

use arbor_core::GraphError;
use thiserror::Error;

use crate::validation::ValidationError;

/// File system step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    /// Reading a description.
    Read,
    /// Writing a description.
    Write,
    /// Creating the directory a description is saved into.
    CreateDir,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileOp::Read => "read file",
            FileOp::Write => "write file",
            FileOp::CreateDir => "create directory",
        })
    }
}

/// Everything that can go wrong between a TOML file and a live network.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system step failed.
    #[error("failed to {op} '{path}': {source}")]
    File {
        /// The step that failed.
        op: FileOp,
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML.
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A description TOML cannot represent.
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A tree that does not describe a network.
    #[error("invalid network tree: {0}")]
    InvalidTree(String),

    /// The description was rejected by [`validate_network_with`](crate::validate_network_with).
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The network refused the description's tree.
    #[error("failed to build network: {0}")]
    Build(#[from] GraphError),
}

impl ConfigError {
    pub(crate) fn file(op: FileOp, path: &Path, source: std::io::Error) -> Self {
        ConfigError::File {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The failed file step, for file errors.
    pub fn file_op(&self) -> Option<FileOp> {
        match self {
            ConfigError::File { op, .. } => Some(*op),
            _ => None,
        }
    }
}
