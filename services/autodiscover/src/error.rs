//! Error types for discovery, kubeconfig storage and reconciliation

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while syncing discovered clusters
#[derive(Debug, Error)]
pub enum AutodiscoverError {
    /// A heartbeat body or discovered record could not be decoded
    #[error("Malformed member record: {0}")]
    Decode(String),

    /// A setting that parsed but cannot be used
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The directory could not be reached
    #[error("Directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The directory answered with a non-success status
    #[error("Directory returned {status}: {message}")]
    Directory { status: u16, message: String },

    /// The kubeconfig could not be read or parsed
    #[error("Failed to load kubeconfig {path:?}: {message}")]
    StoreLoad { path: PathBuf, message: String },

    /// The kubeconfig could not be written back
    #[error("Failed to write kubeconfig {path:?}: {message}")]
    StoreSave { path: PathBuf, message: String },

    /// No credential identity found and none supplied
    #[error("No user matching *{suffix} found in kubeconfig, use --email to specify one")]
    MissingIdentity { suffix: String },

    /// More than one credential identity matches the suffix convention
    #[error("Multiple users match *{suffix} ({candidates}), use --email to pick one")]
    AmbiguousIdentity { suffix: String, candidates: String },
}

impl AutodiscoverError {
    pub fn store_load(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::StoreLoad {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn store_save(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::StoreSave {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AutodiscoverError>;
