//! Error types for the merge engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Errors that abort a merge. Conflicts are not errors.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The old source spec could not be parsed, so provenance is unknown.
    #[error("cannot merge without provenance: {0}")]
    SourceSpec(#[from] wfsync_core::CoreError),

    /// Creating the scratch directory or writing an input file failed.
    #[error("failed to {step} '{path}': {source}")]
    Scratch {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The merge tool could not be started.
    #[error("failed to run '{program}': {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The merge tool ran but reported a failure.
    #[error("merge tool failed ({}): {output}", describe_status(.status))]
    ToolFailed { status: Option<i32>, output: String },

    /// The merged file could not be read back.
    #[error("failed to read merged file '{path}': {source}")]
    ReadMerged {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(
        || "terminated by signal".to_string(),
        |code| format!("exit status {code}"),
    )
}
