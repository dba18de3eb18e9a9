//! Error types for wfsync-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wfsync-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in wfsync-core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Source spec string is not of the form `owner/repo/path[@ref]`.
    #[error("invalid source spec '{0}': expected owner/repo/path[@ref]")]
    InvalidSourceSpec(String),

    /// Document has no `---` delimited header.
    #[error("document has no frontmatter")]
    MissingFrontmatter,

    /// Header exists but is not a YAML mapping.
    #[error("invalid frontmatter: {0}")]
    InvalidFrontmatter(String),

    /// YAML parsing error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An import directive refers back to a document already being expanded.
    #[error("import cycle detected at '{0}'")]
    ImportCycle(String),

    /// Import nesting exceeded the configured depth.
    #[error("import depth limit of {0} exceeded")]
    ImportDepthExceeded(usize),

    /// A required import could not be fetched.
    #[error("failed to fetch import '{path}': {message}")]
    ImportFetch { path: String, message: String },

    /// Configuration file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
