//! wfsync-core: keeping upstream-tracked workflows in sync.
//!
//! This crate provides:
//! - `VersionComparator`: semantic-version validation, ordering and update selection
//! - `ContentNormalizer`: whitespace canonicalization and deployment-field stripping
//! - `SourceSpec` / `WorkflowSpec`: upstream locators
//! - Frontmatter field editing and import expansion
//! - `DriftDetector`: has a local copy diverged from its upstream?

pub mod config;
pub mod diagnostics;
pub mod drift;
pub mod error;
pub mod frontmatter;
pub mod imports;
pub mod normalize;
pub mod source;
pub mod version;

pub use config::{FieldSettings, ImportSettings, MergeLabels, MergeSettings, SyncConfig};
pub use diagnostics::{
    CollectingSink, Degradable, Diagnostic, DiagnosticSink, Severity, Step, TracingSink,
};
pub use drift::{ComparisonMode, DriftCheck, DriftDetector};
pub use error::{CoreError, Result};
pub use frontmatter::{FieldEditor, Frontmatter, FrontmatterEditor};
pub use imports::{
    ContentFetcher, ImportExpander, IncludePinner, InliningExpander, PrefetchedSources,
};
pub use normalize::{normalize, ContentNormalizer};
pub use source::{SourceSpec, WorkflowSpec};
pub use version::{SemanticVersion, UpdateTarget, VersionComparator};
