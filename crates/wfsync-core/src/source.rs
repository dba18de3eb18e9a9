//! Upstream source locators.

use crate::error::{CoreError, Result};
use std::fmt;
use std::str::FromStr;

/// Identifies one versioned upstream document: `owner/repo/path[@ref]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    /// `owner/repo`.
    pub repository: String,
    /// Path of the document inside the repository.
    pub path: String,
    /// Branch, tag, version or commit. Empty when the spec did not pin one.
    pub reference: String,
}

impl SourceSpec {
    /// Parse a spec string.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidSourceSpec` unless the string has at least
    /// three non-empty slash-separated segments before the optional `@ref`.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidSourceSpec(spec.to_string());
        let (locator, reference) = spec.split_once('@').unwrap_or((spec, ""));

        let segments: Vec<&str> = locator.trim().split('/').collect();
        if segments.len() < 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }

        Ok(Self {
            repository: format!("{}/{}", segments[0], segments[1]),
            path: segments[2..].join("/"),
            reference: reference.trim().to_string(),
        })
    }

    /// The same document at another reference.
    #[must_use]
    pub fn with_reference(&self, reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..self.clone()
        }
    }

    /// Directory containing the document, empty at repository root.
    #[must_use]
    pub fn directory(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository, self.path)?;
        if !self.reference.is_empty() {
            write!(f, "@{}", self.reference)?;
        }
        Ok(())
    }
}

impl FromStr for SourceSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A [`SourceSpec`] plus the context import expansion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSpec {
    pub source: SourceSpec,
    /// File stem of the workflow, e.g. `daily-report`.
    pub name: String,
}

impl WorkflowSpec {
    #[must_use]
    pub fn new(source: SourceSpec) -> Self {
        let file = source.path.rsplit('/').next().unwrap_or(&source.path);
        let name = file.strip_suffix(".md").unwrap_or(file).to_string();
        Self { source, name }
    }

    /// Resolve an import path written inside this workflow to a
    /// repository-relative path. Leading `/` anchors at the repository root.
    #[must_use]
    pub fn resolve_path(&self, import: &str) -> String {
        if let Some(rooted) = import.strip_prefix('/') {
            return normalize_path(rooted);
        }
        let dir = self.source.directory();
        if dir.is_empty() {
            normalize_path(import)
        } else {
            normalize_path(&format!("{dir}/{import}"))
        }
    }
}

/// Collapse `.` and `..` segments.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
