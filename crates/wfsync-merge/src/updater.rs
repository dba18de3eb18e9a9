//! Update orchestration: detect drift first, merge only when needed.

use crate::engine::{MergeEngine, MergeResult};
use crate::error::Result;
use tracing::{info, warn};
use wfsync_core::{normalize, DriftDetector, SourceSpec};

/// One update of a local workflow to a new upstream reference.
#[derive(Debug, Clone, Copy)]
pub struct UpdateRequest<'a> {
    /// The workflow file as it is on disk.
    pub local: &'a str,
    /// The spec the local copy declares, `owner/repo/path@ref`.
    pub source_spec: &'a str,
    /// Upstream content at the declared reference.
    pub base: &'a str,
    /// Upstream content at `new_reference`.
    pub new: &'a str,
    pub new_reference: &'a str,
    /// When false, local modifications are overwritten instead of merged.
    pub merge: bool,
}

/// What an update produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Same reference and identical upstream content; nothing to write.
    UpToDate,
    /// The local copy had no modifications (or merging was disabled) and is
    /// replaced by the regenerated upstream content. The local deployment
    /// field is kept.
    Replaced { content: String },
    /// Local modifications were merged with the new upstream.
    Merged(MergeResult),
}

impl UpdateOutcome {
    /// Content to write back, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::UpToDate => None,
            Self::Replaced { content } => Some(content),
            Self::Merged(result) => Some(&result.content),
        }
    }

    #[must_use]
    pub const fn has_conflicts(&self) -> bool {
        matches!(self, Self::Merged(MergeResult { has_conflicts: true, .. }))
    }
}

/// Runs drift detection, then either replaces or merges.
#[derive(Debug, Clone)]
pub struct WorkflowUpdater {
    detector: DriftDetector,
    engine: MergeEngine,
}

impl WorkflowUpdater {
    #[must_use]
    pub const fn new(detector: DriftDetector, engine: MergeEngine) -> Self {
        Self { detector, engine }
    }

    /// Apply `request`.
    ///
    /// # Errors
    /// Fails when the declared source spec is invalid or the merge fails.
    pub fn apply(&self, request: &UpdateRequest<'_>) -> Result<UpdateOutcome> {
        let spec = SourceSpec::parse(request.source_spec)?;

        let unchanged = normalize(request.base) == normalize(request.new);
        if spec.reference == request.new_reference && unchanged {
            info!(source = %spec, "Workflow is up to date");
            return Ok(UpdateOutcome::UpToDate);
        }

        let modified = self
            .detector
            .has_local_modifications(request.base, request.local, request.source_spec);

        if modified && request.merge {
            let result = self.engine.merge_workflow_content(
                request.base,
                request.local,
                request.new,
                request.source_spec,
                request.new_reference,
            )?;
            return Ok(UpdateOutcome::Merged(result));
        }

        if modified {
            warn!(source = %spec, "Overwriting local modifications");
        }

        let new_spec = spec.with_reference(request.new_reference);
        let regenerated = self
            .detector
            .regenerate(request.new, &new_spec.to_string(), &new_spec);
        let content = self
            .detector
            .carry_deployment_field(request.local, &regenerated);
        info!(source = %new_spec, "Replaced workflow with upstream");
        Ok(UpdateOutcome::Replaced { content })
    }
}
