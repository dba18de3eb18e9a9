//! Three-way merge of a local workflow with a new upstream version.

use crate::error::{MergeError, Result};
use crate::merger::{MergeRequest, MergeStatus, ThreeWayMerger};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};
use wfsync_core::diagnostics::default_sink;
use wfsync_core::{
    normalize, Degradable, Diagnostic, DiagnosticSink, FieldEditor, FieldSettings,
    FrontmatterEditor, ImportExpander, MergeLabels, SourceSpec, Step, SyncConfig, WorkflowSpec,
};

/// Prefix of the per-merge scratch directory.
const SCRATCH_PREFIX: &str = "wfsync-merge-";
const CURRENT_FILE: &str = "current.md";
const BASE_FILE: &str = "base.md";
const NEW_FILE: &str = "new.md";

/// Merged content. With `has_conflicts` set, the content holds inline
/// conflict markers and must not be treated as final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub content: String,
    pub has_conflicts: bool,
}

impl MergeResult {
    /// Number of `<<<<<<<` conflict regions in the content.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.content
            .lines()
            .filter(|line| line.starts_with("<<<<<<<"))
            .count()
    }
}

/// Reconciles base upstream, local edits and new upstream content.
#[derive(Clone)]
pub struct MergeEngine {
    merger: Arc<dyn ThreeWayMerger>,
    editor: Arc<dyn FieldEditor>,
    expander: Arc<dyn ImportExpander>,
    sink: Arc<dyn DiagnosticSink>,
    fields: FieldSettings,
    labels: MergeLabels,
    scratch_dir: Option<PathBuf>,
}

impl fmt::Debug for MergeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeEngine")
            .field("merger", &self.merger.name())
            .field("labels", &self.labels)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl MergeEngine {
    #[must_use]
    pub fn new(merger: Arc<dyn ThreeWayMerger>, expander: Arc<dyn ImportExpander>) -> Self {
        Self::from_config(&SyncConfig::default(), merger, expander)
    }

    #[must_use]
    pub fn from_config(
        config: &SyncConfig,
        merger: Arc<dyn ThreeWayMerger>,
        expander: Arc<dyn ImportExpander>,
    ) -> Self {
        Self {
            merger,
            editor: Arc::new(FrontmatterEditor::new(config.fields.trigger_section.clone())),
            expander,
            sink: default_sink(),
            fields: config.fields.clone(),
            labels: config.merge.labels.clone(),
            scratch_dir: config.merge.scratch_dir.clone(),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_editor(mut self, editor: Arc<dyn FieldEditor>) -> Self {
        self.editor = editor;
        self
    }

    /// Create per-merge scratch directories under `dir` instead of the
    /// system temp directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Merge `base -> new` into `current`.
    ///
    /// `old_source_spec` names the upstream `base` came from; `new_reference`
    /// is the reference `new` was fetched at. Conflicts are reported through
    /// [`MergeResult::has_conflicts`], not as errors.
    ///
    /// # Errors
    /// Fails when `old_source_spec` cannot be parsed, scratch files cannot be
    /// written or read, or the merge tool cannot run or reports a failure.
    pub fn merge_workflow_content(
        &self,
        base: &str,
        current: &str,
        new: &str,
        old_source_spec: &str,
        new_reference: &str,
    ) -> Result<MergeResult> {
        let spec = SourceSpec::parse(old_source_spec)?;
        let new_spec = spec.with_reference(new_reference);
        let current_source = spec.to_string();
        let new_source = new_spec.to_string();

        // Bring both upstream sides into installed form, like the local copy.
        let base = self.expand_imports(&self.tag_source(base, &current_source), &spec);
        let new = self.expand_imports(&self.tag_source(new, &new_source), &new_spec);

        let current = normalize(current);
        let base = normalize(&base);
        let new = normalize(&new);

        let scratch = self.create_scratch()?;
        let current_path = scratch.path().join(CURRENT_FILE);
        let base_path = scratch.path().join(BASE_FILE);
        let new_path = scratch.path().join(NEW_FILE);
        write_input(&current_path, &current)?;
        write_input(&base_path, &base)?;
        write_input(&new_path, &new)?;

        let request = MergeRequest {
            current: &current_path,
            base: &base_path,
            new: &new_path,
            labels: &self.labels,
        };
        let output = self
            .merger
            .merge_files(&request)
            .map_err(|source| MergeError::ToolSpawn {
                program: self.merger.name().to_string(),
                source,
            })?;

        let status = MergeStatus::from_exit(output.status);
        if let MergeStatus::Conflicted(count) = status {
            self.sink.report(Diagnostic::verbose(
                Step::MergeTool,
                format!("{count} conflict(s) need manual resolution"),
            ));
        } else if status == MergeStatus::Failed {
            return Err(MergeError::ToolFailed {
                status: output.status,
                output: output.output,
            });
        }

        let merged = fs::read_to_string(&current_path).map_err(|source| MergeError::ReadMerged {
            path: current_path.clone(),
            source,
        })?;

        let has_conflicts = status.has_conflicts();
        let content = if has_conflicts {
            merged
        } else {
            self.expand_imports(&merged, &new_spec)
        };

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            self.sink.report(Diagnostic::warning(
                Step::Cleanup,
                format!("failed to remove {}: {e}", scratch_path.display()),
            ));
        }

        info!(source = %new_source, conflicts = has_conflicts, "Merged workflow");

        Ok(MergeResult {
            content,
            has_conflicts,
        })
    }

    /// Point the source field at `source`, keeping the text on failure.
    fn tag_source(&self, document: &str, source: &str) -> String {
        self.sink.absorb_dyn(Degradable::or_original(
            self.editor.set_field(document, &self.fields.source, source),
            document.to_string(),
            Step::SourceRewrite,
        ))
    }

    /// Replay import expansion at `spec.reference`, keeping the text on failure.
    fn expand_imports(&self, document: &str, spec: &SourceSpec) -> String {
        let workflow = WorkflowSpec::new(spec.clone());
        self.sink.absorb_dyn(Degradable::or_original(
            self.expander.expand(document, &workflow, &spec.reference),
            document.to_string(),
            Step::ImportReplay,
        ))
    }

    /// A fresh, uniquely named directory, removed when dropped.
    fn create_scratch(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let created = match &self.scratch_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        };
        let scratch = created.map_err(|source| MergeError::Scratch {
            step: "create scratch directory in",
            path: self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir),
            source,
        })?;
        debug!(path = %scratch.path().display(), "Created merge scratch directory");
        Ok(scratch)
    }
}

fn write_input(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|source| MergeError::Scratch {
        step: "write",
        path: path.to_path_buf(),
        source,
    })
}
