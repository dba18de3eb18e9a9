//! Drift detection: has a local workflow diverged from what its declared
//! upstream source would produce?
//!
//! The upstream side is regenerated exactly the way the local copy was
//! originally written (source-tagged, then import-expanded at the declared
//! reference) and compared after normalization. Deployment-only fields are
//! stripped from both sides first.

use crate::config::{FieldSettings, SyncConfig};
use crate::diagnostics::{default_sink, Degradable, Diagnostic, DiagnosticSink, Step};
use crate::frontmatter::{FieldEditor, FrontmatterEditor};
use crate::imports::ImportExpander;
use crate::normalize::{normalize, ContentNormalizer};
use crate::source::{SourceSpec, WorkflowSpec};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// How the comparison was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    /// Upstream was regenerated with provenance and imports.
    Full,
    /// The source spec was unusable; normalized texts were compared directly.
    Direct,
}

/// Outcome of a drift check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftCheck {
    pub modified: bool,
    pub mode: ComparisonMode,
}

/// Compares local workflows against their upstream sources.
#[derive(Clone)]
pub struct DriftDetector {
    normalizer: ContentNormalizer,
    editor: Arc<dyn FieldEditor>,
    expander: Arc<dyn ImportExpander>,
    sink: Arc<dyn DiagnosticSink>,
    fields: FieldSettings,
}

impl fmt::Debug for DriftDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriftDetector")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl DriftDetector {
    /// Detector with default field names and a `tracing` sink.
    #[must_use]
    pub fn new(expander: Arc<dyn ImportExpander>) -> Self {
        Self::from_config(&SyncConfig::default(), expander)
    }

    #[must_use]
    pub fn from_config(config: &SyncConfig, expander: Arc<dyn ImportExpander>) -> Self {
        Self {
            normalizer: ContentNormalizer::new(config.fields.trigger_section.clone()),
            editor: Arc::new(FrontmatterEditor::new(config.fields.trigger_section.clone())),
            expander,
            sink: default_sink(),
            fields: config.fields.clone(),
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

    /// True when `local` differs from what `upstream` at `source_spec` yields.
    #[must_use]
    pub fn has_local_modifications(&self, upstream: &str, local: &str, source_spec: &str) -> bool {
        self.check(upstream, local, source_spec).modified
    }

    /// Like [`Self::has_local_modifications`], also reporting the mode used.
    #[must_use]
    pub fn check(&self, upstream: &str, local: &str, source_spec: &str) -> DriftCheck {
        let upstream = self.canonical(upstream);
        let local = self.canonical(local);

        let (expected, local, mode) = match SourceSpec::parse(source_spec) {
            Ok(spec) => {
                // Provenance is bookkeeping; drop it from both sides.
                let expected = self.regenerate(&upstream, source_spec, &spec);
                let expected = self.editor.remove_field(&expected, &self.fields.source);
                let local = self.editor.remove_field(&local, &self.fields.source);
                (normalize(&expected), normalize(&local), ComparisonMode::Full)
            }
            Err(e) => {
                self.sink.report(Diagnostic::warning(
                    Step::SpecParse,
                    format!("{e}; comparing content directly"),
                ));
                (upstream, local, ComparisonMode::Direct)
            }
        };

        let modified = expected != local;
        if modified {
            debug!(source = %source_spec, "Local workflow differs from upstream");
        }
        DriftCheck { modified, mode }
    }

    /// Reproduce the local copy `upstream` would have produced: tag it with
    /// `source_value`, replay imports at `spec.reference`, normalize.
    ///
    /// Rewrite and expansion failures fall back to the unenriched text.
    #[must_use]
    pub fn regenerate(&self, upstream: &str, source_value: &str, spec: &SourceSpec) -> String {
        let tagged = self.sink.absorb_dyn(Degradable::or_original(
            self.editor.set_field(upstream, &self.fields.source, source_value),
            upstream.to_string(),
            Step::SourceRewrite,
        ));

        let workflow = WorkflowSpec::new(spec.clone());
        let expanded = self.sink.absorb_dyn(Degradable::or_original(
            self.expander.expand(&tagged, &workflow, &spec.reference),
            tagged.clone(),
            Step::ImportReplay,
        ));

        normalize(&expanded)
    }

    /// Give `regenerated` the deployment field value `local` has, or drop it
    /// when `local` has none. Drift ignores that field, so a replacement must
    /// keep it.
    #[must_use]
    pub fn carry_deployment_field(&self, local: &str, regenerated: &str) -> String {
        let carried = self.editor.carry_trigger_field(
            &normalize(local),
            regenerated,
            &self.fields.deployment,
        );
        normalize(&carried)
    }

    fn canonical(&self, text: &str) -> String {
        let stripped = self
            .normalizer
            .strip_deployment_field(&normalize(text), &self.fields.deployment);
        normalize(&stripped)
    }
}
