//! Diagnostics sinks and best-effort fallbacks.
//!
//! Components never consult a global logger. Each one is handed an
//! `Arc<dyn DiagnosticSink>` at construction and reports degraded paths
//! through it. [`TracingSink`] forwards to `tracing`, [`CollectingSink`]
//! keeps the entries for inspection.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// How serious a reported diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational detail, shown in verbose mode only.
    Verbose,
    /// A fallback was taken; the result is still usable.
    Warning,
}

/// The processing step that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    VersionParse,
    SpecParse,
    SourceRewrite,
    ImportReplay,
    MergeTool,
    Cleanup,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionParse => write!(f, "version-parse"),
            Self::SpecParse => write!(f, "spec-parse"),
            Self::SourceRewrite => write!(f, "source-rewrite"),
            Self::ImportReplay => write!(f, "import-replay"),
            Self::MergeTool => write!(f, "merge-tool"),
            Self::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// A single reported diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub step: Step,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn verbose(step: Step, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Verbose,
            step,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(step: Step, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            step,
            message: message.into(),
        }
    }
}

/// Receives diagnostics from drift detection and merging.
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic.
    fn report(&self, diagnostic: Diagnostic);

    /// Report the fallback carried by `degradable` (if any) and return its value.
    fn absorb<T>(&self, degradable: Degradable<T>) -> T
    where
        Self: Sized,
    {
        let Degradable { value, diagnostic } = degradable;
        if let Some(diagnostic) = diagnostic {
            self.report(diagnostic);
        }
        value
    }
}

impl dyn DiagnosticSink {
    /// Object-safe counterpart of [`DiagnosticSink::absorb`].
    pub fn absorb_dyn<T>(&self, degradable: Degradable<T>) -> T {
        let Degradable { value, diagnostic } = degradable;
        if let Some(diagnostic) = diagnostic {
            self.report(diagnostic);
        }
        value
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Verbose => debug!(step = %diagnostic.step, "{}", diagnostic.message),
            Severity::Warning => warn!(step = %diagnostic.step, "{}", diagnostic.message),
        }
    }
}

/// Keeps every reported diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything reported so far.
    #[must_use]
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any diagnostic was reported for `step`.
    #[must_use]
    pub fn has_step(&self, step: Step) -> bool {
        self.entries().iter().any(|d| d.step == step)
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }
}

/// The sink used when a component is built without one.
#[must_use]
pub fn default_sink() -> Arc<dyn DiagnosticSink> {
    Arc::new(TracingSink)
}

/// A value from an optional enrichment step, plus the diagnostic to report
/// when the step failed and the pre-enrichment value was kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradable<T> {
    pub value: T,
    pub diagnostic: Option<Diagnostic>,
}

impl<T> Degradable<T> {
    /// Step succeeded.
    pub const fn ok(value: T) -> Self {
        Self {
            value,
            diagnostic: None,
        }
    }

    /// Take the step's output, or keep `original` and record why.
    pub fn or_original<E: fmt::Display>(
        result: std::result::Result<T, E>,
        original: T,
        step: Step,
    ) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self {
                value: original,
                diagnostic: Some(Diagnostic::warning(
                    step,
                    format!("{e}; keeping original content"),
                )),
            },
        }
    }

    /// True when the original value was kept.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_original_keeps_value_on_success() {
        let d = Degradable::or_original(
            Ok::<_, String>("new".to_string()),
            "old".to_string(),
            Step::SourceRewrite,
        );
        assert_eq!(d.value, "new");
        assert!(!d.is_degraded());
    }

    #[test]
    fn test_or_original_falls_back_on_error() {
        let d = Degradable::or_original(
            Err::<String, _>("boom"),
            "old".to_string(),
            Step::ImportReplay,
        );
        assert_eq!(d.value, "old");
        let diagnostic = d.diagnostic.unwrap();
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.step, Step::ImportReplay);
        assert!(diagnostic.message.contains("boom"));
    }

    #[test]
    fn test_collecting_sink_absorbs() {
        let sink = CollectingSink::new();
        let value = sink.absorb(Degradable::or_original(
            Err::<u32, _>("nope"),
            7,
            Step::SourceRewrite,
        ));
        assert_eq!(value, 7);
        assert!(sink.has_step(Step::SourceRewrite));

        let value = sink.absorb(Degradable::ok(9));
        assert_eq!(value, 9);
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn test_dyn_sink_absorbs() {
        let collecting = CollectingSink::new();
        let sink: Arc<dyn DiagnosticSink> = collecting.clone();
        let value = sink.absorb_dyn(Degradable::or_original(Err::<u32, _>("x"), 1, Step::Cleanup));
        assert_eq!(value, 1);
        assert!(collecting.has_step(Step::Cleanup));
    }
}
