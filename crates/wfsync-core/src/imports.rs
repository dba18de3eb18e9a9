//! Import directive expansion.
//!
//! Recognized directives, each on its own line outside fenced code blocks:
//! - `@include path` / `@include? path`
//! - `@import path`
//! - `{{#import path}}` / `{{#import? path}}`
//!
//! A `?` marks the import optional. Paths may carry a `#Section` suffix.
//! Paths containing `@` are already pinned (`owner/repo/path@ref`).

use crate::config::ImportSettings;
use crate::error::{CoreError, Result};
use crate::frontmatter::Frontmatter;
use crate::source::{SourceSpec, WorkflowSpec};
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::debug;

static AT_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*@(?:include|import)(?P<opt>\?)?\s+(?P<path>\S+)\s*$")
        .expect("valid regex")
});

static MUSTACHE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\{\{#import(?P<opt>\?)?\s+(?P<path>[^}\s]+)\s*\}\}\s*$")
        .expect("valid regex")
});

/// Default nesting limit for [`InliningExpander`].
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Replays import processing for a workflow at a given reference.
///
/// Must behave identically for identical inputs so both sides of a
/// comparison see the same expansion.
pub trait ImportExpander: Send + Sync {
    /// Expand the directives in `document`.
    ///
    /// # Errors
    /// Returns an error when a required import cannot be resolved.
    fn expand(&self, document: &str, workflow: &WorkflowSpec, reference: &str) -> Result<String>;
}

/// Source of upstream file contents for [`InliningExpander`].
pub trait ContentFetcher: Send + Sync {
    /// Content of `path` in `repository` at `reference`.
    ///
    /// # Errors
    /// Returns an error if the file does not exist or cannot be read.
    fn fetch(
        &self,
        repository: &str,
        path: &str,
        reference: &str,
    ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// One directive found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    /// Line index within the document.
    pub line: usize,
    /// Byte range of the path (including any `#Section`) within the line.
    pub path_range: Range<usize>,
    pub path: String,
    pub optional: bool,
}

impl ImportDirective {
    /// Path without the `#Section` suffix.
    #[must_use]
    pub fn file(&self) -> &str {
        self.path.split_once('#').map_or(&self.path, |(file, _)| file)
    }

    #[must_use]
    pub fn section(&self) -> Option<&str> {
        self.path.split_once('#').map(|(_, section)| section)
    }

    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.file().contains('@')
    }
}

/// Find all directives in `document`, skipping the header and fenced code.
#[must_use]
pub fn find_directives(document: &str) -> Vec<ImportDirective> {
    let body_offset = body_line_offset(document);
    let mut in_fence = false;
    let mut directives = Vec::new();

    for (index, line) in document.lines().enumerate().skip(body_offset) {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let captures = AT_DIRECTIVE
            .captures(line)
            .or_else(|| MUSTACHE_DIRECTIVE.captures(line));
        if let Some(caps) = captures {
            let path = &caps["path"];
            let range = caps.name("path").map_or(0..0, |m| m.range());
            directives.push(ImportDirective {
                line: index,
                path_range: range,
                path: path.to_string(),
                optional: caps.name("opt").is_some(),
            });
        }
    }
    directives
}

/// Rewrites relative import paths into pinned `owner/repo/path@ref` form,
/// so the local copy resolves them at the reference it was generated from.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludePinner;

impl ImportExpander for IncludePinner {
    fn expand(&self, document: &str, workflow: &WorkflowSpec, reference: &str) -> Result<String> {
        if reference.is_empty() {
            debug!(workflow = %workflow.name, "No reference to pin imports against");
            return Ok(document.to_string());
        }

        let directives = find_directives(document);
        if directives.is_empty() {
            return Ok(document.to_string());
        }

        let mut by_line: HashMap<usize, &ImportDirective> =
            directives.iter().map(|d| (d.line, d)).collect();
        let mut out = String::with_capacity(document.len() + directives.len() * 32);

        for (index, line) in document.split_inclusive('\n').enumerate() {
            match by_line.remove(&index) {
                Some(directive) if !directive.is_pinned() => {
                    let mut pinned = format!(
                        "{}/{}@{reference}",
                        workflow.source.repository,
                        workflow.resolve_path(directive.file())
                    );
                    if let Some(section) = directive.section() {
                        pinned.push('#');
                        pinned.push_str(section);
                    }
                    let mut rewritten = line.to_string();
                    rewritten.replace_range(directive.path_range.clone(), &pinned);
                    out.push_str(&rewritten);
                }
                _ => out.push_str(line),
            }
        }
        Ok(out)
    }
}

/// Recursively replaces directives with the body of the imported document.
#[derive(Debug, Clone)]
pub struct InliningExpander<F> {
    fetcher: F,
    max_depth: usize,
}

impl<F: ContentFetcher> InliningExpander<F> {
    #[must_use]
    pub const fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Expander with the depth limit from `settings`.
    #[must_use]
    pub const fn from_config(fetcher: F, settings: &ImportSettings) -> Self {
        Self::new(fetcher).with_max_depth(settings.max_depth)
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn expand_at(
        &self,
        document: &str,
        workflow: &WorkflowSpec,
        reference: &str,
        stack: &mut Vec<String>,
    ) -> Result<String> {
        // The stack always holds the root document.
        if stack.len() - 1 > self.max_depth {
            return Err(CoreError::ImportDepthExceeded(self.max_depth));
        }

        let directives = find_directives(document);
        let mut by_line: HashMap<usize, &ImportDirective> =
            directives.iter().map(|d| (d.line, d)).collect();
        let mut out = String::with_capacity(document.len());

        for (index, line) in document.split_inclusive('\n').enumerate() {
            let Some(directive) = by_line.remove(&index) else {
                out.push_str(line);
                continue;
            };

            let target = if directive.is_pinned() {
                SourceSpec::parse(directive.file())?
            } else {
                SourceSpec {
                    repository: workflow.source.repository.clone(),
                    path: workflow.resolve_path(directive.file()),
                    reference: reference.to_string(),
                }
            };
            let key = target.to_string();
            if stack.contains(&key) {
                return Err(CoreError::ImportCycle(key));
            }

            let fetched = match self
                .fetcher
                .fetch(&target.repository, &target.path, &target.reference)
            {
                Ok(content) => content,
                Err(e) if directive.optional => {
                    debug!(import = %key, error = %e, "Skipping missing optional import");
                    continue;
                }
                Err(e) => {
                    return Err(CoreError::ImportFetch {
                        path: key,
                        message: e.to_string(),
                    });
                }
            };

            let body = Frontmatter::split(&fetched).map_or(fetched.as_str(), |fm| fm.body);
            let body = match directive.section() {
                Some(section) => extract_section(body, section),
                None => body.to_string(),
            };

            let nested = WorkflowSpec::new(target.clone());
            stack.push(key);
            let expanded = self.expand_at(&body, &nested, &target.reference, stack)?;
            stack.pop();

            out.push_str(expanded.trim_start_matches('\n'));
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }
}

impl<F: ContentFetcher> ImportExpander for InliningExpander<F> {
    fn expand(&self, document: &str, workflow: &WorkflowSpec, reference: &str) -> Result<String> {
        let mut stack = vec![workflow.source.with_reference(reference).to_string()];
        self.expand_at(document, workflow, reference, &mut stack)
    }
}

/// Upstream files handed over by the caller, keyed by `repo/path@ref`.
#[derive(Debug, Clone, Default)]
pub struct PrefetchedSources {
    files: HashMap<String, String>,
}

impl PrefetchedSources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(
        mut self,
        repository: &str,
        path: &str,
        reference: &str,
        content: impl Into<String>,
    ) -> Self {
        self.insert(repository, path, reference, content);
        self
    }

    pub fn insert(
        &mut self,
        repository: &str,
        path: &str,
        reference: &str,
        content: impl Into<String>,
    ) {
        self.files
            .insert(format!("{repository}/{path}@{reference}"), content.into());
    }
}

impl ContentFetcher for PrefetchedSources {
    fn fetch(
        &self,
        repository: &str,
        path: &str,
        reference: &str,
    ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let key = format!("{repository}/{path}@{reference}");
        self.files
            .get(&key)
            .cloned()
            .ok_or_else(|| format!("{key} was not prefetched").into())
    }
}

/// Lines of the markdown section headed `section`, heading included,
/// up to the next heading of the same or a higher level.
fn extract_section(body: &str, section: &str) -> String {
    let mut out = String::new();
    let mut level = None;

    for line in body.split_inclusive('\n') {
        let hashes = line.chars().take_while(|&c| c == '#').count();
        let is_heading = hashes > 0 && line[hashes..].starts_with(' ');
        match level {
            None if is_heading && line[hashes..].trim().eq_ignore_ascii_case(section) => {
                level = Some(hashes);
                out.push_str(line);
            }
            Some(l) if is_heading && hashes <= l => break,
            Some(_) => out.push_str(line),
            None => {}
        }
    }
    out
}

fn body_line_offset(document: &str) -> usize {
    Frontmatter::split(document).map_or(0, |fm| {
        let header_len = document.len() - fm.body.len();
        document[..header_len].matches('\n').count()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workflow(spec: &str) -> WorkflowSpec {
        WorkflowSpec::new(SourceSpec::parse(spec).unwrap())
    }

    #[test]
    fn test_find_directives() {
        let doc = "---\non: push\n---\n@include shared/a.md\n  @include? shared/b.md#Setup\n{{#import c.md}}\n```\n@include ignored.md\n```\n@import o/r/d.md@v1\ntext @include inline.md\n";
        let found = find_directives(doc);
        let paths: Vec<&str> = found.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["shared/a.md", "shared/b.md#Setup", "c.md", "o/r/d.md@v1"]);
        assert!(!found[0].optional);
        assert!(found[1].optional);
        assert_eq!(found[1].file(), "shared/b.md");
        assert_eq!(found[1].section(), Some("Setup"));
        assert!(found[3].is_pinned());
    }

    #[test]
    fn test_directives_in_header_are_ignored() {
        let doc = "---\ndescription: \"@include not-a-directive.md\"\n---\nbody\n";
        assert!(find_directives(doc).is_empty());
    }

    #[test]
    fn test_pinner_rewrites_relative_paths() {
        let wf = workflow("org/repo/.github/workflows/triage.md@v1.0.0");
        let doc = "---\non: issues\n---\n@include shared/tools.md\n{{#import? ../agents/x.md#Usage}}\n@include other/repo/y.md@main\n";
        let out = IncludePinner.expand(doc, &wf, "v1.0.0").unwrap();
        assert_eq!(
            out,
            "---\non: issues\n---\n@include org/repo/.github/workflows/shared/tools.md@v1.0.0\n{{#import? org/repo/.github/agents/x.md@v1.0.0#Usage}}\n@include other/repo/y.md@main\n"
        );
        assert_eq!(IncludePinner.expand(&out, &wf, "v1.0.0").unwrap(), out);
    }

    #[test]
    fn test_pinner_without_reference_is_identity() {
        let wf = workflow("org/repo/wf.md");
        let doc = "@include a.md\n";
        assert_eq!(IncludePinner.expand(doc, &wf, "").unwrap(), doc);
    }

    #[test]
    fn test_inlining_recursive() {
        let fetcher = PrefetchedSources::new()
            .with_file(
                "org/repo",
                "wf/shared/a.md",
                "v2",
                "---\ntools: {}\n---\nA says hi\n@include b.md\n",
            )
            .with_file("org/repo", "wf/shared/b.md", "v2", "B says hi\n");
        let expander = InliningExpander::new(fetcher);
        let wf = workflow("org/repo/wf/main.md@v2");
        let out = expander
            .expand("# Main\n@include shared/a.md\nend\n", &wf, "v2")
            .unwrap();
        assert_eq!(out, "# Main\nA says hi\nB says hi\nend\n");
    }

    #[test]
    fn test_inlining_section_and_optional() {
        let fetcher = PrefetchedSources::new().with_file(
            "org/repo",
            "docs.md",
            "v1",
            "# Intro\nhello\n## Setup\nrun it\n## Other\nskip\n",
        );
        let expander = InliningExpander::new(fetcher);
        let wf = workflow("org/repo/wf.md@v1");
        let out = expander
            .expand("@include docs.md#Setup\n@include? missing.md\n", &wf, "v1")
            .unwrap();
        assert_eq!(out, "## Setup\nrun it\n");
    }

    #[test]
    fn test_inlining_missing_required_fails() {
        let expander = InliningExpander::new(PrefetchedSources::new());
        let wf = workflow("org/repo/wf.md@v1");
        let err = expander.expand("@include missing.md\n", &wf, "v1").unwrap_err();
        assert!(matches!(err, CoreError::ImportFetch { .. }));
    }

    #[test]
    fn test_inlining_detects_cycles() {
        let fetcher = PrefetchedSources::new()
            .with_file("org/repo", "a.md", "v1", "@include b.md\n")
            .with_file("org/repo", "b.md", "v1", "@include a.md\n");
        let expander = InliningExpander::new(fetcher);
        let wf = workflow("org/repo/a.md@v1");
        let err = expander.expand("@include b.md\n", &wf, "v1").unwrap_err();
        assert!(matches!(err, CoreError::ImportCycle(_)));
    }

    #[test]
    fn test_inlining_depth_limit() {
        let fetcher = PrefetchedSources::new()
            .with_file("org/repo", "1.md", "v1", "@include 2.md\n")
            .with_file("org/repo", "2.md", "v1", "@include 3.md\n")
            .with_file("org/repo", "3.md", "v1", "leaf\n");
        let wf = workflow("org/repo/root.md@v1");
        let shallow = InliningExpander::new(fetcher.clone()).with_max_depth(1);
        assert!(matches!(
            shallow.expand("@include 1.md\n", &wf, "v1"),
            Err(CoreError::ImportDepthExceeded(1))
        ));
        let settings = ImportSettings { max_depth: 3 };
        let configured = InliningExpander::from_config(fetcher.clone(), &settings);
        assert_eq!(configured.expand("@include 1.md\n", &wf, "v1").unwrap(), "leaf\n");
        let deep = InliningExpander::new(fetcher);
        assert_eq!(deep.expand("@include 1.md\n", &wf, "v1").unwrap(), "leaf\n");
    }
}
