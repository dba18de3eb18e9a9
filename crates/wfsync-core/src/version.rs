//! Semantic-version handling for upstream references.
//!
//! References follow Go-style semver: an optional `v` prefix, then
//! `MAJOR`, `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`. Prerelease and build
//! suffixes are only accepted on full triples. Shorthand forms are
//! canonicalized (`v6` -> `6.0.0`) before being handed to [`semver`].

use crate::diagnostics::{default_sink, Diagnostic, DiagnosticSink, Step};
use semver::{BuildMetadata, Version};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A reference that passed semantic-version validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Prerelease tag without the leading `-`; empty for releases.
    pub prerelease: String,
    /// The reference exactly as it was given.
    pub raw: String,
}

impl SemanticVersion {
    /// True when the raw form pins major, minor and patch.
    #[must_use]
    pub fn is_precise(&self) -> bool {
        is_precise_raw(&self.raw)
    }

    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// What an update should advance to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    /// A strictly newer release tag.
    Upgrade(String),
    /// Already on the newest eligible version.
    Current,
    /// The current reference is a branch or commit; keep tracking it.
    Unversioned,
}

/// Validates and orders version references.
#[derive(Clone)]
pub struct VersionComparator {
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for VersionComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VersionComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionComparator").finish_non_exhaustive()
    }
}

impl VersionComparator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: default_sink(),
        }
    }

    /// Use an explicit diagnostics sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// True iff `reference` is a valid semantic version, `v` prefix optional.
    #[must_use]
    pub fn is_version_tag(&self, reference: &str) -> bool {
        canonical(reference).is_some()
    }

    /// Parse a reference, or `None` when it is not a semantic version.
    ///
    /// Missing minor/patch components default to 0.
    #[must_use]
    pub fn parse(&self, reference: &str) -> Option<SemanticVersion> {
        let Some(version) = canonical(reference) else {
            self.sink.report(Diagnostic::verbose(
                Step::VersionParse,
                format!("'{reference}' is not a semantic version"),
            ));
            return None;
        };
        Some(SemanticVersion {
            major: version.major,
            minor: version.minor,
            patch: version.patch,
            prerelease: version.pre.as_str().to_string(),
            raw: reference.to_string(),
        })
    }

    /// True when `reference` names an exact patch release rather than a
    /// floating `vMAJOR` / `vMAJOR.MINOR` alias.
    #[must_use]
    pub fn is_precise(&self, reference: &str) -> bool {
        is_precise_raw(reference)
    }

    /// Semantic-version precedence of `a` relative to `b`, ignoring build
    /// metadata. `None` if either side is not a version.
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        Some(precedence(&canonical(a)?).cmp(&precedence(&canonical(b)?)))
    }

    /// True iff `a` orders strictly after `b`.
    #[must_use]
    pub fn is_newer(&self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Some(Ordering::Greater)
    }

    /// Pick the release to advance `current` to from the available tags.
    ///
    /// Prereleases are only eligible when `current` is itself a prerelease.
    /// Without `allow_major` the search stays within the current major.
    #[must_use]
    pub fn select_update<S: AsRef<str>>(
        &self,
        current: &str,
        candidates: &[S],
        allow_major: bool,
    ) -> UpdateTarget {
        let Some(current_version) = canonical(current) else {
            return UpdateTarget::Unversioned;
        };
        let include_pre = !current_version.pre.is_empty();

        let best = candidates
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|tag| canonical(tag).map(|v| (tag, precedence(&v))))
            .filter(|(_, v)| include_pre || v.pre.is_empty())
            .filter(|(_, v)| allow_major || v.major == current_version.major)
            .max_by(|(_, a), (_, b)| a.cmp(b));

        match best {
            Some((tag, version)) if version > precedence(&current_version) => {
                self.sink.report(Diagnostic::verbose(
                    Step::VersionParse,
                    format!("selected {tag} as update for {current}"),
                ));
                UpdateTarget::Upgrade(tag.to_string())
            }
            _ => UpdateTarget::Current,
        }
    }
}

fn is_precise_raw(reference: &str) -> bool {
    let bare = reference.strip_prefix('v').unwrap_or(reference);
    let numeric = bare.split(['-', '+']).next().unwrap_or_default();
    numeric.matches('.').count() >= 2
}

fn precedence(version: &Version) -> Version {
    let mut version = version.clone();
    version.build = BuildMetadata::EMPTY;
    version
}

/// Expand shorthand forms to a full triple and validate.
fn canonical(reference: &str) -> Option<Version> {
    let bare = reference.strip_prefix('v').unwrap_or(reference);
    if bare.is_empty() {
        return None;
    }

    let split_at = bare.find(['-', '+']).unwrap_or(bare.len());
    let (numeric, suffix) = bare.split_at(split_at);
    let components = numeric.split('.').count();

    let full = match components {
        1 if suffix.is_empty() => format!("{numeric}.0.0"),
        2 if suffix.is_empty() => format!("{numeric}.0"),
        3 => bare.to_string(),
        _ => return None,
    };

    Version::parse(&full).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use proptest::prelude::*;

    fn cmp() -> VersionComparator {
        VersionComparator::new()
    }

    #[test]
    fn test_is_version_tag() {
        let c = cmp();
        assert!(c.is_version_tag("v1.2.3"));
        assert!(c.is_version_tag("1.2.3"));
        assert!(c.is_version_tag("v6"));
        assert!(c.is_version_tag("v6.1"));
        assert!(c.is_version_tag("v1.0.0-beta.1+build.5"));

        assert!(!c.is_version_tag("main"));
        assert!(!c.is_version_tag("not-a-version"));
        assert!(!c.is_version_tag("v"));
        assert!(!c.is_version_tag(""));
        assert!(!c.is_version_tag("v1.2-beta"));
        assert!(!c.is_version_tag("v1.2.3.4"));
        assert!(!c.is_version_tag("v01.2.3"));
    }

    #[test]
    fn test_parse_defaults_missing_components() {
        let v = cmp().parse("v6").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (6, 0, 0));
        assert_eq!(v.raw, "v6");
        assert!(v.prerelease.is_empty());

        let v = cmp().parse("2.5").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2, 5, 0));
    }

    #[test]
    fn test_parse_prerelease() {
        let v = cmp().parse("v1.4.0-rc.2+sha.abc").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 4, 0));
        assert_eq!(v.prerelease, "rc.2");
        assert!(v.is_prerelease());
    }

    #[test]
    fn test_parse_invalid_reports_diagnostic() {
        let sink = CollectingSink::new();
        let c = VersionComparator::new().with_sink(sink.clone());
        assert!(c.parse("not-a-version").is_none());
        assert!(sink.has_step(Step::VersionParse));
    }

    #[test]
    fn test_is_precise() {
        let c = cmp();
        assert!(!c.is_precise("6"));
        assert!(!c.is_precise("v6"));
        assert!(!c.is_precise("v6.1"));
        assert!(c.is_precise("6.0.0"));
        assert!(c.is_precise("v6.0.0-rc.1"));
        assert!(c.parse("v1.2.3").unwrap().is_precise());
        assert!(!c.parse("v1").unwrap().is_precise());
    }

    #[test]
    fn test_is_newer() {
        let c = cmp();
        assert!(c.is_newer("v1.1.0", "v1.0.0"));
        assert!(c.is_newer("v2", "v1.9.9"));
        assert!(c.is_newer("v1.0.0", "v1.0.0-rc.1"));
        assert!(c.is_newer("v1.0.0-rc.2", "v1.0.0-rc.1"));
        assert!(!c.is_newer("v1.0.0", "v1.0.0"));
        assert!(!c.is_newer("v1.0.0+build.2", "v1.0.0+build.1"));
        assert!(!c.is_newer("main", "v1.0.0"));
        assert!(!c.is_newer("v1.0.0", "main"));
    }

    #[test]
    fn test_select_update_within_major() {
        let c = cmp();
        let tags = ["v1.0.0", "v1.2.0", "v1.10.1", "v2.0.0", "v1.11.0-rc.1", "latest"];
        assert_eq!(
            c.select_update("v1.0.0", &tags, false),
            UpdateTarget::Upgrade("v1.10.1".to_string())
        );
        assert_eq!(
            c.select_update("v1.0.0", &tags, true),
            UpdateTarget::Upgrade("v2.0.0".to_string())
        );
        assert_eq!(c.select_update("v2.0.0", &tags, true), UpdateTarget::Current);
    }

    #[test]
    fn test_select_update_prerelease_and_unversioned() {
        let c = cmp();
        let tags = ["v1.0.0", "v1.1.0-rc.1"];
        assert_eq!(
            c.select_update("v1.1.0-beta", &tags, false),
            UpdateTarget::Upgrade("v1.1.0-rc.1".to_string())
        );
        assert_eq!(c.select_update("v1.0.0", &tags, false), UpdateTarget::Current);
        assert_eq!(c.select_update("main", &tags, false), UpdateTarget::Unversioned);
    }

    fn version_strategy() -> impl Strategy<Value = String> {
        (0u64..20, 0u64..20, 0u64..20, prop::option::of(0u64..5)).prop_map(
            |(major, minor, patch, pre)| match pre {
                Some(n) => format!("v{major}.{minor}.{patch}-rc.{n}"),
                None => format!("v{major}.{minor}.{patch}"),
            },
        )
    }

    proptest! {
        #[test]
        fn prop_is_newer_matches_compare(a in version_strategy(), b in version_strategy()) {
            let c = cmp();
            prop_assert_eq!(c.is_newer(&a, &b), c.compare(&a, &b) == Some(Ordering::Greater));
            prop_assert!(!(c.is_newer(&a, &b) && c.is_newer(&b, &a)));
        }

        #[test]
        fn prop_numeric_ordering(
            x in (0u64..50, 0u64..50, 0u64..50),
            y in (0u64..50, 0u64..50, 0u64..50),
        ) {
            let c = cmp();
            let a = format!("{}.{}.{}", x.0, x.1, x.2);
            let b = format!("{}.{}.{}", y.0, y.1, y.2);
            prop_assert_eq!(c.is_newer(&a, &b), x > y);
        }

        #[test]
        fn prop_prerelease_before_release(
            major in 0u64..50,
            minor in 0u64..50,
            patch in 0u64..50,
            n in 0u64..10,
        ) {
            let c = cmp();
            let release = format!("v{major}.{minor}.{patch}");
            let pre = format!("{release}-alpha.{n}");
            prop_assert!(c.is_newer(&release, &pre));
        }
    }
}
