//! Whitespace canonicalization and deployment-field stripping.
//!
//! Both run before any comparison so that formatting noise and
//! environment-specific settings never register as drift.

use crate::frontmatter::{FieldEditor, FrontmatterEditor};

/// Canonicalizes documents for comparison and merging.
#[derive(Debug, Clone, Default)]
pub struct ContentNormalizer {
    editor: FrontmatterEditor,
}

impl ContentNormalizer {
    /// Normalizer whose deployment fields live under `trigger_section`.
    #[must_use]
    pub fn new(trigger_section: impl Into<String>) -> Self {
        Self {
            editor: FrontmatterEditor::new(trigger_section),
        }
    }

    /// See [`normalize`].
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        normalize(text)
    }

    /// Drop `field` from the trigger section of the header.
    #[must_use]
    pub fn strip_deployment_field(&self, text: &str, field: &str) -> String {
        self.editor.remove_trigger_field(text, field)
    }
}

/// Canonicalize whitespace:
/// - CRLF and lone CR become LF
/// - trailing spaces and tabs are removed from every line
/// - leading blank lines are dropped and runs of blank lines collapse to one
/// - non-empty output ends with exactly one newline
#[must_use]
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len() + 1);
    let mut pending_blank = false;

    for line in unified.split('\n') {
        let line = line.trim_end_matches([' ', '\t']);
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push('\n');
            pending_blank = false;
        }
        out.push_str(line);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_whitespace() {
        let input = "\n\n---\r\non: push  \r\n---\r\n\r\n\r\n# Title\t\n\n\n\nBody\n\n\n";
        assert_eq!(normalize(input), "---\non: push\n---\n\n# Title\n\nBody\n");
    }

    #[test]
    fn test_normalize_adds_final_newline() {
        assert_eq!(normalize("a\nb"), "a\nb\n");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t\n"), "");
    }

    #[test]
    fn test_normalize_keeps_indentation() {
        let yaml = "on:\n  push:\n    branches: [main]\n";
        assert_eq!(normalize(yaml), yaml);
    }

    #[test]
    fn test_formatting_only_differences_compare_equal() {
        let a = "---\non: push\n---\n# Title\n\nText\n";
        let b = "---\r\non: push   \r\n---\r\n# Title\r\n\r\n\r\nText";
        assert_eq!(normalize(a), normalize(b));
    }

    #[test]
    fn test_normalize_lone_cr_and_unicode() {
        assert_eq!(normalize("a\rb\u{3000}\r\n\r\r\nc\t"), "a\nb\u{3000}\n\nc\n");
        assert_eq!(normalize("é\u{a0}\r"), "é\u{a0}\n");
    }

    #[test]
    fn test_strip_deployment_field() {
        let normalizer = ContentNormalizer::default();
        let doc = "---\non:\n  issues:\n  stop-after: +30d\n---\nbody\n";
        let stripped = normalizer.strip_deployment_field(doc, "stop-after");
        assert_eq!(stripped, "---\non:\n  issues:\n---\nbody\n");
        assert_eq!(normalizer.strip_deployment_field(&stripped, "stop-after"), stripped);
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(text in "(\\PC|\\r|\\t|\\n){0,200}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
