//! Frontmatter access and in-place field rewriting.
//!
//! Edits are textual: only the lines belonging to the touched field change,
//! so a rewritten document still merges cleanly against its neighbours.

use crate::error::{CoreError, Result};
use serde_yaml::{Mapping, Value};
use std::ops::Range;

/// Delimiter line around the header block.
const DELIMITER: &str = "---";

/// Rewrites single fields of a workflow header.
pub trait FieldEditor: Send + Sync {
    /// Set top-level `field` to the scalar `value`, replacing any existing value.
    ///
    /// # Errors
    /// Returns an error if the document has no header or it is not a mapping.
    fn set_field(&self, document: &str, field: &str, value: &str) -> Result<String>;

    /// Remove top-level `field`. Documents without it are returned unchanged.
    fn remove_field(&self, document: &str, field: &str) -> String;

    /// Remove `field` from the trigger section. Documents without that field
    /// are returned unchanged.
    fn remove_trigger_field(&self, document: &str, field: &str) -> String;

    /// Give `into` the trigger-section `field` exactly as `from` has it,
    /// removing it from `into` when `from` has none.
    fn carry_trigger_field(&self, from: &str, into: &str, field: &str) -> String;
}

/// [`FieldEditor`] over `---` delimited YAML headers.
#[derive(Debug, Clone)]
pub struct FrontmatterEditor {
    trigger_section: String,
}

impl Default for FrontmatterEditor {
    fn default() -> Self {
        Self::new("on")
    }
}

impl FrontmatterEditor {
    #[must_use]
    pub fn new(trigger_section: impl Into<String>) -> Self {
        Self {
            trigger_section: trigger_section.into(),
        }
    }
}

impl FieldEditor for FrontmatterEditor {
    fn set_field(&self, document: &str, field: &str, value: &str) -> Result<String> {
        set_field(document, field, value)
    }

    fn remove_field(&self, document: &str, field: &str) -> String {
        remove_field(document, field)
    }

    fn remove_trigger_field(&self, document: &str, field: &str) -> String {
        remove_section_field(document, &self.trigger_section, field)
    }

    fn carry_trigger_field(&self, from: &str, into: &str, field: &str) -> String {
        carry_section_field(from, into, &self.trigger_section, field)
    }
}

/// A document split at its header delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frontmatter<'a> {
    /// YAML between the delimiters.
    pub header: &'a str,
    /// Everything after the closing delimiter.
    pub body: &'a str,
}

impl<'a> Frontmatter<'a> {
    /// Split `document`, or `None` if it does not open with a header.
    #[must_use]
    pub fn split(document: &'a str) -> Option<Self> {
        let lines: Vec<&str> = document.split_inclusive('\n').collect();
        let close = closing_index(&lines)?;
        let header_start = lines[0].len();
        let header_end = header_start + lines[1..close].iter().map(|l| l.len()).sum::<usize>();
        let body_start = header_end + lines[close].len();
        Some(Self {
            header: &document[header_start..header_end],
            body: &document[body_start..],
        })
    }

    /// Parse the header into a YAML mapping. An empty header is an empty mapping.
    ///
    /// # Errors
    /// Returns an error if the header is not valid YAML or not a mapping.
    pub fn fields(&self) -> Result<Mapping> {
        match serde_yaml::from_str::<Value>(self.header)? {
            Value::Mapping(map) => Ok(map),
            Value::Null => Ok(Mapping::new()),
            other => Err(CoreError::InvalidFrontmatter(format!(
                "expected a mapping, found {}",
                kind(&other)
            ))),
        }
    }
}

/// Read a top-level string field.
#[must_use]
pub fn get_field(document: &str, field: &str) -> Option<String> {
    let fields = Frontmatter::split(document)?.fields().ok()?;
    fields.get(field)?.as_str().map(String::from)
}

/// Set top-level `field` to `value` in place, appending it to the header
/// when absent.
///
/// # Errors
/// Returns `MissingFrontmatter` or `InvalidFrontmatter`/`Yaml` when the
/// header cannot be edited.
pub fn set_field(document: &str, field: &str, value: &str) -> Result<String> {
    let frontmatter = Frontmatter::split(document).ok_or(CoreError::MissingFrontmatter)?;
    frontmatter.fields()?;

    let lines: Vec<&str> = document.split_inclusive('\n').collect();
    let close = closing_index(&lines).ok_or(CoreError::MissingFrontmatter)?;
    let rendered = format!("{field}: {}\n", render_scalar(value)?);

    let range = top_level_line(&lines, close, field)
        .map_or(close..close, |start| start..block_end(&lines, start, close));
    Ok(splice(&lines, range, &[rendered.as_str()]))
}

/// Remove top-level `field` and its nested lines.
#[must_use]
pub fn remove_field(document: &str, field: &str) -> String {
    let lines: Vec<&str> = document.split_inclusive('\n').collect();
    let Some(close) = closing_index(&lines) else {
        return document.to_string();
    };
    let Some(start) = top_level_line(&lines, close, field) else {
        return document.to_string();
    };
    splice(&lines, start..block_end(&lines, start, close), &[])
}

/// Remove `field` (and its nested lines) from the top-level `section` block.
///
/// Flow-style sections (`on: { ... }`) are left untouched.
#[must_use]
pub fn remove_section_field(document: &str, section: &str, field: &str) -> String {
    let lines: Vec<&str> = document.split_inclusive('\n').collect();
    match locate_section_field(&lines, section, field).and_then(|found| found.field) {
        Some(range) => splice(&lines, range, &[]),
        None => document.to_string(),
    }
}

/// Copy `section.field` from `from` into `into`, replacing the value `into`
/// has. When `from` lacks the field it is removed from `into`.
///
/// Nested lines are re-indented to the child indent of `into`'s section.
/// A target without a block-style `section` is returned unchanged.
#[must_use]
pub fn carry_section_field(from: &str, into: &str, section: &str, field: &str) -> String {
    let from_lines: Vec<&str> = from.split_inclusive('\n').collect();
    let carried = locate_section_field(&from_lines, section, field).and_then(|found| {
        let range = found.field?;
        Some((found.child_indent?, &from_lines[range]))
    });

    let into_lines: Vec<&str> = into.split_inclusive('\n').collect();
    let Some(target) = locate_section_field(&into_lines, section, field) else {
        return into.to_string();
    };

    match (carried, target.child_indent) {
        (None, _) => match target.field {
            Some(range) => splice(&into_lines, range, &[]),
            None => into.to_string(),
        },
        (Some(_), None) => into.to_string(),
        (Some((from_indent, block)), Some(into_indent)) => {
            let reindented: Vec<String> = block
                .iter()
                .map(|line| reindent(line, from_indent, into_indent))
                .collect();
            let range = target
                .field
                .unwrap_or(target.section_end..target.section_end);
            let replacement: Vec<&str> = reindented.iter().map(String::as_str).collect();
            splice(&into_lines, range, &replacement)
        }
    }
}

/// Where a child field sits inside a top-level section.
struct SectionField {
    /// One past the last line of the section.
    section_end: usize,
    /// Indent of the section's children; `None` for flow or scalar sections.
    child_indent: Option<usize>,
    /// Lines of the field, trailing blank lines excluded.
    field: Option<Range<usize>>,
}

fn locate_section_field(lines: &[&str], section: &str, field: &str) -> Option<SectionField> {
    let close = closing_index(lines)?;
    let section_line = top_level_line(lines, close, section)?;
    let section_end = block_end(lines, section_line, close);

    let child_indent = lines[section_line + 1..section_end]
        .iter()
        .find(|l| is_content(l))
        .map(|l| indent_of(l));

    let field = child_indent.and_then(|indent| {
        let start = (section_line + 1..section_end).find(|&i| {
            is_content(lines[i])
                && indent_of(lines[i]) == indent
                && line_key(lines[i]) == Some(field)
        })?;
        let mut end = start + 1;
        while end < section_end && (!is_content(lines[end]) || indent_of(lines[end]) > indent) {
            end += 1;
        }
        // Blank lines trailing the field stay with the section.
        while end > start + 1 && !is_content(lines[end - 1]) {
            end -= 1;
        }
        Some(start..end)
    });

    Some(SectionField {
        section_end,
        child_indent,
        field,
    })
}

fn top_level_line(lines: &[&str], close: usize, key: &str) -> Option<usize> {
    (1..close).find(|&i| is_top_level(lines[i]) && line_key(lines[i]) == Some(key))
}

fn splice(lines: &[&str], range: Range<usize>, replacement: &[&str]) -> String {
    let mut out = String::new();
    lines[..range.start].iter().for_each(|l| out.push_str(l));
    replacement.iter().for_each(|l| out.push_str(l));
    lines[range.end..].iter().for_each(|l| out.push_str(l));
    out
}

fn reindent(line: &str, from: usize, to: usize) -> String {
    if !is_content(line) {
        return line.to_string();
    }
    let strip = indent_of(line).min(from);
    format!("{}{}", " ".repeat(to), &line[strip..])
}

fn closing_index(lines: &[&str]) -> Option<usize> {
    if lines.first()?.trim_end() != DELIMITER {
        return None;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| l.trim_end() == DELIMITER)
        .map(|(i, _)| i)
}

/// Index one past the last line belonging to the top-level key at `start`.
fn block_end(lines: &[&str], start: usize, close: usize) -> usize {
    let mut end = start + 1;
    while end < close {
        let line = lines[end];
        let continues = if is_content(line) {
            is_nested(line)
        } else {
            next_content_is_nested(lines, end, close)
        };
        if !continues {
            break;
        }
        end += 1;
    }
    end
}

/// Indented lines and column-zero sequence items belong to the key above.
fn is_nested(line: &str) -> bool {
    line.starts_with([' ', '\t', '-'])
}

fn next_content_is_nested(lines: &[&str], from: usize, close: usize) -> bool {
    lines[from..close]
        .iter()
        .find(|l| is_content(l))
        .is_some_and(|l| is_nested(l))
}

fn is_top_level(line: &str) -> bool {
    !line.starts_with([' ', '\t'])
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// The mapping key on `line`, with surrounding quotes removed.
fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') || trimmed.starts_with('-') {
        return None;
    }
    let bytes = trimmed.as_bytes();
    let colon = (0..bytes.len()).find(|&i| {
        bytes[i] == b':' && bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace())
    })?;
    let key = trimmed[..colon].trim();
    let key = key
        .strip_prefix('"')
        .and_then(|k| k.strip_suffix('"'))
        .or_else(|| key.strip_prefix('\'').and_then(|k| k.strip_suffix('\'')))
        .unwrap_or(key);
    Some(key)
}

fn render_scalar(value: &str) -> Result<String> {
    Ok(serde_yaml::to_string(value)?.trim_end().to_string())
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
