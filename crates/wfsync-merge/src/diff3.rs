//! In-process diff3 merge over lines.
//!
//! Both sides are diffed against the base with the `similar` crate (Myers).
//! Change hunks that overlap or touch in base coordinates are grouped into
//! regions; a region changed by one side takes that side, a region changed
//! identically by both takes either, anything else becomes a conflict with
//! local, base and upstream hunks.

use crate::merger::{MergeOutput, MergeRequest, ThreeWayMerger, FAILURE_THRESHOLD};
use similar::{capture_diff_slices, Algorithm, DiffTag};
use std::fs;
use std::io;
use wfsync_core::MergeLabels;

/// Result of merging three texts in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMerge {
    pub content: String,
    pub conflicts: u32,
}

/// A [`ThreeWayMerger`] that needs no external binary.
///
/// Honors the same file and exit-status contract as `git merge-file`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessMerger;

impl ThreeWayMerger for InProcessMerger {
    fn name(&self) -> &str {
        "in-process diff3"
    }

    fn merge_files(&self, request: &MergeRequest<'_>) -> io::Result<MergeOutput> {
        let current = fs::read_to_string(request.current)?;
        let base = fs::read_to_string(request.base)?;
        let new = fs::read_to_string(request.new)?;

        let merged = merge_text(&current, &base, &new, request.labels);
        fs::write(request.current, &merged.content)?;

        let status = i32::try_from(merged.conflicts)
            .unwrap_or(i32::MAX)
            .min(FAILURE_THRESHOLD - 1);
        let output = if merged.conflicts == 0 {
            String::new()
        } else {
            format!("{} conflict(s) in {}", merged.conflicts, request.current.display())
        };
        Ok(MergeOutput::new(Some(status), output))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Current,
    New,
}

#[derive(Debug, Clone, Copy)]
struct Hunk {
    side: Side,
    base_start: usize,
    base_end: usize,
    side_start: usize,
    side_end: usize,
}

/// Three-way merge `base -> current` and `base -> new`.
#[must_use]
pub fn merge_text(current: &str, base: &str, new: &str, labels: &MergeLabels) -> TextMerge {
    let base_lines: Vec<&str> = base.split_inclusive('\n').collect();
    let current_lines: Vec<&str> = current.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();

    let mut hunks = changes(&base_lines, &current_lines, Side::Current);
    hunks.extend(changes(&base_lines, &new_lines, Side::New));
    hunks.sort_by_key(|h| (h.base_start, h.base_end));

    let mut out = String::with_capacity(current.len().max(new.len()));
    let mut conflicts = 0;
    let mut cursor = 0;
    let mut i = 0;

    while i < hunks.len() {
        let region_start = hunks[i].base_start;
        let mut region_end = hunks[i].base_end;
        let mut j = i + 1;
        while j < hunks.len() && hunks[j].base_start <= region_end {
            region_end = region_end.max(hunks[j].base_end);
            j += 1;
        }

        push_lines(&mut out, &base_lines[cursor..region_start]);

        let group = &hunks[i..j];
        let ours = side_slice(&current_lines, group, Side::Current, region_start, region_end);
        let theirs = side_slice(&new_lines, group, Side::New, region_start, region_end);

        match (ours, theirs) {
            (Some(ours), Some(theirs)) if ours != theirs => {
                conflicts += 1;
                push_marker(&mut out, "<<<<<<<", &labels.current);
                push_lines(&mut out, ours);
                push_marker(&mut out, "|||||||", &labels.base);
                push_lines(&mut out, &base_lines[region_start..region_end]);
                push_marker(&mut out, "=======", "");
                push_lines(&mut out, theirs);
                push_marker(&mut out, ">>>>>>>", &labels.new);
            }
            (Some(lines), _) | (None, Some(lines)) => push_lines(&mut out, lines),
            (None, None) => push_lines(&mut out, &base_lines[region_start..region_end]),
        }

        cursor = region_end;
        i = j;
    }

    push_lines(&mut out, &base_lines[cursor..]);

    TextMerge {
        content: out,
        conflicts,
    }
}

fn changes(base: &[&str], side: &[&str], which: Side) -> Vec<Hunk> {
    capture_diff_slices(Algorithm::Myers, base, side)
        .iter()
        .map(similar::DiffOp::as_tag_tuple)
        .filter(|(tag, _, _)| *tag != DiffTag::Equal)
        .map(|(_, old, new)| Hunk {
            side: which,
            base_start: old.start,
            base_end: old.end,
            side_start: new.start,
            side_end: new.end,
        })
        .collect()
}

/// Lines of one side spanning base region `[start, end)`, or `None` when that
/// side left the region untouched.
fn side_slice<'a>(
    lines: &'a [&'a str],
    group: &[Hunk],
    side: Side,
    start: usize,
    end: usize,
) -> Option<&'a [&'a str]> {
    let mut mine = group.iter().filter(|h| h.side == side);
    let first = mine.next()?;
    let last = mine.last().unwrap_or(first);
    let from = first.side_start - (first.base_start - start);
    let to = last.side_end + (end - last.base_end);
    Some(&lines[from..to])
}

fn push_lines(out: &mut String, lines: &[&str]) {
    for line in lines {
        out.push_str(line);
    }
}

fn push_marker(out: &mut String, marker: &str, label: &str) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(marker);
    if !label.is_empty() {
        out.push(' ');
        out.push_str(label);
    }
    out.push('\n');
}
