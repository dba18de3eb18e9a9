//! The three-way merge primitive seam.
//!
//! A merger follows the `git merge-file` contract: it rewrites the current
//! file in place and reports through its exit status. 0 is a clean merge,
//! 1..=127 is the number of conflicts (the file still holds the result with
//! inline markers), and 128 or above, a negative status or termination by
//! signal means the tool itself failed.

use std::io;
use std::path::Path;
use wfsync_core::MergeLabels;

/// Statuses at or above this value are tool failures, not conflict counts.
pub const FAILURE_THRESHOLD: i32 = 128;

/// The inputs of one merge-file invocation. `current` is updated in place.
#[derive(Debug, Clone, Copy)]
pub struct MergeRequest<'a> {
    pub current: &'a Path,
    pub base: &'a Path,
    pub new: &'a Path,
    pub labels: &'a MergeLabels,
}

/// What the merge primitive reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    /// Exit status; `None` when terminated by a signal.
    pub status: Option<i32>,
    /// Combined stdout and stderr, kept for diagnostics.
    pub output: String,
}

impl MergeOutput {
    #[must_use]
    pub fn new(status: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }
}

/// Interpretation of a merge exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    Clean,
    /// The given number of conflict regions were marked in the output file.
    Conflicted(u32),
    Failed,
}

impl MergeStatus {
    #[must_use]
    pub fn from_exit(status: Option<i32>) -> Self {
        match status {
            Some(0) => Self::Clean,
            Some(n) if (1..FAILURE_THRESHOLD).contains(&n) => Self::Conflicted(n.unsigned_abs()),
            _ => Self::Failed,
        }
    }

    #[must_use]
    pub const fn has_conflicts(self) -> bool {
        matches!(self, Self::Conflicted(_))
    }
}

/// A diff3-capable three-way file merger.
pub trait ThreeWayMerger: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Merge `base -> new` into `current`, writing diff3-style markers
    /// (local, base and upstream hunks) on conflict.
    ///
    /// # Errors
    /// Returns an error only when the merger could not be run at all.
    fn merge_files(&self, request: &MergeRequest<'_>) -> io::Result<MergeOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_interpretation() {
        assert_eq!(MergeStatus::from_exit(Some(0)), MergeStatus::Clean);
        assert_eq!(MergeStatus::from_exit(Some(1)), MergeStatus::Conflicted(1));
        assert_eq!(MergeStatus::from_exit(Some(127)), MergeStatus::Conflicted(127));
        assert_eq!(MergeStatus::from_exit(Some(128)), MergeStatus::Failed);
        assert_eq!(MergeStatus::from_exit(Some(255)), MergeStatus::Failed);
        assert_eq!(MergeStatus::from_exit(Some(-1)), MergeStatus::Failed);
        assert_eq!(MergeStatus::from_exit(None), MergeStatus::Failed);
        assert!(MergeStatus::Conflicted(3).has_conflicts());
        assert!(!MergeStatus::Clean.has_conflicts());
    }
}
