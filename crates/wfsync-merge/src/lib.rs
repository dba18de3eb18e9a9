//! Three-way merge engine for upstream-tracked workflows.
//!
//! Merges run through a [`ThreeWayMerger`]:
//! - [`GitMergeFile`]: `git merge-file --diff3`
//! - [`InProcessMerger`]: diff3 in memory, same exit-status contract
//! - [`ScriptedMerger`]: preset outcomes for protocol tests
//!
//! Each merge works in its own scratch directory, removed on every exit path.

pub mod diff3;
pub mod engine;
pub mod error;
pub mod git;
pub mod merger;
pub mod scripted;
pub mod updater;

pub use diff3::{merge_text, InProcessMerger, TextMerge};
pub use engine::{MergeEngine, MergeResult};
pub use error::{MergeError, Result};
pub use git::GitMergeFile;
pub use merger::{MergeOutput, MergeRequest, MergeStatus, ThreeWayMerger, FAILURE_THRESHOLD};
pub use scripted::{RecordedMerge, ScriptedMerger};
pub use updater::{UpdateOutcome, UpdateRequest, WorkflowUpdater};
