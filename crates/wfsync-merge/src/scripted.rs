//! A scripted merger for exercising the merge protocol without a binary.

use crate::merger::{MergeOutput, MergeRequest, ThreeWayMerger};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use wfsync_core::MergeLabels;

/// Inputs captured from one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMerge {
    pub labels: MergeLabels,
    pub current_path: PathBuf,
    pub base_path: PathBuf,
    pub new_path: PathBuf,
    pub current: String,
    pub base: String,
    pub new: String,
}

#[derive(Debug, Clone)]
enum Script {
    Finish {
        status: Option<i32>,
        content: Option<String>,
        output: String,
    },
    SpawnError,
}

/// Returns a preset status, optionally overwriting the current file, and
/// records what it was asked to merge.
#[derive(Debug)]
pub struct ScriptedMerger {
    script: Script,
    calls: Mutex<Vec<RecordedMerge>>,
}

impl ScriptedMerger {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Exit 0 after writing `content`.
    #[must_use]
    pub fn clean(content: impl Into<String>) -> Self {
        Self::with_script(Script::Finish {
            status: Some(0),
            content: Some(content.into()),
            output: String::new(),
        })
    }

    /// Exit `conflicts` after writing the conflict-marked `content`.
    #[must_use]
    pub fn conflicted(conflicts: i32, content: impl Into<String>) -> Self {
        Self::with_script(Script::Finish {
            status: Some(conflicts),
            content: Some(content.into()),
            output: format!("warning: {conflicts} conflicts"),
        })
    }

    /// Exit with `status` (or by signal when `None`), leaving files untouched.
    #[must_use]
    pub fn exiting(status: Option<i32>, output: impl Into<String>) -> Self {
        Self::with_script(Script::Finish {
            status,
            content: None,
            output: output.into(),
        })
    }

    /// Fail as if the program could not be started.
    #[must_use]
    pub fn unspawnable() -> Self {
        Self::with_script(Script::SpawnError)
    }

    /// Every recorded invocation, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedMerge> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ThreeWayMerger for ScriptedMerger {
    fn name(&self) -> &str {
        "scripted"
    }

    fn merge_files(&self, request: &MergeRequest<'_>) -> io::Result<MergeOutput> {
        let record = RecordedMerge {
            labels: request.labels.clone(),
            current_path: request.current.to_path_buf(),
            base_path: request.base.to_path_buf(),
            new_path: request.new.to_path_buf(),
            current: fs::read_to_string(request.current)?,
            base: fs::read_to_string(request.base)?,
            new: fs::read_to_string(request.new)?,
        };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);

        match &self.script {
            Script::SpawnError => Err(io::Error::new(io::ErrorKind::NotFound, "no such program")),
            Script::Finish {
                status,
                content,
                output,
            } => {
                if let Some(content) = content {
                    fs::write(request.current, content)?;
                }
                Ok(MergeOutput::new(*status, output.clone()))
            }
        }
    }
}
