//! `git merge-file` as the merge primitive.

use crate::merger::{MergeOutput, MergeRequest, ThreeWayMerger};
use std::io;
use std::process::Command;
use tracing::debug;
use wfsync_core::MergeSettings;

/// Runs `<program> merge-file -L .. -L .. -L .. --diff3 current base new`.
#[derive(Debug, Clone)]
pub struct GitMergeFile {
    program: String,
}

impl Default for GitMergeFile {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitMergeFile {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use the program named in `settings`.
    #[must_use]
    pub fn from_config(settings: &MergeSettings) -> Self {
        Self::new(settings.program.clone())
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The command for `request`, labels in current, base, new order.
    #[must_use]
    pub fn command(&self, request: &MergeRequest<'_>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("merge-file")
            .arg("-L")
            .arg(&request.labels.current)
            .arg("-L")
            .arg(&request.labels.base)
            .arg("-L")
            .arg(&request.labels.new)
            .arg("--diff3")
            .arg(request.current)
            .arg(request.base)
            .arg(request.new);
        command
    }
}

impl ThreeWayMerger for GitMergeFile {
    fn name(&self) -> &str {
        &self.program
    }

    fn merge_files(&self, request: &MergeRequest<'_>) -> io::Result<MergeOutput> {
        let output = self.command(request).output()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(program = %self.program, status = ?output.status.code(), "merge-file finished");

        Ok(MergeOutput::new(output.status.code(), combined))
    }
}
