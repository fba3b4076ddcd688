//! Scoped scratch files for a single job
//!
//! Every path a job acquires lives in a [`ScratchScope`] and is deleted when
//! the scope is released or dropped, on success, failure, cancellation or
//! unwinding alike. Deletion is best-effort: a failure (for example, the file
//! is already gone) is logged at warning level and swallowed.
//!
//! A finished output leaves the scope through [`ScratchScope::take_output`]
//! as an [`OutputArtifact`]; from then on the caller owns the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::domain::model::JobId;

/// What a scratch path is used for within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchRole {
    /// Materialized source bytes
    Source,
    /// Encoder output, handed to the caller on success
    Output,
}

impl ScratchRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScratchRole::Source => "source",
            ScratchRole::Output => "output",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            ScratchRole::Source => ".src",
            // Muxer picks the container from the extension
            ScratchRole::Output => ".mp4",
        }
    }
}

/// Owner of all scratch paths acquired by one job
pub struct ScratchScope {
    job_id: JobId,
    dir: PathBuf,
    entries: Vec<(ScratchRole, TempPath)>,
}

impl ScratchScope {
    /// Create an empty scope rooted at `dir`. Nothing touches disk until `acquire`.
    pub fn new(dir: impl Into<PathBuf>, job_id: JobId) -> Self {
        Self {
            job_id,
            dir: dir.into(),
            entries: Vec::new(),
        }
    }

    /// Create an empty scratch file for `role` and return its path
    pub fn acquire(&mut self, role: ScratchRole) -> io::Result<PathBuf> {
        debug_assert!(
            self.path(role).is_none(),
            "scratch role {} acquired twice",
            role.as_str()
        );

        fs::create_dir_all(&self.dir)?;
        let temp = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", self.job_id, role.as_str()))
            .suffix(role.suffix())
            .tempfile_in(&self.dir)?
            .into_temp_path();

        let path = temp.to_path_buf();
        debug!(job_id = %self.job_id, role = role.as_str(), path = %path.display(), "scratch path acquired");
        self.entries.push((role, temp));
        Ok(path)
    }

    /// Path currently held for `role`
    pub fn path(&self, role: ScratchRole) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, p)| p.as_ref())
    }

    /// Every path still owned by this scope
    pub fn held_paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|(_, p)| p.to_path_buf()).collect()
    }

    /// Move the output file out of the scope; it will no longer be deleted here
    pub fn take_output(&mut self) -> Option<OutputArtifact> {
        let index = self
            .entries
            .iter()
            .position(|(r, _)| *r == ScratchRole::Output)?;
        let (_, path) = self.entries.remove(index);
        let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Some(OutputArtifact { path, bytes })
    }

    /// Delete every held path now
    pub fn release(mut self) {
        self.release_all();
    }

    fn release_all(&mut self) {
        for (role, path) in self.entries.drain(..) {
            let display = path.to_path_buf();
            match path.close() {
                Ok(()) => {
                    debug!(job_id = %self.job_id, role = role.as_str(), path = %display.display(), "scratch path released");
                }
                Err(e) => {
                    warn!(
                        job_id = %self.job_id,
                        role = role.as_str(),
                        path = %display.display(),
                        error = %e,
                        "failed to delete scratch path"
                    );
                }
            }
        }
    }
}

impl Drop for ScratchScope {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Finished video note, owned by the caller
#[derive(Debug)]
pub struct OutputArtifact {
    path: TempPath,
    bytes: u64,
}

impl OutputArtifact {
    pub fn path(&self) -> &Path {
        self.path.as_ref()
    }

    /// Size in bytes at completion
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Move the artifact to `dest`, replacing any existing file.
    ///
    /// Falls back to copy-then-delete when a rename is not possible
    /// (scratch and destination on different filesystems).
    pub fn persist(self, dest: &Path) -> io::Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match self.path.persist(dest) {
            Ok(()) => Ok(dest.to_path_buf()),
            Err(err) => {
                let temp = err.path;
                fs::copy(&temp, dest)?;
                if let Err(e) = temp.close() {
                    warn!(error = %e, "failed to delete scratch output after copy");
                }
                Ok(dest.to_path_buf())
            }
        }
    }
}
