// Local source adapter - Source bytes from a file on local disk

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// Serves a local file as if it came from an upstream collaborator
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
    declared_duration: Option<f64>,
    declare_size: bool,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            declared_duration: None,
            declare_size: true,
        }
    }

    /// Duration the caller claims for the source, checked in pre-flight
    pub fn with_declared_duration(mut self, seconds: Option<f64>) -> Self {
        self.declared_duration = seconds;
        self
    }

    /// Do not report the file size up front; only the on-disk check applies
    pub fn without_declared_size(mut self) -> Self {
        self.declare_size = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourcePort for LocalFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn metadata(&self) -> SourceMetadata {
        let size = if self.declare_size {
            tokio::fs::metadata(&self.path).await.ok().map(|m| m.len())
        } else {
            None
        };
        SourceMetadata::new(size, self.declared_duration)
    }

    /// Streams the file chunk by chunk so that dropping the future stops the copy
    async fn materialize(&self, dest: &Path) -> Result<u64, FailureKind> {
        let read_err =
            |e: std::io::Error| FailureKind::DecodeFailed(format!("read {}: {}", self.path.display(), e));
        let write_err =
            |e: std::io::Error| FailureKind::DecodeFailed(format!("write {}: {}", dest.display(), e));

        let mut reader = File::open(&self.path).await.map_err(read_err)?;
        let mut writer = File::create(dest).await.map_err(write_err)?;
        let bytes = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(read_err)?;
        writer.flush().await.map_err(write_err)?;
        debug!(source = %self.path.display(), bytes, "source materialized");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_metadata_declares_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![7u8; 2048]).unwrap();

        let source = LocalFileSource::new(&path).with_declared_duration(Some(12.5));
        let metadata = source.metadata().await;
        assert_eq!(metadata.declared_byte_size, Some(2048));
        assert_eq!(metadata.declared_duration_seconds, Some(12.5));

        let undeclared = LocalFileSource::new(&path).without_declared_size();
        assert_eq!(undeclared.metadata().await.declared_byte_size, None);
    }

    #[tokio::test]
    async fn test_materialize_copies_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"abc").unwrap();
        let dest = dir.path().join("scratch.src");

        let bytes = LocalFileSource::new(&path).materialize(&dest).await.unwrap();
        assert_eq!(bytes, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abc");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_materialize_stops_reading() {
        use std::io::Write;
        use std::process::Command;
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let fifo = dir.path().join("endless.mp4");
        let made = Command::new("mkfifo").arg(&fifo).status();
        if !made.map(|s| s.success()).unwrap_or(false) {
            eprintln!("mkfifo unavailable, skipping");
            return;
        }

        // Writer only stops once nobody reads the pipe any more
        let (done_tx, done_rx) = mpsc::channel();
        let writer_path = fifo.clone();
        std::thread::spawn(move || {
            let mut pipe = std::fs::OpenOptions::new().write(true).open(&writer_path).unwrap();
            let chunk = vec![0u8; 64 * 1024];
            while pipe.write_all(&chunk).is_ok() {}
            done_tx.send(()).unwrap();
        });

        let source = LocalFileSource::new(&fifo);
        let dest = dir.path().join("scratch.src");
        let copy = source.materialize(&dest);
        assert!(tokio::time::timeout(Duration::from_millis(200), copy).await.is_err());

        let stopped = tokio::task::spawn_blocking(move || done_rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(stopped.is_ok(), "copy kept reading after it was dropped");
    }

    #[tokio::test]
    async fn test_missing_file_is_decode_failure() {
        let dir = TempDir::new().unwrap();
        let source = LocalFileSource::new(dir.path().join("missing.mp4"));
        let err = source
            .materialize(&dir.path().join("out"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "decode_failed");
    }
}
