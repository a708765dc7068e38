//! Checkpoint kept in a single local file.
//!
//! The file holds the last settled position as decimal text; `0` (or an empty
//! file) means "no position". Writes go to a sibling temp file which is synced
//! and then renamed over the target, so a crash never leaves a half-written
//! value behind. On Unix the directory is synced after the rename so the new
//! value also survives a power loss.

use order_mirror_core::checkpoint::{CheckpointError, CheckpointStore, Position};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncWriteExt;

/// [`CheckpointStore`] backed by a file on local disk.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store the checkpoint at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    async fn read(&self) -> Result<Option<Position>, CheckpointError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No checkpoint file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(parse(&self.path, &content))
    }

    async fn write(&self, value: u64) -> Result<(), CheckpointError> {
        let temp = self.temp_path();

        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(value.to_string().as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp, &self.path).await?;

        #[cfg(unix)]
        tokio::fs::File::open(self.parent_dir()).await?.sync_all().await?;

        Ok(())
    }
}

fn parse(path: &Path, content: &str) -> Option<Position> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<u64>() {
        Ok(value) => Position::new(value),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                content = trimmed,
                error = %e,
                "Ignoring unparsable checkpoint"
            );
            None
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<Position>, CheckpointError>> + Send + '_>> {
        Box::pin(self.read())
    }

    fn save(&self, position: Position) -> Pin<Box<dyn Future<Output = Result<(), CheckpointError>> + Send + '_>> {
        Box::pin(self.write(position.get()))
    }

    fn reset(&self) -> Pin<Box<dyn Future<Output = Result<(), CheckpointError>> + Send + '_>> {
        Box::pin(self.write(0))
    }
}
