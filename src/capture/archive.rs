use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Local copy of the published stream: appends every chunk payload to one
/// file per session under the configured archive directory.
pub struct ChunkArchive {
    path: PathBuf,
    file: File,
    bytes_written: u64,
}

impl ChunkArchive {
    pub async fn create(dir: &Path, session_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .context("Failed to create archive directory")?;

        let path = dir.join(format!("{}.wav", session_id));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open archive file {:?}", path))?;

        info!("Archiving capture to {:?}", path);

        Ok(Self {
            path,
            file,
            bytes_written: 0,
        })
    }

    pub async fn append(&mut self, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }

        self.file
            .write_all(payload)
            .await
            .context("Failed to append chunk to archive")?;
        self.bytes_written += payload.len() as u64;

        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.file.flush().await.context("Failed to flush archive")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
