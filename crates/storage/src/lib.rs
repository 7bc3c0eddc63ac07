use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// A transient downloadable resource: in-memory content plus the name and
/// MIME type the host should save it under. Consumed by the sink that saves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Download {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Where a download ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub location: PathBuf,
    pub size: usize,
}

/// Host-side file-save mechanism. Once `save` returns, the sink owns nothing
/// of the download.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn save(&self, download: Download) -> Result<SavedFile>;

    /// Take back a file this sink saved earlier.
    async fn discard(&self, saved: &SavedFile) -> Result<()>;
}

/// Saves downloads into a directory on the local filesystem. Existing files
/// are never overwritten; a ` (n)` suffix is appended instead.
#[derive(Clone, Debug)]
pub struct LocalDownloads {
    dir: PathBuf,
}

impl LocalDownloads {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create download directory {}", dir.display()))?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidate(&self, filename: &str, attempt: u32) -> PathBuf {
        if attempt == 0 {
            return self.dir.join(filename);
        }
        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.dir.join(format!("{} ({}).{}", stem, attempt, ext)),
            None => self.dir.join(format!("{} ({})", stem, attempt)),
        }
    }
}

/// Strip any directory components so a download can only land inside the sink.
fn bare_filename(filename: &str) -> Result<&str> {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid download filename: {:?}", filename))
}

/// Write `bytes` to a freshly created `path`. On failure the partial file is
/// removed so nothing truncated is left in the download directory.
async fn write_or_remove<W>(path: &Path, mut file: W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    drop(file);

    if let Err(e) = written {
        if let Err(rm) = fs::remove_file(path).await {
            tracing::warn!("Could not remove partial {}: {}", path.display(), rm);
        }
        return Err(e).with_context(|| format!("Failed to write {}", path.display()));
    }
    Ok(())
}

#[async_trait]
impl DownloadSink for LocalDownloads {
    async fn save(&self, download: Download) -> Result<SavedFile> {
        let filename = bare_filename(&download.filename)?;

        let mut attempt = 0u32;
        let (path, file) = loop {
            let path = self.candidate(filename, attempt);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create {}", path.display()));
                }
            }
        };

        write_or_remove(&path, file, &download.bytes).await?;

        tracing::debug!(
            "Saved {} ({} bytes, {}) to {}",
            download.filename,
            download.bytes.len(),
            download.mime_type,
            path.display()
        );

        Ok(SavedFile {
            location: path,
            size: download.bytes.len(),
        })
    }

    async fn discard(&self, saved: &SavedFile) -> Result<()> {
        if !saved.location.starts_with(&self.dir) {
            anyhow::bail!("{} was not saved by this sink", saved.location.display());
        }
        if fs::try_exists(&saved.location).await.unwrap_or(false) {
            fs::remove_file(&saved.location)
                .await
                .with_context(|| format!("Failed to remove {}", saved.location.display()))?;
            tracing::debug!("Removed {}", saved.location.display());
        }
        Ok(())
    }
}

/// Keeps downloads in memory, in the order they were saved.
#[derive(Default)]
pub struct MemoryDownloads {
    saved: Mutex<Vec<Download>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn downloads(&self) -> Vec<Download> {
        self.saved.lock().await.clone()
    }

    pub async fn filenames(&self) -> Vec<String> {
        self.saved
            .lock()
            .await
            .iter()
            .map(|d| d.filename.clone())
            .collect()
    }
}

#[async_trait]
impl DownloadSink for MemoryDownloads {
    async fn save(&self, download: Download) -> Result<SavedFile> {
        let saved = SavedFile {
            location: PathBuf::from(&download.filename),
            size: download.bytes.len(),
        };
        self.saved.lock().await.push(download);
        Ok(saved)
    }

    async fn discard(&self, saved: &SavedFile) -> Result<()> {
        let mut downloads = self.saved.lock().await;
        if let Some(pos) = downloads
            .iter()
            .rposition(|d| saved.location == Path::new(&d.filename))
        {
            downloads.remove(pos);
        }
        Ok(())
    }
}
