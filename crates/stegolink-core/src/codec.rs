//! Conversion between the text-safe transport encoding and raw bytes, and
//! hand-off of in-memory content to the host's file-save mechanism.

use base64::{engine::general_purpose::STANDARD, Engine};
use storage::{Download, DownloadSink, SavedFile};

use crate::error::{Result, TransferError};

/// Decode standard padded base64 into raw bytes.
pub fn decode_to_binary(encoded: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded.trim_end_matches(['\r', '\n']))?)
}

pub fn encode_to_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Wrap bytes as a downloadable resource.
pub fn blob(filename: impl Into<String>, bytes: Vec<u8>, mime_type: impl Into<String>) -> Download {
    Download::new(filename, mime_type, bytes)
}

/// Offer `bytes` to the sink under `filename`. The resource is moved into the
/// sink and dropped once saved.
pub async fn trigger_download<D>(
    sink: &D,
    filename: &str,
    bytes: Vec<u8>,
    mime_type: &str,
) -> Result<SavedFile>
where
    D: DownloadSink + ?Sized,
{
    save(sink, blob(filename, bytes, mime_type)).await
}

pub(crate) async fn save<D>(sink: &D, download: Download) -> Result<SavedFile>
where
    D: DownloadSink + ?Sized,
{
    let filename = download.filename.clone();
    let size = download.bytes.len();
    let saved = sink
        .save(download)
        .await
        .map_err(|e| TransferError::Persistence {
            filename: filename.clone(),
            reason: format!("{:#}", e),
        })?;
    tracing::info!("Download ready: {} ({} bytes)", filename, size);
    Ok(saved)
}
