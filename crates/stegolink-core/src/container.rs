//! Output carrier selection.
//!
//! Compressed audio and video are not usable carriers, so the service
//! normalizes them into an uncompressed or lossless container. The file name
//! offered for download has to match what the service actually produced.

use std::fmt;

const AUDIO: &[&str] = &["wav", "mp3"];
const VIDEO: &[&str] = &["mp4", "avi", "mkv", "mov"];
const IMAGE: &[&str] = &["png", "jpg", "jpeg"];

/// Stego carriers the extraction endpoint knows how to read.
pub const EXTRACTABLE: &[&str] = &["png", "jpg", "jpeg", "txt", "wav", "avi"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    Text,
    Audio,
    Video,
    Image,
    /// Unrecognized input; the original extension is reused as-is.
    PassThrough(String),
}

impl ContainerFormat {
    /// Map a cover file extension to its output container. Case-insensitive
    /// and total.
    pub fn resolve(extension: &str) -> Self {
        let lower = extension.to_ascii_lowercase();
        let ext = lower.as_str();
        if ext == "txt" {
            Self::Text
        } else if AUDIO.contains(&ext) {
            Self::Audio
        } else if VIDEO.contains(&ext) {
            Self::Video
        } else if IMAGE.contains(&ext) {
            Self::Image
        } else {
            Self::PassThrough(extension.to_string())
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            Self::Text => "txt",
            Self::Audio => "wav",
            Self::Video => "avi",
            Self::Image => "png",
            Self::PassThrough(ext) => ext,
        }
    }

    /// MIME type the service answers with for this carrier.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Text => "text/plain",
            Self::Audio => "audio/wav",
            Self::Video => "video/x-msvideo",
            Self::Image => "image/png",
            Self::PassThrough(_) => "application/octet-stream",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::PassThrough(_))
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Resolve straight to the output extension.
pub fn resolve_extension(extension: &str) -> String {
    ContainerFormat::resolve(extension).extension().to_string()
}

/// Extension as declared by a file name: everything after the last dot,
/// lower-cased. A name without a dot is taken whole.
pub fn declared_extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_lowercase()
}

pub fn is_extractable(filename: &str) -> bool {
    EXTRACTABLE.contains(&declared_extension(filename).as_str())
}
