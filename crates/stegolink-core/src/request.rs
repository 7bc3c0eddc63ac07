//! Request assembly. Every builder validates all of its inputs before
//! producing anything, so an incomplete request never exists.

use std::fmt;
use std::path::Path;

use crate::container::{declared_extension, ContainerFormat};
use crate::error::{Result, TransferError};

pub const KEYGEN_PATH: &str = "/generate-keys";
pub const HIDE_PATH: &str = "/sender/hide";
pub const EXTRACT_PATH: &str = "/receiver/extract";

/// A user-selected file: its original name and its content.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its final path component as the name.
    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?
            .to_string();
        Ok(Self { name, bytes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn declared_extension(&self) -> String {
        declared_extension(&self.name)
    }
}

// Content may be key material; only the name and size are ever shown.
impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Content of one multipart field, borrowed from the request it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartBody<'a> {
    File { filename: &'a str, bytes: &'a [u8] },
    Text(&'a str),
}

/// One named field of a multipart body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPart<'a> {
    pub name: &'static str,
    pub body: PartBody<'a>,
}

impl<'a> RequestPart<'a> {
    fn file(name: &'static str, file: &'a SelectedFile) -> Self {
        Self {
            name,
            body: PartBody::File {
                filename: &file.name,
                bytes: &file.bytes,
            },
        }
    }

    fn text(name: &'static str, text: &'a str) -> Self {
        Self {
            name,
            body: PartBody::Text(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedRequest {
    pub public_key: SelectedFile,
    pub cover_file: SelectedFile,
    pub message: String,
    /// Output carrier, resolved from the cover file when the request was built.
    pub container: ContainerFormat,
}

impl EmbedRequest {
    pub fn parts(&self) -> Vec<RequestPart<'_>> {
        vec![
            RequestPart::file("public_key", &self.public_key),
            RequestPart::file("cover_file", &self.cover_file),
            RequestPart::text("message", &self.message),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub private_key: SelectedFile,
    pub stego_file: SelectedFile,
}

impl ExtractRequest {
    pub fn parts(&self) -> Vec<RequestPart<'_>> {
        vec![
            RequestPart::file("private_key", &self.private_key),
            RequestPart::file("stego_file", &self.stego_file),
        ]
    }
}

/// A request ready to send: which endpoint, and a view of what goes in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRequest<'a> {
    KeyGen,
    Embed(&'a EmbedRequest),
    Extract(&'a ExtractRequest),
}

impl<'a> TransferRequest<'a> {
    pub fn path(&self) -> &'static str {
        match self {
            Self::KeyGen => KEYGEN_PATH,
            Self::Embed(_) => HIDE_PATH,
            Self::Extract(_) => EXTRACT_PATH,
        }
    }

    pub fn parts(&self) -> Vec<RequestPart<'a>> {
        match *self {
            Self::KeyGen => Vec::new(),
            Self::Embed(req) => req.parts(),
            Self::Extract(req) => req.parts(),
        }
    }
}

pub fn build_key_gen_request() -> TransferRequest<'static> {
    TransferRequest::KeyGen
}

/// The message is sent exactly as typed; only an empty string counts as missing.
pub fn build_embed_request(
    public_key: Option<&SelectedFile>,
    cover_file: Option<&SelectedFile>,
    message: &str,
) -> Result<EmbedRequest> {
    let mut missing = Vec::new();
    if public_key.is_none() {
        missing.push("public_key");
    }
    if cover_file.is_none() {
        missing.push("cover_file");
    }
    if message.is_empty() {
        missing.push("message");
    }

    match (public_key, cover_file) {
        (Some(public_key), Some(cover_file)) if missing.is_empty() => {
            let container = ContainerFormat::resolve(&cover_file.declared_extension());
            tracing::debug!(
                "Built embed request: cover {} ({} bytes) -> {} container",
                cover_file.name(),
                cover_file.len(),
                container
            );
            Ok(EmbedRequest {
                public_key: public_key.clone(),
                cover_file: cover_file.clone(),
                message: message.to_string(),
                container,
            })
        }
        _ => Err(TransferError::Validation { missing }),
    }
}

pub fn build_extract_request(
    private_key: Option<&SelectedFile>,
    stego_file: Option<&SelectedFile>,
) -> Result<ExtractRequest> {
    match (private_key, stego_file) {
        (Some(private_key), Some(stego_file)) => {
            tracing::debug!(
                "Built extract request: stego {} ({} bytes)",
                stego_file.name(),
                stego_file.len()
            );
            Ok(ExtractRequest {
                private_key: private_key.clone(),
                stego_file: stego_file.clone(),
            })
        }
        (private_key, stego_file) => {
            let mut missing = Vec::new();
            if private_key.is_none() {
                missing.push("private_key");
            }
            if stego_file.is_none() {
                missing.push("stego_file");
            }
            Err(TransferError::Validation { missing })
        }
    }
}
