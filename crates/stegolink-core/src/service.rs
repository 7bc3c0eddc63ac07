//! Boundary to the external steganography service.
//!
//! Key generation, encryption and embedding all happen remotely. This module
//! only moves assembled requests over HTTP and sorts responses into payloads
//! or [`TransferError`]s.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{Result, TransferError};
use crate::request::{
    EmbedRequest, ExtractRequest, PartBody, RequestPart, TransferRequest, KEYGEN_PATH,
};

/// Key pair as transmitted: both halves base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EncodedKeyPair {
    pub public_key: String,
    pub private_key: String,
}

#[async_trait]
pub trait StegoService: Send + Sync {
    async fn generate_keys(&self) -> Result<EncodedKeyPair>;

    /// Returns the raw stego file.
    async fn hide(&self, request: &EmbedRequest) -> Result<Vec<u8>>;

    /// Returns the decrypted message.
    async fn extract(&self, request: &ExtractRequest) -> Result<String>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    max_bytes: Option<u64>,
    ciphertext_bytes: Option<u64>,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

/// Turn a non-2xx response into an error. Only a JSON body with a string
/// `error` field counts as a service message.
pub(crate) fn classify_failure(code: u16, body: &[u8]) -> TransferError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            max_bytes: Some(max),
            ciphertext_bytes: Some(needed),
        }) => TransferError::Service(format!(
            "{} (capacity {} bytes, payload {} bytes)",
            error, max, needed
        )),
        Ok(body) => TransferError::Service(body.error),
        Err(_) => TransferError::Transport(format!("HTTP {}", code)),
    }
}

/// Copies part content into an owned multipart body.
fn multipart_form(parts: &[RequestPart<'_>]) -> Form {
    parts.iter().fold(Form::new(), |form, part| match part.body {
        PartBody::File { filename, bytes } => form.part(
            part.name,
            Part::bytes(bytes.to_vec()).file_name(filename.to_string()),
        ),
        PartBody::Text(text) => form.text(part.name, text.to_string()),
    })
}

#[derive(Clone)]
pub struct HttpStegoService {
    client: Client,
    base_url: String,
}

impl HttpStegoService {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().connect_timeout(cfg.connect_timeout());
        if let Some(timeout) = cfg.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransferError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: cfg.server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, request: TransferRequest<'_>) -> Result<Response> {
        let path = request.path();
        let parts = request.parts();
        tracing::debug!("POST {} ({} parts)", path, parts.len());

        let builder = self.client.post(self.url(path));
        let builder = if parts.is_empty() {
            builder
        } else {
            builder.multipart(multipart_form(&parts))
        };

        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!("POST {} -> {}", path, status);

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.bytes().await.unwrap_or_default();
            Err(classify_failure(status.as_u16(), &body))
        }
    }
}

#[async_trait]
impl StegoService for HttpStegoService {
    async fn generate_keys(&self) -> Result<EncodedKeyPair> {
        let response = self.post(TransferRequest::KeyGen).await?;
        response
            .json::<EncodedKeyPair>()
            .await
            .map_err(|e| TransferError::Transport(format!("malformed response from {}: {}", KEYGEN_PATH, e)))
    }

    async fn hide(&self, request: &EmbedRequest) -> Result<Vec<u8>> {
        let response = self.post(TransferRequest::Embed(request)).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<String> {
        let response = self.post(TransferRequest::Extract(request)).await?;
        let body = response
            .json::<MessageBody>()
            .await
            .map_err(|e| TransferError::Transport(format!("malformed extract response: {}", e)))?;
        Ok(body.message)
    }
}
