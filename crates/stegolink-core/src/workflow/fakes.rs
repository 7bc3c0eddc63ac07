use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use storage::{Download, DownloadSink, MemoryDownloads, SavedFile};

use crate::error::{Result, TransferError};
use crate::request::{EmbedRequest, ExtractRequest};
use crate::service::{EncodedKeyPair, StegoService};

/// Scripted service that counts calls and remembers the last requests.
pub(crate) struct FakeService {
    pub keys: Result<EncodedKeyPair>,
    pub hidden: Result<Vec<u8>>,
    pub extracted: Result<String>,
    calls: AtomicUsize,
    pub last_embed: Mutex<Option<EmbedRequest>>,
    pub last_extract: Mutex<Option<ExtractRequest>>,
}

impl FakeService {
    pub fn ok() -> Self {
        Self {
            keys: Ok(EncodedKeyPair {
                public_key: "cHVibGlj".into(),
                private_key: "cHJpdmF0ZQ==".into(),
            }),
            hidden: Ok(b"stego-bytes".to_vec()),
            extracted: Ok("attack at dawn".into()),
            calls: AtomicUsize::new(0),
            last_embed: Mutex::new(None),
            last_extract: Mutex::new(None),
        }
    }

    pub fn failing(err: TransferError) -> Self {
        Self {
            keys: Err(err.clone()),
            hidden: Err(err.clone()),
            extracted: Err(err),
            ..Self::ok()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StegoService for FakeService {
    async fn generate_keys(&self) -> Result<EncodedKeyPair> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.clone()
    }

    async fn hide(&self, request: &EmbedRequest) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_embed.lock().unwrap() = Some(request.clone());
        self.hidden.clone()
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_extract.lock().unwrap() = Some(request.clone());
        self.extracted.clone()
    }
}

/// Service whose requests never resolve.
pub(crate) struct StalledService;

#[async_trait]
impl StegoService for StalledService {
    async fn generate_keys(&self) -> Result<EncodedKeyPair> {
        std::future::pending().await
    }

    async fn hide(&self, _request: &EmbedRequest) -> Result<Vec<u8>> {
        std::future::pending().await
    }

    async fn extract(&self, _request: &ExtractRequest) -> Result<String> {
        std::future::pending().await
    }
}

/// Sink that fails on the n-th save (0-based) and stores the rest in memory.
pub(crate) struct FlakySink {
    fail_on: usize,
    count: AtomicUsize,
    pub inner: MemoryDownloads,
}

impl FlakySink {
    pub fn failing_on(fail_on: usize) -> Self {
        Self {
            fail_on,
            count: AtomicUsize::new(0),
            inner: MemoryDownloads::new(),
        }
    }
}

#[async_trait]
impl DownloadSink for FlakySink {
    async fn save(&self, download: Download) -> anyhow::Result<SavedFile> {
        if self.count.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            anyhow::bail!("disk full");
        }
        self.inner.save(download).await
    }

    async fn discard(&self, saved: &SavedFile) -> anyhow::Result<()> {
        self.inner.discard(saved).await
    }
}
