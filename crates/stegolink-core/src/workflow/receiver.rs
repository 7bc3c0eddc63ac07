use std::sync::Arc;

use storage::{DownloadSink, SavedFile};
use tokio::sync::watch;

use super::{Flight, Phase, PhaseTracker};
use crate::codec;
use crate::container::is_extractable;
use crate::error::{Result, TransferError};
use crate::keys::KeyMaterial;
use crate::request::{build_extract_request, build_key_gen_request, SelectedFile};
use crate::service::StegoService;
use crate::status::{Status, StatusReporter};

pub const KEYGEN_IN_PROGRESS: &str = "Generating key pair...";
pub const KEYGEN_SUCCEEDED: &str = "Key pair generated successfully!";
pub const KEYGEN_FAILED: &str = "Key generation failed!";
pub const EXTRACT_IN_PROGRESS: &str = "Extracting and decrypting payload...";
pub const EXTRACT_SUCCEEDED: &str = "Decryption successful!";
pub const EXTRACT_FAILED: &str = "Extraction failed!";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverForm {
    pub private_key: Option<SelectedFile>,
    pub stego_file: Option<SelectedFile>,
}

impl ReceiverForm {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.private_key.is_none() && self.stego_file.is_none()
    }
}

/// Key generation and extract-and-decrypt flow.
pub struct ReceiverWorkflow<S: ?Sized, D: ?Sized> {
    service: Arc<S>,
    sink: Arc<D>,
    form: ReceiverForm,
    decoded: Option<String>,
    phase: PhaseTracker,
    status: StatusReporter,
}

impl<S, D> ReceiverWorkflow<S, D>
where
    S: StegoService + ?Sized,
    D: DownloadSink + ?Sized,
{
    pub fn new(service: Arc<S>, sink: Arc<D>) -> Self {
        Self {
            service,
            sink,
            form: ReceiverForm::default(),
            decoded: None,
            phase: PhaseTracker::new("receiver"),
            status: StatusReporter::new(),
        }
    }

    pub fn form(&self) -> &ReceiverForm {
        &self.form
    }

    pub fn select_private_key(&mut self, file: SelectedFile) {
        self.form.private_key = Some(file);
    }

    pub fn select_stego_file(&mut self, file: SelectedFile) {
        self.form.stego_file = Some(file);
    }

    /// Plaintext from the last successful extraction, if it is still current.
    pub fn decoded_payload(&self) -> Option<&str> {
        self.decoded.as_deref()
    }

    /// Drop everything the role holds: selections, plaintext and status.
    pub fn reset(&mut self) {
        self.form.clear();
        self.decoded = None;
        self.status.report(Status::idle());
    }

    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    pub fn last_transitions(&self) -> &[Phase] {
        self.phase.trace()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase.current(), Phase::Validating | Phase::InFlight)
    }

    pub fn status(&self) -> Status {
        self.status.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Ask the service for a fresh key pair and save it as `public_key.bin`
    /// and `private_key.bin`. Leaves the extraction form alone. The success
    /// status names where both halves were saved.
    pub async fn generate_keys(&mut self) -> Status {
        self.phase.begin();
        let request = build_key_gen_request();
        tracing::debug!("receiver: requesting {}", request.path());

        let flight = Flight::take_off(
            &mut self.phase,
            &self.status,
            KEYGEN_IN_PROGRESS,
            KEYGEN_FAILED,
        );
        let outcome = fetch_and_save_keys(self.service.as_ref(), self.sink.as_ref()).await;
        flight.land();

        match outcome {
            Ok(saved) => self.succeed(Status::success(format!(
                "{} Fingerprint {}. Public key saved as {}, private key saved as {}",
                KEYGEN_SUCCEEDED,
                saved.fingerprint,
                saved.public.location.display(),
                saved.private.location.display()
            ))),
            Err(err) => self.fail(&err, KEYGEN_FAILED),
        }
    }

    /// Validate the form and ask the service to recover the hidden message.
    /// Any previously decoded plaintext is dropped first, whatever the outcome.
    pub async fn extract(&mut self) -> Status {
        self.phase.begin();
        self.decoded = None;

        let request = match build_extract_request(
            self.form.private_key.as_ref(),
            self.form.stego_file.as_ref(),
        ) {
            Ok(request) => request,
            Err(err) => return self.fail(&err, EXTRACT_FAILED),
        };

        if !is_extractable(request.stego_file.name()) {
            tracing::warn!(
                "Stego file {} is not a carrier the service extracts from",
                request.stego_file.name()
            );
        }

        let flight = Flight::take_off(
            &mut self.phase,
            &self.status,
            EXTRACT_IN_PROGRESS,
            EXTRACT_FAILED,
        );
        let outcome = self.service.extract(&request).await;
        flight.land();

        match outcome {
            Ok(message) => {
                tracing::info!("Recovered {} bytes of plaintext", message.len());
                self.decoded = Some(message);
                self.form.clear();
                self.succeed(Status::success(EXTRACT_SUCCEEDED))
            }
            Err(err) => self.fail(&err, EXTRACT_FAILED),
        }
    }

    fn succeed(&mut self, status: Status) -> Status {
        self.phase.enter(Phase::Succeeded);
        self.status.report(status.clone());
        self.phase.enter(Phase::Idle);
        status
    }

    fn fail(&mut self, err: &TransferError, generic: &str) -> Status {
        tracing::debug!("receiver: operation failed: {}", err);
        self.phase.enter(Phase::Failed);
        let status = Status::from_error(err, generic);
        self.status.report(status.clone());
        self.phase.enter(Phase::Idle);
        status
    }
}

struct SavedKeys {
    fingerprint: String,
    public: SavedFile,
    private: SavedFile,
}

/// Both halves are decoded before either is saved. If the private half cannot
/// be saved, the public half is taken back.
async fn fetch_and_save_keys<S, D>(service: &S, sink: &D) -> Result<SavedKeys>
where
    S: StegoService + ?Sized,
    D: DownloadSink + ?Sized,
{
    let encoded = service.generate_keys().await?;
    let keys = KeyMaterial::from_encoded(&encoded.public_key, &encoded.private_key)?;
    let fingerprint = keys.fingerprint();

    let [public, private] = keys.into_downloads();
    let public = codec::save(sink, public).await?;
    let private = match codec::save(sink, private).await {
        Ok(saved) => saved,
        Err(err) => {
            if let Err(e) = sink.discard(&public).await {
                tracing::warn!(
                    "Could not remove orphaned {}: {:#}",
                    public.location.display(),
                    e
                );
            }
            return Err(err);
        }
    };

    Ok(SavedKeys {
        fingerprint,
        public,
        private,
    })
}
