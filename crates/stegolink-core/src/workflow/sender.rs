use std::sync::Arc;

use storage::{DownloadSink, SavedFile};
use tokio::sync::watch;

use super::{Flight, Phase, PhaseTracker};
use crate::codec;
use crate::container::ContainerFormat;
use crate::error::{Result, TransferError};
use crate::request::{build_embed_request, EmbedRequest, SelectedFile};
use crate::service::StegoService;
use crate::status::{Status, StatusReporter};

pub const EMBED_IN_PROGRESS: &str = "Encrypting message and embedding payload...";
pub const EMBED_SUCCEEDED: &str = "Stego file generated successfully!";
pub const EMBED_FAILED: &str = "Encryption failed!";

/// Inputs the Sender has selected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderForm {
    pub public_key: Option<SelectedFile>,
    pub cover_file: Option<SelectedFile>,
    pub message: String,
}

impl SenderForm {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.public_key.is_none() && self.cover_file.is_none() && self.message.is_empty()
    }
}

/// `stego_<millis>.<ext>`
pub fn stego_filename(timestamp_millis: i64, container: &ContainerFormat) -> String {
    format!("stego_{}.{}", timestamp_millis, container.extension())
}

/// Encrypt-and-hide flow.
pub struct SenderWorkflow<S: ?Sized, D: ?Sized> {
    service: Arc<S>,
    sink: Arc<D>,
    form: SenderForm,
    phase: PhaseTracker,
    status: StatusReporter,
}

impl<S, D> SenderWorkflow<S, D>
where
    S: StegoService + ?Sized,
    D: DownloadSink + ?Sized,
{
    pub fn new(service: Arc<S>, sink: Arc<D>) -> Self {
        Self {
            service,
            sink,
            form: SenderForm::default(),
            phase: PhaseTracker::new("sender"),
            status: StatusReporter::new(),
        }
    }

    pub fn form(&self) -> &SenderForm {
        &self.form
    }

    pub fn select_public_key(&mut self, file: SelectedFile) {
        self.form.public_key = Some(file);
    }

    pub fn select_cover_file(&mut self, file: SelectedFile) {
        self.form.cover_file = Some(file);
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.form.message = message.into();
    }

    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    /// Phases visited by the most recent operation.
    pub fn last_transitions(&self) -> &[Phase] {
        self.phase.trace()
    }

    /// True while a request is outstanding; the embed action should be disabled.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase.current(), Phase::Validating | Phase::InFlight)
    }

    pub fn status(&self) -> Status {
        self.status.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Validate the form, send it, and save the returned stego file. Inputs are
    /// cleared on success and left untouched on failure.
    pub async fn embed(&mut self) -> Status {
        self.phase.begin();

        let request = match build_embed_request(
            self.form.public_key.as_ref(),
            self.form.cover_file.as_ref(),
            &self.form.message,
        ) {
            Ok(request) => request,
            Err(err) => return self.fail(&err),
        };

        if !request.container.is_known() {
            tracing::warn!(
                "Cover {} has no known carrier mapping; output keeps extension {:?}",
                request.cover_file.name(),
                request.container.extension()
            );
        }

        let flight = Flight::take_off(
            &mut self.phase,
            &self.status,
            EMBED_IN_PROGRESS,
            EMBED_FAILED,
        );
        let outcome = hide_and_save(self.service.as_ref(), self.sink.as_ref(), &request).await;
        flight.land();

        match outcome {
            Ok(saved) => {
                self.phase.enter(Phase::Succeeded);
                let status = Status::success(format!(
                    "{} Saved as {}",
                    EMBED_SUCCEEDED,
                    saved.location.display()
                ));
                self.status.report(status.clone());
                self.form.clear();
                self.phase.enter(Phase::Idle);
                status
            }
            Err(err) => self.fail(&err),
        }
    }

    fn fail(&mut self, err: &TransferError) -> Status {
        tracing::debug!("sender: embed failed: {}", err);
        self.phase.enter(Phase::Failed);
        let status = Status::from_error(err, EMBED_FAILED);
        self.status.report(status.clone());
        self.phase.enter(Phase::Idle);
        status
    }
}

async fn hide_and_save<S, D>(service: &S, sink: &D, request: &EmbedRequest) -> Result<SavedFile>
where
    S: StegoService + ?Sized,
    D: DownloadSink + ?Sized,
{
    let bytes = service.hide(request).await?;
    let filename = stego_filename(chrono::Utc::now().timestamp_millis(), &request.container);
    codec::trigger_download(sink, &filename, bytes, request.container.mime_type()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusKind;
    use crate::workflow::fakes::{FakeService, FlakySink, StalledService};
    use std::time::Duration;
    use storage::MemoryDownloads;

    type Sender = SenderWorkflow<FakeService, MemoryDownloads>;

    fn sender(service: FakeService) -> (Sender, Arc<FakeService>, Arc<MemoryDownloads>) {
        let service = Arc::new(service);
        let sink = Arc::new(MemoryDownloads::new());
        (
            SenderWorkflow::new(service.clone(), sink.clone()),
            service,
            sink,
        )
    }

    fn fill<S, D>(workflow: &mut SenderWorkflow<S, D>, cover: &str)
    where
        S: StegoService + ?Sized,
        D: DownloadSink + ?Sized,
    {
        workflow.select_public_key(SelectedFile::new("public_key.bin", vec![1; 8]));
        workflow.select_cover_file(SelectedFile::new(cover, vec![2; 32]));
        workflow.set_message("rendezvous at the old mill");
    }

    fn assert_stego_name(name: &str, ext: &str) {
        let rest = name.strip_prefix("stego_").expect("stego_ prefix");
        let (stamp, got_ext) = rest.split_once('.').expect("extension");
        assert!(!stamp.is_empty() && stamp.chars().all(|c| c.is_ascii_digit()), "{}", name);
        assert_eq!(got_ext, ext);
    }

    #[tokio::test]
    async fn test_embed_success_downloads_and_resets() {
        let (mut workflow, service, sink) = sender(FakeService::ok());
        fill(&mut workflow, "clip.mp4");

        let status = workflow.embed().await;

        assert_eq!(status.kind, StatusKind::Success);
        assert!(status.message.starts_with(EMBED_SUCCEEDED));
        assert_eq!(workflow.status(), status);
        assert_eq!(service.calls(), 1);

        let downloads = sink.downloads().await;
        assert_eq!(downloads.len(), 1);
        assert_stego_name(&downloads[0].filename, "avi");
        assert_eq!(downloads[0].mime_type, "video/x-msvideo");
        assert_eq!(downloads[0].bytes, b"stego-bytes".to_vec());

        assert!(workflow.form().is_empty());
        assert_eq!(workflow.phase(), Phase::Idle);
        assert_eq!(
            workflow.last_transitions(),
            &[Phase::Idle, Phase::Validating, Phase::InFlight, Phase::Succeeded, Phase::Idle]
        );
    }

    #[tokio::test]
    async fn test_embed_filename_follows_container() {
        let cases = [
            ("note.txt", "txt"),
            ("song.MP3", "wav"),
            ("photo.jpeg", "png"),
            ("archive.zip", "zip"),
        ];
        for (cover, ext) in cases {
            let (mut workflow, _, sink) = sender(FakeService::ok());
            fill(&mut workflow, cover);
            assert!(workflow.embed().await.is_success());
            assert_stego_name(&sink.filenames().await[0], ext);
        }
    }

    #[tokio::test]
    async fn test_embed_sends_form_contents() {
        let (mut workflow, service, _) = sender(FakeService::ok());
        fill(&mut workflow, "cover.png");
        workflow.set_message("  keep my spaces  ");

        workflow.embed().await;

        let sent = service.last_embed.lock().unwrap().clone().unwrap();
        assert_eq!(sent.message, "  keep my spaces  ");
        assert_eq!(sent.cover_file.name(), "cover.png");
        assert_eq!(sent.public_key.bytes(), &[1; 8]);
    }

    #[tokio::test]
    async fn test_embed_validation_never_reaches_service() {
        let (mut workflow, service, sink) = sender(FakeService::ok());
        workflow.select_cover_file(SelectedFile::new("cover.png", vec![0]));
        workflow.set_message("hello");
        let before = workflow.form().clone();

        let status = workflow.embed().await;

        assert!(status.is_failure());
        assert_eq!(status.message, "missing required input: public_key");
        assert_eq!(service.calls(), 0);
        assert!(sink.downloads().await.is_empty());
        assert_eq!(workflow.form(), &before);
        assert!(!workflow.last_transitions().contains(&Phase::InFlight));
        assert_eq!(workflow.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_embed_empty_message_is_missing() {
        let (mut workflow, service, _) = sender(FakeService::ok());
        fill(&mut workflow, "cover.png");
        workflow.set_message("");

        let status = workflow.embed().await;
        assert_eq!(status.message, "missing required input: message");
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_embed_service_error_preserves_inputs() {
        let (mut workflow, _, sink) = sender(FakeService::failing(TransferError::Service(
            "Message too large for this audio".into(),
        )));
        fill(&mut workflow, "song.wav");
        let before = workflow.form().clone();

        let status = workflow.embed().await;

        assert_eq!(status, Status::failure("Message too large for this audio"));
        assert_eq!(workflow.form(), &before);
        assert!(sink.downloads().await.is_empty());
        assert_eq!(
            workflow.last_transitions(),
            &[Phase::Idle, Phase::Validating, Phase::InFlight, Phase::Failed, Phase::Idle]
        );
    }

    #[tokio::test]
    async fn test_embed_transport_error_is_generic() {
        let (mut workflow, _, _) = sender(FakeService::failing(TransferError::Transport(
            "service unreachable".into(),
        )));
        fill(&mut workflow, "song.wav");
        let before = workflow.form().clone();

        let status = workflow.embed().await;
        assert_eq!(status, Status::failure(EMBED_FAILED));
        assert_eq!(workflow.form(), &before);
    }

    #[tokio::test]
    async fn test_embed_save_failure_keeps_inputs() {
        let service = Arc::new(FakeService::ok());
        let sink = Arc::new(FlakySink::failing_on(0));
        let mut workflow = SenderWorkflow::new(service, sink.clone());
        fill(&mut workflow, "cover.png");

        let status = workflow.embed().await;
        assert_eq!(status, Status::failure(EMBED_FAILED));
        assert!(workflow.form().cover_file.is_some());
        assert!(sink.inner.downloads().await.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_embed_is_not_busy() {
        let sink = Arc::new(MemoryDownloads::new());
        let mut workflow = SenderWorkflow::new(Arc::new(StalledService), sink.clone());
        fill(&mut workflow, "cover.png");
        let before = workflow.form().clone();

        let outcome = tokio::time::timeout(Duration::from_millis(50), workflow.embed()).await;

        assert!(outcome.is_err());
        assert!(!workflow.is_busy());
        assert_eq!(workflow.phase(), Phase::Idle);
        assert_eq!(workflow.status(), Status::failure(EMBED_FAILED));
        assert_eq!(workflow.form(), &before);
        assert_eq!(
            workflow.last_transitions(),
            &[Phase::Idle, Phase::Validating, Phase::InFlight, Phase::Failed, Phase::Idle]
        );
        assert!(sink.downloads().await.is_empty());

        // The trigger works again once the service answers.
        let mut workflow = SenderWorkflow::new(Arc::new(FakeService::ok()), sink);
        fill(&mut workflow, "cover.png");
        assert!(workflow.embed().await.is_success());
    }

    #[tokio::test]
    async fn test_status_overwritten_between_runs() {
        let (mut workflow, _, _) = sender(FakeService::ok());
        workflow.embed().await;
        assert!(workflow.status().is_failure());

        fill(&mut workflow, "cover.png");
        workflow.embed().await;
        assert!(workflow.status().is_success());
    }

    #[tokio::test]
    async fn test_works_behind_trait_objects() {
        let service: Arc<dyn StegoService> = Arc::new(FakeService::ok());
        let sink: Arc<dyn DownloadSink> = Arc::new(MemoryDownloads::new());
        let mut workflow = SenderWorkflow::new(service, sink);
        fill(&mut workflow, "cover.png");

        assert!(!workflow.is_busy());
        assert!(workflow.embed().await.is_success());
    }

    #[test]
    fn test_stego_filename() {
        assert_eq!(
            stego_filename(1700000000123, &ContainerFormat::Audio),
            "stego_1700000000123.wav"
        );
        assert_eq!(
            stego_filename(5, &ContainerFormat::PassThrough("zip".into())),
            "stego_5.zip"
        );
    }
}
