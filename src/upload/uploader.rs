use crate::features::file_acceptance::{CandidateFile, FileAcceptance};
use crate::location::LocationResult;
use crate::upload::credentials::CredentialStore;
use crate::upload::error::{FailureKind, SessionFailure, StartError};
use crate::upload::session::{SessionCore, SessionHandle, SlotGuard};
use crate::upload::structs::SessionOutcome;
use crate::upload::transport::{ProgressReporter, Transport, TransportResponse, UploadRequest};
use bon::bon;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Structured error body of the upload endpoint: `{error, details?}`.
#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    error: String,
    #[serde(default)]
    details: Option<Value>,
}

fn remote_message(response: &TransportResponse) -> String {
    match serde_json::from_slice::<ApiErrorPayload>(&response.body) {
        Ok(ApiErrorPayload {
            error,
            details: Some(details),
        }) => format!("{error} ({details})"),
        Ok(ApiErrorPayload { error, .. }) => error,
        Err(_) => format!("Upload failed with status {}", response.status),
    }
}

/// Maps the endpoint's answer onto a session outcome.
fn interpret_response(response: &TransportResponse) -> SessionOutcome {
    match response.status {
        200..=299 => serde_json::from_slice::<LocationResult>(&response.body).map_err(|e| {
            SessionFailure::new(
                FailureKind::MalformedResponse,
                format!("Invalid result payload: {e}"),
            )
        }),
        401 | 403 => Err(SessionFailure::new(
            FailureKind::Unauthenticated,
            remote_message(response),
        )),
        _ => Err(SessionFailure::new(
            FailureKind::RemoteRejected,
            remote_message(response),
        )),
    }
}

/// A client context that submits photos one at a time.
///
/// Holds the transport, the credential store and the file acceptance policy, and
/// enforces that at most one upload session is active at any moment.
pub struct Uploader<T: Transport, C: CredentialStore> {
    transport: Arc<T>,
    credentials: Arc<C>,
    acceptance: FileAcceptance,
    active: Arc<AtomicBool>,
}

#[bon]
impl<T: Transport, C: CredentialStore> Uploader<T, C> {
    /// # Builder Arguments
    ///
    /// * `transport: Arc<T>` - Moves the file to the upload endpoint.
    /// * `credentials: Arc<C>` - Supplies the bearer token; shared with whatever lets the user set it.
    /// * `acceptance: FileAcceptance` - (Default: JPEG/PNG/WebP up to 10 MiB) Pre-flight file checks.
    #[builder]
    pub fn new(
        transport: Arc<T>,
        credentials: Arc<C>,
        #[builder(default)] acceptance: FileAcceptance,
    ) -> Self {
        Self {
            transport,
            credentials,
            acceptance,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    pub const fn acceptance(&self) -> &FileAcceptance {
        &self.acceptance
    }

    /// `true` when no session is validating or transferring.
    pub fn is_idle(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }

    /// Starts uploading `file` and returns a handle to the new session.
    ///
    /// The file is validated first; a rejected file yields a handle whose session has
    /// already ended in `Failed(InvalidFile)`. An accepted file moves the session to
    /// `Transferring` and the transfer runs on the current Tokio runtime. A transport
    /// that panics ends the session in `Failed(NetworkFailure)`.
    ///
    /// # Errors
    ///
    /// * [`StartError::Unauthenticated`] if the credential store has no token.
    /// * [`StartError::NoRuntime`] if called outside a Tokio runtime.
    /// * [`StartError::AlreadyActive`] if another session of this uploader has not
    ///   ended yet. That session is left untouched.
    pub fn start(&self, file: CandidateFile) -> Result<SessionHandle, StartError> {
        let token = self
            .credentials
            .token()
            .filter(|t| !t.trim().is_empty())
            .ok_or(StartError::Unauthenticated)?;
        let runtime = Handle::try_current().map_err(|_| StartError::NoRuntime)?;
        let slot = SlotGuard::acquire(&self.active).ok_or_else(|| {
            debug!(file = %file.metadata().name, "Rejecting upload, another one is active");
            StartError::AlreadyActive
        })?;

        let metadata = file.metadata().clone();
        let (core, handle) = SessionCore::start(metadata, slot);

        if let Err(rejection) = self.acceptance.validate(file.metadata()) {
            warn!(file = %file.metadata().name, "File rejected: {rejection}");
            core.finish(Err(rejection.into()));
            return Ok(handle);
        }

        core.begin_transfer();

        let request = UploadRequest {
            file_name: file.metadata().name.clone(),
            mime_type: file.metadata().mime_type.clone(),
            contents: file.contents(),
            token,
        };
        let transport = Arc::clone(&self.transport);
        let progress = ProgressReporter::new(Arc::clone(&core));
        let cancel = core.cancel_signal();

        let transfer = runtime.spawn(async move {
            match transport.send(request, progress, cancel).await {
                Ok(response) => interpret_response(&response),
                Err(e) => Err(SessionFailure::new(FailureKind::NetworkFailure, e.to_string())),
            }
        });
        // The session must end even if the transfer task panics or is aborted.
        runtime.spawn(async move {
            let outcome = transfer.await.unwrap_or_else(|e| {
                Err(SessionFailure::new(
                    FailureKind::NetworkFailure,
                    format!("Transfer task aborted: {e}"),
                ))
            });
            core.finish(outcome);
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::geo_metrics::estimate_radius;
    use crate::features::result_codec::{decode, encode};
    use crate::location::LocationKind;
    use crate::upload::credentials::MemoryCredentialStore;
    use crate::upload::error::TransportError;
    use crate::upload::structs::{SessionEvent, SessionState};
    use crate::upload::transport::CancelSignal;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    const EIFFEL_PAYLOAD: &str = r#"{"type":"EXIF","lat":48.8584,"lng":2.2945,"accuracy":5,"source":"EXIF"}"#;

    /// Sends the file in fixed-size chunks, then answers with a canned response.
    struct ChunkedTransport {
        chunk_size: usize,
        response: Result<TransportResponse, TransportError>,
        calls: AtomicUsize,
    }

    impl ChunkedTransport {
        fn new(chunk_size: usize, response: Result<TransportResponse, TransportError>) -> Self {
            Self {
                chunk_size,
                response,
                calls: AtomicUsize::new(0),
            }
        }

        fn answering(status: u16, body: &str) -> Self {
            Self::new(64 * 1024, Ok(TransportResponse::new(status, body)))
        }
    }

    impl Transport for ChunkedTransport {
        async fn send(
            &self,
            request: UploadRequest,
            progress: ProgressReporter,
            cancel: CancelSignal,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.token, "secret-token");
            let mut sent = 0;
            for chunk in request.contents.chunks(self.chunk_size) {
                if cancel.is_cancelled() {
                    return Err(TransportError::Interrupted("cancelled".to_string()));
                }
                sent += chunk.len() as u64;
                progress.report(sent);
                tokio::task::yield_now().await;
            }
            self.response.clone()
        }
    }

    /// Holds the transfer open until released, then reports everything and succeeds,
    /// whether or not it was cancelled in the meantime.
    struct GatedTransport {
        release: Notify,
        finished: Notify,
    }

    impl GatedTransport {
        fn new() -> Self {
            Self {
                release: Notify::new(),
                finished: Notify::new(),
            }
        }
    }

    impl Transport for GatedTransport {
        async fn send(
            &self,
            request: UploadRequest,
            progress: ProgressReporter,
            _cancel: CancelSignal,
        ) -> Result<TransportResponse, TransportError> {
            progress.report(1);
            self.release.notified().await;
            progress.report(request.contents.len() as u64);
            self.finished.notify_one();
            Ok(TransportResponse::new(200, EIFFEL_PAYLOAD))
        }
    }

    /// Stops as soon as the session asks it to.
    struct CancellableTransport {
        stopped: Notify,
    }

    impl Transport for CancellableTransport {
        async fn send(
            &self,
            _request: UploadRequest,
            _progress: ProgressReporter,
            mut cancel: CancelSignal,
        ) -> Result<TransportResponse, TransportError> {
            cancel.cancelled().await;
            self.stopped.notify_one();
            Err(TransportError::Interrupted("stopped by caller".to_string()))
        }
    }

    /// Reports every single byte, then succeeds.
    struct BytewiseTransport;

    impl Transport for BytewiseTransport {
        async fn send(
            &self,
            request: UploadRequest,
            progress: ProgressReporter,
            _cancel: CancelSignal,
        ) -> Result<TransportResponse, TransportError> {
            for sent in 1..=request.contents.len() as u64 {
                progress.report(sent);
            }
            Ok(TransportResponse::new(200, EIFFEL_PAYLOAD))
        }
    }

    /// Dies halfway through the transfer.
    struct PanickingTransport;

    impl Transport for PanickingTransport {
        async fn send(
            &self,
            _request: UploadRequest,
            progress: ProgressReporter,
            _cancel: CancelSignal,
        ) -> Result<TransportResponse, TransportError> {
            progress.report(1);
            panic!("connection pool exploded");
        }
    }

    fn uploader<T: Transport>(transport: Arc<T>) -> Uploader<T, MemoryCredentialStore> {
        Uploader::builder()
            .transport(transport)
            .credentials(Arc::new(MemoryCredentialStore::with_token("secret-token")))
            .build()
    }

    fn jpeg(size: usize) -> CandidateFile {
        CandidateFile::new("tower.jpg", "image/jpeg", vec![0xAB; size])
    }

    async fn collect_events(handle: &mut SessionHandle) -> Vec<SessionEvent> {
        let mut events = handle.events().expect("events are taken once");
        let mut collected = Vec::new();
        while let Some(event) = events.next().await {
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn test_end_to_end_exif_upload() {
        let transport = Arc::new(ChunkedTransport::new(
            256 * 1024,
            Ok(TransportResponse::new(200, EIFFEL_PAYLOAD)),
        ));
        let uploader = uploader(Arc::clone(&transport));

        let mut handle = uploader.start(jpeg(2 * 1024 * 1024)).unwrap();
        assert!(matches!(handle.state(), SessionState::Transferring(_)));
        assert!(!uploader.is_idle());

        let events = collect_events(&mut handle).await;
        let (terminal, progress) = events.split_last().unwrap();

        // Progress climbs monotonically from 0 to 100
        let percentages: Vec<u8> = progress
            .iter()
            .map(|event| match event {
                SessionEvent::Progress(p) => p.percentage(),
                other => panic!("unexpected event before the end: {other:?}"),
            })
            .collect();
        assert_eq!(percentages.first(), Some(&0));
        assert_eq!(percentages.last(), Some(&100));
        assert!(percentages.windows(2).all(|w| w[0] < w[1]), "{percentages:?}");

        let SessionEvent::Completed(result) = terminal else {
            panic!("expected completion, got {terminal:?}");
        };
        assert_eq!(result.kind(), LocationKind::Exif);
        assert_eq!(result.latitude(), 48.8584);
        assert_eq!(result.longitude(), 2.2945);
        assert_eq!(estimate_radius(result), 5.0);
        assert_eq!(decode(&encode(result)).as_ref(), Ok(result));

        assert_eq!(handle.wait().await.as_ref(), Ok(result));
        assert_eq!(handle.result().as_ref(), Some(result));
        assert!(uploader.is_idle());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        let record = handle.record().expect("completed uploads have a record");
        assert_eq!(record.file_name, "tower.jpg");
        assert_eq!(record.file_size, 2 * 1024 * 1024);
        assert_eq!(record.result_type, LocationKind::Exif);
        assert_eq!(record.accuracy, Some(5.0));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_transferring() {
        let transport = Arc::new(GatedTransport::new());
        let uploader = uploader(Arc::clone(&transport));

        let mut first = uploader.start(jpeg(1000)).unwrap();
        assert!(matches!(
            uploader.start(jpeg(500)),
            Err(StartError::AlreadyActive)
        ));

        transport.release.notify_one();
        let events = collect_events(&mut first).await;

        // The first session carried on untouched
        assert_eq!(
            events.first(),
            Some(&SessionEvent::Progress(
                crate::upload::progress::UploadProgress::start(1000)
            ))
        );
        assert!(matches!(events.last(), Some(SessionEvent::Completed(_))));
        let bytes: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Progress(p) => Some(p.bytes_sent()),
                _ => None,
            })
            .collect();
        // Reporting 1 of 1000 bytes stays at 0% and queues nothing
        assert_eq!(bytes, vec![0, 1000]);
        assert_eq!(first.result().map(|r| r.kind()), Some(LocationKind::Exif));

        // And once it ended, a new session can start
        assert!(uploader.is_idle());
        transport.release.notify_one();
        let second = uploader.start(jpeg(500)).unwrap();
        assert!(second.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_suppresses_late_progress_and_completion() {
        let transport = Arc::new(GatedTransport::new());
        let uploader = uploader(Arc::clone(&transport));

        let mut handle = uploader.start(jpeg(1000)).unwrap();
        tokio::task::yield_now().await;

        assert!(handle.cancel());
        assert!(!handle.cancel(), "second cancel has nothing to do");
        assert!(uploader.is_idle());
        assert!(matches!(
            handle.state(),
            SessionState::Failed(SessionFailure {
                kind: FailureKind::Cancelled,
                ..
            })
        ));

        // Let the transport finish anyway
        transport.release.notify_one();
        transport.finished.notified().await;
        tokio::task::yield_now().await;

        let events = collect_events(&mut handle).await;
        let terminal: Vec<&SessionEvent> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Failed(SessionFailure {
                kind: FailureKind::Cancelled,
                ..
            }))
        ));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, SessionEvent::Progress(p) if p.bytes_sent() == 1000)),
            "no progress after cancellation: {events:?}"
        );
        assert!(handle.record().is_none());
    }

    #[tokio::test]
    async fn test_cancel_signal_reaches_transport() {
        let transport = Arc::new(CancellableTransport {
            stopped: Notify::new(),
        });
        let uploader = uploader(Arc::clone(&transport));

        let handle = uploader.start(jpeg(10)).unwrap();
        tokio::task::yield_now().await;
        assert!(handle.cancel());
        transport.stopped.notified().await;
        tokio::task::yield_now().await;

        // The transport's own error does not replace the cancellation
        let failure = handle.wait().await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Cancelled);
    }

    #[tokio::test]
    async fn test_invalid_file_fails_without_transfer() {
        let transport = Arc::new(ChunkedTransport::answering(200, EIFFEL_PAYLOAD));
        let uploader = uploader(Arc::clone(&transport));

        let mut handle = uploader
            .start(CandidateFile::new("notes.txt", "text/plain", b"hello".to_vec()))
            .unwrap();

        let events = collect_events(&mut handle).await;
        assert_eq!(events.len(), 1, "only the terminal event: {events:?}");
        assert!(matches!(
            &events[0],
            SessionEvent::Failed(SessionFailure {
                kind: FailureKind::InvalidFile,
                ..
            })
        ));
        assert!(uploader.is_idle());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected_before_validation() {
        let transport = Arc::new(ChunkedTransport::answering(200, EIFFEL_PAYLOAD));
        let uploader = Uploader::builder()
            .transport(transport)
            .credentials(Arc::new(MemoryCredentialStore::default()))
            .build();

        assert!(matches!(
            uploader.start(jpeg(10)),
            Err(StartError::Unauthenticated)
        ));
        assert!(uploader.is_idle());

        uploader.credentials().set_token("secret-token");
        assert!(uploader.start(jpeg(10)).is_ok());
    }

    #[tokio::test]
    async fn test_remote_failures_are_classified() {
        let cases = [
            (
                ChunkedTransport::answering(401, r#"{"error":"Invalid token."}"#),
                FailureKind::Unauthenticated,
            ),
            (
                ChunkedTransport::answering(400, r#"{"error":"No file provided"}"#),
                FailureKind::RemoteRejected,
            ),
            (
                ChunkedTransport::answering(500, "<html>oops</html>"),
                FailureKind::RemoteRejected,
            ),
            (
                ChunkedTransport::answering(200, "not json"),
                FailureKind::MalformedResponse,
            ),
            (
                ChunkedTransport::answering(200, r#"{"type":"EXIF","lat":123,"lng":0,"source":"EXIF"}"#),
                FailureKind::MalformedResponse,
            ),
            (
                ChunkedTransport::new(
                    64,
                    Err(TransportError::Connection("connection refused".to_string())),
                ),
                FailureKind::NetworkFailure,
            ),
        ];

        for (transport, expected) in cases {
            let uploader = uploader(Arc::new(transport));
            let handle = uploader.start(jpeg(100)).unwrap();
            let failure = handle.wait().await.unwrap_err();
            assert_eq!(failure.kind, expected, "{failure}");
            assert!(uploader.is_idle());
        }
    }

    #[test]
    fn test_remote_message_includes_details() {
        let body = json!({ "error": "Invalid result format", "details": { "lat": ["required"] } });
        let response = TransportResponse::new(500, body.to_string());
        assert_eq!(
            remote_message(&response),
            r#"Invalid result format ({"lat":["required"]})"#
        );
        assert_eq!(
            remote_message(&TransportResponse::new(502, "")),
            "Upload failed with status 502"
        );
    }

    #[tokio::test]
    async fn test_estimate_payload_completes() {
        let body = json!({
            "type": "ESTIMATE",
            "lat": 0.0,
            "lng": 0.0,
            "confidence": 0.0,
            "source": "ESTIMATE",
            "error": "No GPS data found in image."
        });
        let uploader = uploader(Arc::new(ChunkedTransport::answering(200, &body.to_string())));
        let result = uploader.start(jpeg(100)).unwrap().wait().await.unwrap();
        assert_eq!(result.kind(), LocationKind::Estimate);
        assert!(!result.has_usable_coordinates());
    }

    #[tokio::test]
    async fn test_subscribers_see_terminal_state() {
        let uploader = uploader(Arc::new(ChunkedTransport::answering(200, EIFFEL_PAYLOAD)));
        let handle = uploader.start(jpeg(300_000)).unwrap();
        let mut states = handle.subscribe();
        let state = states
            .wait_for(SessionState::is_terminal)
            .await
            .unwrap()
            .clone();
        assert!(matches!(state, SessionState::Completed(_)));
    }

    #[tokio::test]
    async fn test_panicking_transport_fails_the_session() {
        let uploader = uploader(Arc::new(PanickingTransport));
        let mut handle = uploader.start(jpeg(10)).unwrap();

        let events = collect_events(&mut handle).await;
        let terminal: Vec<&SessionEvent> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);

        let failure = handle.wait().await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NetworkFailure);
        assert!(matches!(handle.state(), SessionState::Failed(_)));
        assert!(uploader.is_idle());

        // The uploader stays usable
        let uploader = Uploader::builder()
            .transport(Arc::new(ChunkedTransport::answering(200, EIFFEL_PAYLOAD)))
            .credentials(Arc::new(MemoryCredentialStore::with_token("secret-token")))
            .build();
        assert!(uploader.start(jpeg(10)).unwrap().wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_panicking_transport_releases_the_slot() {
        let uploader = uploader(Arc::new(PanickingTransport));
        let first = uploader.start(jpeg(10)).unwrap();
        assert!(first.wait().await.is_err());

        let second = uploader.start(jpeg(10)).unwrap();
        assert_eq!(
            second.wait().await.unwrap_err().kind,
            FailureKind::NetworkFailure
        );
        assert!(uploader.is_idle());
    }

    #[test]
    fn test_start_outside_runtime_is_an_error() {
        let uploader = uploader(Arc::new(ChunkedTransport::answering(200, EIFFEL_PAYLOAD)));
        assert!(matches!(
            uploader.start(jpeg(10)),
            Err(StartError::NoRuntime)
        ));
        assert!(uploader.is_idle());
    }

    #[tokio::test]
    async fn test_fine_grained_reports_queue_one_event_per_percent() {
        let uploader = uploader(Arc::new(BytewiseTransport));
        let mut handle = uploader.start(jpeg(50_000)).unwrap();

        let events = collect_events(&mut handle).await;
        let percentages: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Progress(p) => Some(p.percentage()),
                _ => None,
            })
            .collect();
        assert_eq!(percentages, (0..=100).collect::<Vec<u8>>());
        assert!(matches!(events.last(), Some(SessionEvent::Completed(_))));
    }
}
