//! State machine for one upload.
//!
//! Every transition and every emitted event happens while holding the session lock,
//! so a cancellation, a late progress report and a late completion can never
//! interleave: whichever reaches the lock first while the session is still running
//! decides the outcome, and everything after it is dropped.

use crate::features::file_acceptance::FileMetadata;
use crate::location::LocationResult;
use crate::upload::error::{FailureKind, SessionFailure};
use crate::upload::progress::UploadProgress;
use crate::upload::structs::{SessionEvent, SessionOutcome, SessionState, UploadRecord};
use crate::upload::transport::CancelSignal;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Claim on the single active-session slot of an uploader. Dropping it frees the slot.
#[derive(Debug)]
pub(crate) struct SlotGuard {
    slot: Arc<AtomicBool>,
}

impl SlotGuard {
    pub(crate) fn acquire(slot: &Arc<AtomicBool>) -> Option<Self> {
        slot.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                slot: Arc::clone(slot),
            })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

struct Inner {
    state: SessionState,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    slot: Option<SlotGuard>,
    record: Option<UploadRecord>,
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening anymore.
            let _ = events.send(event);
        }
    }
}

pub(crate) struct SessionCore {
    file: FileMetadata,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionState>,
    cancel_tx: watch::Sender<bool>,
}

impl SessionCore {
    /// Creates a session in `Validating`, holding the given slot until it terminates.
    pub(crate) fn start(file: FileMetadata, slot: SlotGuard) -> (Arc<Self>, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::Validating);
        let (cancel_tx, _) = watch::channel(false);

        let core = Arc::new(Self {
            file,
            inner: Mutex::new(Inner {
                state: SessionState::Validating,
                events: Some(events_tx),
                slot: Some(slot),
                record: None,
            }),
            state_tx,
            cancel_tx,
        });
        let handle = SessionHandle {
            core: Arc::clone(&core),
            events: Some(SessionEvents {
                receiver: events_rx,
            }),
        };
        (core, handle)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, inner: &mut Inner, state: SessionState) {
        inner.state = state.clone();
        self.state_tx.send_replace(state);
    }

    pub(crate) fn file(&self) -> &FileMetadata {
        &self.file
    }

    pub(crate) fn cancel_signal(&self) -> CancelSignal {
        CancelSignal::new(self.cancel_tx.subscribe())
    }

    /// `Validating -> Transferring`, announcing 0%.
    pub(crate) fn begin_transfer(&self) {
        let mut inner = self.lock();
        if !matches!(inner.state, SessionState::Validating) {
            return;
        }
        let progress = UploadProgress::start(self.file.size_bytes);
        self.set_state(&mut inner, SessionState::Transferring(progress));
        inner.emit(SessionEvent::Progress(progress));
        debug!(file = %self.file.name, bytes = self.file.size_bytes, "Transfer started");
    }

    pub(crate) fn record_progress(&self, bytes_sent: u64) {
        let mut inner = self.lock();
        let SessionState::Transferring(progress) = &inner.state else {
            return;
        };
        if let Some(next) = progress.advance(bytes_sent) {
            // At most one event per percentage point, however finely the transport reports.
            let changed = next.percentage() > progress.percentage();
            self.set_state(&mut inner, SessionState::Transferring(next));
            if changed {
                inner.emit(SessionEvent::Progress(next));
            }
        }
    }

    fn terminate(&self, inner: &mut Inner, outcome: SessionOutcome) {
        if let Ok(result) = &outcome {
            // A completed transfer always ends at 100%.
            if let SessionState::Transferring(progress) = &inner.state
                && let Some(full) = progress.advance(self.file.size_bytes)
                && full.percentage() > progress.percentage()
            {
                inner.emit(SessionEvent::Progress(full));
            }
            inner.record = Some(UploadRecord::new(&self.file, result, Utc::now()));
        }

        let state = match &outcome {
            Ok(result) => SessionState::Completed(result.clone()),
            Err(failure) => SessionState::Failed(failure.clone()),
        };
        inner.slot = None;
        self.set_state(inner, state);
        inner.emit(SessionEvent::from(outcome));
        inner.events = None;
    }

    /// Moves a running session to its terminal state. Returns `false` if it had
    /// already ended, in which case `outcome` is discarded.
    pub(crate) fn finish(&self, outcome: SessionOutcome) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            debug!(file = %self.file.name, "Ignoring outcome of an already finished session");
            return false;
        }
        match &outcome {
            Ok(result) => info!(
                file = %self.file.name,
                kind = %result.kind(),
                "Upload completed"
            ),
            Err(failure) => warn!(
                file = %self.file.name,
                kind = %failure.kind,
                "Upload failed: {}",
                failure.message
            ),
        }
        self.terminate(&mut inner, outcome);
        true
    }

    pub(crate) fn cancel(&self) -> bool {
        let mut inner = self.lock();
        if !matches!(inner.state, SessionState::Transferring(_)) {
            return false;
        }
        info!(file = %self.file.name, "Upload cancelled");
        self.terminate(&mut inner, Err(SessionFailure::cancelled()));
        self.cancel_tx.send_replace(true);
        true
    }

    fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    fn record(&self) -> Option<UploadRecord> {
        self.lock().record.clone()
    }
}

/// Ordered stream of a session's events. Ends after the terminal event.
#[derive(Debug)]
pub struct SessionEvents {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Returns an already queued event without waiting.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }
}

/// The caller's view of one upload session.
pub struct SessionHandle {
    core: Arc<SessionCore>,
    events: Option<SessionEvents>,
}

impl SessionHandle {
    pub fn file(&self) -> &FileMetadata {
        self.core.file()
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Takes the event stream. Every progress event is delivered, in order, followed by
    /// exactly one terminal event. Only the first call returns `Some`.
    pub fn events(&mut self) -> Option<SessionEvents> {
        self.events.take()
    }

    /// Watches the latest state. Intermediate states may be skipped, but the terminal
    /// state is always the last value seen.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.core.state_tx.subscribe()
    }

    /// Requests cancellation of a running transfer.
    ///
    /// Returns `true` if the session was transferring and is now
    /// `Failed(Cancelled)`; no further progress or completion will be reported for
    /// it. Returns `false` if the session had already ended.
    pub fn cancel(&self) -> bool {
        self.core.cancel()
    }

    /// Waits for the session to end and returns how it ended.
    pub async fn wait(&self) -> SessionOutcome {
        let mut states = self.subscribe();
        let state = match states.wait_for(SessionState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state.outcome().unwrap_or_else(|| {
            Err(SessionFailure::new(
                FailureKind::NetworkFailure,
                "Session ended without an outcome",
            ))
        })
    }

    /// Summary of the upload, once it has completed.
    pub fn record(&self) -> Option<UploadRecord> {
        self.core.record()
    }

    /// The result, if the session completed.
    pub fn result(&self) -> Option<LocationResult> {
        match self.state() {
            SessionState::Completed(result) => Some(result),
            _ => None,
        }
    }
}
