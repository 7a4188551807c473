//! The seam between an upload session and whatever moves bytes to the endpoint.

use crate::upload::error::TransportError;
use crate::upload::session::SessionCore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// One multipart file submission, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub contents: Arc<[u8]>,
    pub token: String,
}

/// What the endpoint answered. The body is interpreted by the session, not the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends an [`UploadRequest`] to the upload endpoint.
///
/// Implementations report cumulative bytes through the [`ProgressReporter`] and should
/// stop early once the [`CancelSignal`] fires. Retries, if any, are theirs to make.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
        cancel: CancelSignal,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// Handed to a transport to report how many bytes have been sent so far.
///
/// Reports never block. Reports that do not move forward, or that arrive after the
/// session has ended, are dropped. The session state follows every byte count, but
/// an event is only queued when the percentage changes, so a session queues at most
/// 101 progress events.
#[derive(Clone)]
pub struct ProgressReporter {
    core: Arc<SessionCore>,
}

impl ProgressReporter {
    pub(crate) const fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    pub fn report(&self, bytes_sent: u64) {
        self.core.record_progress(bytes_sent);
    }
}

/// Cooperative cancellation flag for a transfer.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    pub(crate) const fn new(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves otherwise.
    pub async fn cancelled(&mut self) {
        if self.receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
