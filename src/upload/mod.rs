//! Single-flight upload sessions.
//!
//! An [`Uploader`] owns one active-session slot. [`Uploader::start`] claims it, checks
//! the file, and hands the transfer to a [`Transport`]; the returned [`SessionHandle`]
//! reports progress and ends in exactly one of `Completed` or `Failed`.
mod credentials;
pub mod error;
mod progress;
mod session;
pub mod structs;
mod transport;
mod uploader;

pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use error::{FailureKind, SessionFailure, StartError, TransportError};
pub use progress::UploadProgress;
pub use session::{SessionEvents, SessionHandle};
pub use structs::{SessionEvent, SessionOutcome, SessionState, UploadRecord};
pub use transport::{CancelSignal, ProgressReporter, Transport, TransportResponse, UploadRequest};
pub use uploader::Uploader;
