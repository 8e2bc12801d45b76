//! Remote store boundary.

use wfd_schemas::{RemoteSnapshot, StateDelta};

/// Asynchronous-boundary failure talking to the remote store.
///
/// Fail-open: callers keep local state and reconcile on a later cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Connection-level failure (DNS, refused, timeout).
    Transport(String),
    /// The remote answered with a non-success status.
    RemoteRejected { status: u16, body: String },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Transport(msg) => write!(f, "SYNC_TRANSPORT: {msg}"),
            SyncError::RemoteRejected { status, body } => {
                write!(f, "SYNC_REJECTED: status={status} body={body}")
            }
        }
    }
}

impl std::error::Error for SyncError {}

/// Adapter trait for the remote store. The HTTP implementation lives in
/// `wfd-remote-http`; tests use a scripted fake.
///
/// The wire schema is owned by the remote; adapters translate these calls
/// into whatever the remote speaks.
pub trait RemoteStore: Send {
    /// Best-effort push of dirtied state.
    ///
    /// # Errors
    ///
    /// [`SyncError`] on any transport or remote failure. The caller keeps
    /// local state untouched and retries the delta on the next cycle.
    fn push_partial(&mut self, delta: &StateDelta) -> Result<(), SyncError>;

    /// Fetch the full server-side state.
    ///
    /// # Errors
    ///
    /// [`SyncError`] on any transport or remote failure.
    fn pull_full(&mut self) -> Result<RemoteSnapshot, SyncError>;
}
