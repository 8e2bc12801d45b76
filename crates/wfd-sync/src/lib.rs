//! wfd-sync
//!
//! Local-first synchronization against the remote document store.
//!
//! Push is best-effort: a failed push leaves local state authoritative and
//! the whole pending delta is retried on the next cycle. There is no
//! retry/backoff queue. That gap is kept as-is rather than silently fixed.
//!
//! Pull is guarded: a route completed locally within the last minute keeps
//! its local `Completed` status even if the server still reports it pending,
//! so replication lag cannot flicker a finished route back to life. Once the
//! guard entry expires the server is authoritative again.

mod guard;
mod merge;
mod remote;

pub use guard::RecentCompletionGuard;
pub use merge::{apply_pull, PullReport};
pub use remote::{RemoteStore, SyncError};
