//! Scriptable remote store double.

use std::sync::{Arc, Mutex};

use wfd_schemas::{RemoteSnapshot, StateDelta};
use wfd_sync::{RemoteStore, SyncError};

#[derive(Debug, Default)]
struct Inner {
    pushed: Vec<StateDelta>,
    snapshot: RemoteSnapshot,
    fail_pushes: u32,
    fail_pulls: u32,
}

/// Deterministic remote store: records every pushed delta, serves a
/// configurable snapshot, and can be scripted to fail the next N pushes or
/// pulls. Clones share state, so a handle kept by the test keeps observing
/// the instance boxed into the engine.
#[derive(Clone, Debug, Default)]
pub struct FakeRemote {
    inner: Arc<Mutex<Inner>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot served by `pull_full`.
    pub fn set_snapshot(&self, snapshot: RemoteSnapshot) {
        self.inner.lock().expect("fake remote lock").snapshot = snapshot;
    }

    /// Script the next `n` pushes to fail with a transport error.
    pub fn fail_next_pushes(&self, n: u32) {
        self.inner.lock().expect("fake remote lock").fail_pushes = n;
    }

    /// Script the next `n` pulls to fail with a transport error.
    pub fn fail_next_pulls(&self, n: u32) {
        self.inner.lock().expect("fake remote lock").fail_pulls = n;
    }

    /// Every delta successfully pushed, in order.
    pub fn pushed(&self) -> Vec<StateDelta> {
        self.inner.lock().expect("fake remote lock").pushed.clone()
    }

    pub fn push_count(&self) -> usize {
        self.inner.lock().expect("fake remote lock").pushed.len()
    }
}

impl RemoteStore for FakeRemote {
    fn push_partial(&mut self, delta: &StateDelta) -> Result<(), SyncError> {
        let mut inner = self.inner.lock().expect("fake remote lock");
        if inner.fail_pushes > 0 {
            inner.fail_pushes -= 1;
            return Err(SyncError::Transport("scripted push failure".to_string()));
        }
        inner.pushed.push(delta.clone());
        Ok(())
    }

    fn pull_full(&mut self) -> Result<RemoteSnapshot, SyncError> {
        let mut inner = self.inner.lock().expect("fake remote lock");
        if inner.fail_pulls > 0 {
            inner.fail_pulls -= 1;
            return Err(SyncError::Transport("scripted pull failure".to_string()));
        }
        Ok(inner.snapshot.clone())
    }
}
