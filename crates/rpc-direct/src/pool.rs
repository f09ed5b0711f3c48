//! The deferred-close socket pool (§4.3).
//!
//! Grounded on `ZMQSocket` in `dao/common/rpc_driver/zmq.py`: a
//! process-wide list of sockets whose scope has ended but whose handle
//! isn't torn down until the *next* acquisition sweeps it out. Pull
//! sockets are swept unconditionally; push sockets linger until they're
//! at least `send_timeout` old, so an in-flight reply has time to drain
//! before the connection closes under it.
//!
//! The Python original tracks a "never opened" state for sockets whose
//! `with` scope was never entered. Rust's RAII collapses construction
//! and scope entry into one step, so that case doesn't arise here: by
//! the time a handle exists, it's in use.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SocketKind {
    Push,
    Pull,
}

struct Entry<H> {
    created_at: Instant,
    kind: SocketKind,
    handle: H,
}

/// A process-wide pool of finished-but-not-yet-closed socket handles.
///
/// `H`'s `Drop` impl is what actually closes the underlying socket;
/// this pool's job is only to decide *when* an entry gets dropped.
pub(crate) struct DeferredClosePool<H> {
    entries: Mutex<Vec<Entry<H>>>,
}

impl<H> DeferredClosePool<H> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Hand a finished socket to the pool. It will be closed on some
    /// future call to `sweep` (never this one).
    pub fn finish(&self, kind: SocketKind, handle: H) {
        self.entries.lock().push(Entry {
            created_at: Instant::now(),
            kind,
            handle,
        });
    }

    /// Sweep the pool: drop (and so close) every pull socket
    /// unconditionally, and every push socket at least `send_timeout`
    /// old. Called at the start of every new acquisition.
    pub fn sweep(&self, send_timeout: Duration) {
        let now = Instant::now();
        self.entries.lock().retain(|e| match e.kind {
            SocketKind::Pull => false,
            SocketKind::Push => now.duration_since(e.created_at) < send_timeout,
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_sockets_are_swept_immediately() {
        let pool: DeferredClosePool<u32> = DeferredClosePool::new();
        pool.finish(SocketKind::Pull, 1);
        assert_eq!(pool.len(), 1);
        pool.sweep(Duration::from_secs(20));
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn push_sockets_linger_until_aged_out() {
        let pool: DeferredClosePool<u32> = DeferredClosePool::new();
        pool.finish(SocketKind::Push, 1);
        pool.sweep(Duration::from_secs(20));
        assert_eq!(pool.len(), 1, "fresh push socket should still be lingering");

        pool.sweep(Duration::from_millis(0));
        assert_eq!(pool.len(), 0, "a zero send_timeout ages everything out immediately");
    }

    #[test]
    fn sweep_only_removes_what_is_due() {
        let pool: DeferredClosePool<u32> = DeferredClosePool::new();
        pool.finish(SocketKind::Push, 1);
        pool.finish(SocketKind::Pull, 2);
        pool.sweep(Duration::from_secs(20));
        assert_eq!(pool.len(), 1, "pull gone, push still lingering");
    }
}
