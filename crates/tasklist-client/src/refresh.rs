use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Coalesces concurrent token refreshes: at most one `/auth/refresh` call is
/// in flight process-wide. Every caller that hits a 401 while one is pending
/// waits on that call's outcome instead of issuing its own.
///
/// The flag and queue are owned by the gate rather than living in module
/// globals, so each client (and each test) gets an independent coordinator.
/// Callers run on the same tokio runtime; interleaving is cooperative, and
/// the waiter queue is drained FIFO before the flag clears.
pub struct RefreshGate {
    state: Mutex<GateState>,
}

struct GateState {
    refreshing: bool,
    waiters: VecDeque<oneshot::Sender<bool>>,
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<bool>),
}

impl RefreshGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                refreshing: false,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Run `do_refresh` if no refresh is in flight, otherwise wait for the
    /// in-flight one. Returns whether the session was refreshed.
    pub async fn coalesce<F, Fut>(&self, do_refresh: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        match self.enter() {
            Role::Leader => {
                let ok = do_refresh().await;
                self.complete(ok);
                ok
            }
            // A dropped sender means the leader never completed; fail closed.
            Role::Follower(rx) => rx.await.unwrap_or(false),
        }
    }

    fn enter(&self) -> Role {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            Role::Follower(rx)
        } else {
            state.refreshing = true;
            Role::Leader
        }
    }

    /// Drain the queue in FIFO order with the outcome, then clear the flag.
    /// Anyone arriving after this point starts a fresh cycle.
    fn complete(&self, ok: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(tx) = state.waiters.pop_front() {
            let _ = tx.send(ok);
        }
        state.refreshing = false;
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // These tests run on the default current-thread test runtime, so task
    // interleaving is deterministic: yield_now lets every already-spawned
    // task run before the current one resumes.

    #[tokio::test]
    async fn concurrent_401s_coalesce_into_one_refresh() {
        let gate = Arc::new(RefreshGate::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let leader = {
            let gate = gate.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                gate.coalesce(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    release_rx.await.unwrap();
                    true
                })
                .await
            })
        };

        // Let the leader claim the gate before the followers arrive
        tokio::task::yield_now().await;

        let mut followers = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let calls = calls.clone();
            followers.push(tokio::spawn(async move {
                gate.coalesce(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .await
            }));
        }
        tokio::task::yield_now().await;

        release_tx.send(()).unwrap();

        assert!(leader.await.unwrap());
        for f in followers {
            assert!(f.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn queued_requests_resolve_in_fifo_order() {
        let gate = Arc::new(RefreshGate::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let leader = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.coalesce(|| async {
                    release_rx.await.unwrap();
                    true
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        let mut followers = Vec::new();
        for i in 0..5 {
            let gate = gate.clone();
            let order = order.clone();
            followers.push(tokio::spawn(async move {
                let ok = gate.coalesce(|| async { false }).await;
                assert!(ok);
                order.lock().unwrap().push(i);
            }));
        }
        tokio::task::yield_now().await;

        release_tx.send(()).unwrap();

        leader.await.unwrap();
        for f in followers {
            f.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn failed_refresh_rejects_queue_and_clears_flag() {
        let gate = Arc::new(RefreshGate::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let leader = {
            let gate = gate.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                gate.coalesce(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    release_rx.await.unwrap();
                    false
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        let follower = {
            let gate = gate.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                gate.coalesce(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    false
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        release_tx.send(()).unwrap();

        assert!(!leader.await.unwrap());
        assert!(!follower.await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Flag cleared: the next caller is a fresh leader, not a waiter
        let ok = gate.coalesce(|| async { true }).await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sequential_refreshes_each_get_a_leader() {
        let gate = RefreshGate::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let ok = gate
                .coalesce(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .await;
            assert!(ok);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
