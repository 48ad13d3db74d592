// src/crawl/tracker.rs
// =============================================================================
// Counts crawl tasks that are spawned but not finished, and lets the caller
// wait until that count drops to zero.
//
// Rules:
// - The task that SPAWNS work calls register(), before spawning. If the child
//   registered itself, the count could read zero in the gap between the spawn
//   and the child's first poll.
// - register() hands back a TaskGuard. The spawned task owns it, and dropping
//   it marks the task done. Every return path (and a panic) drops it exactly
//   once, so registrations always equal completions.
// - wait() resolves only when the count is zero.
// =============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    outstanding: AtomicUsize,
    drained: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    inner: Arc<Inner>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one more unit of outstanding work.
    ///
    /// Must be called by the spawning task. Move the guard into the spawned
    /// task; it is released when the task returns.
    #[must_use = "dropping the guard immediately marks the task done"]
    pub fn register(&self) -> TaskGuard {
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of registered tasks that have not finished yet
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Waits until every registered task has finished.
    pub async fn wait(&self) {
        loop {
            // Create the Notified future first...
            let drained = self.inner.drained.notified();
            tokio::pin!(drained);

            // ...and enable it, which registers us as a waiter right now.
            // notify_waiters() only wakes futures that are already
            // registered, so without this a last guard dropped between the
            // count check below and the await would wake nobody and we
            // would sleep forever.
            drained.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            drained.await;

            // Woken because the count hit zero. Loop and check again: a
            // task that was still running may have registered new children
            // in the meantime.
        }
    }
}

/// Proof of one registered task. Dropping it marks the task done.
#[derive(Debug)]
pub struct TaskGuard {
    inner: Arc<Inner>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        // fetch_sub returns the value BEFORE subtracting, so 1 means this
        // was the last outstanding task
        if self.inner.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is a guard type?
//    - A value whose only job is to do something when it is dropped
//    - Rust runs Drop at the end of scope, on early return, and while a
//      panic unwinds, so "task done" cannot be forgotten on any path
//    - std::sync::MutexGuard works the same way (drop = unlock)
//
// 2. What is Notify?
//    - A tokio primitive for "wake up whoever is waiting"
//    - It carries no data; the count in the AtomicUsize is the real state
//
// 3. Why SeqCst ordering everywhere?
//    - It is the strongest (and simplest to reason about) memory ordering
//    - Every thread sees the increments and decrements in the same order
//    - The counter is touched once per task, so the cost does not matter
//
// 4. What does tokio::pin! do?
//    - enable() needs a pinned future (Pin<&mut Notified>)
//    - pin! pins the future in place on the stack so we can call it
// -----------------------------------------------------------------------------
