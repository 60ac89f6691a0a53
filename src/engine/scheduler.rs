// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timer service used to schedule throughput-controller refreshes and
//! rate-limited resend ticks.
//!
//! Every scheduled event is owned as a value inside the scheduler rather
//! than as a self-deleting timer object; cancellation is a flag checked
//! right before invocation rather than an object lifetime race.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A handle to a scheduled, possibly-already-fired timer.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Cancels the timer. If it has already fired, this has no effect. If it
    /// fires concurrently with this call, the callback observes cancellation
    /// and no-ops — the race is resolved in favor of not running stale work.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Injected at controller construction so that global timer state is
/// confined to a single handle rather than a process-wide singleton.
pub trait Scheduler: Send + Sync {
    /// Runs `callback` after `delay`, unless the returned handle is cancelled
    /// first. Implementations MUST check cancellation immediately before
    /// invoking the callback.
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TimerHandle;
}

/// Spawns one OS thread per scheduled event. Adequate for the refresh rates
/// this crate's throughput controller uses (one per admitted batch); a
/// production deployment would likely swap this for a shared timer wheel
/// without changing the `Scheduler` trait boundary.
#[derive(Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TimerHandle {
            cancelled: cancelled.clone(),
        };
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if !cancelled.load(Ordering::SeqCst) {
                callback();
            } else {
                log::debug!("[ThreadScheduler] timer cancelled before firing, skipping callback");
            }
        });
        handle
    }
}

/// Runs the callback immediately on the calling thread. Used by tests that
/// want deterministic refresh behavior without sleeping.
#[derive(Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, _delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        callback();
        TimerHandle { cancelled }
    }
}
