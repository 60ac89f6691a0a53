// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wake-up contract between producers of outbound work and the async sender.
//!
//! Two-tier design: an atomic flag serves the hot path (any thread can set it
//! without taking a lock), backed by a condvar so the sender can sleep rather
//! than spin when idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Anything that can wake the async sender: `unsent_change_add`, a throughput
/// controller refresh, or a periodic resend timer.
pub trait WakeSink: Send + Sync {
    fn wake(&self);
}

pub struct WakeNotifier {
    data_ready: AtomicBool,
    sleeping: Mutex<bool>,
    condvar: Condvar,
}

impl Default for WakeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_ready: AtomicBool::new(false),
            sleeping: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Marks work ready and wakes a sleeping sender, if any.
    pub fn notify(&self) {
        self.data_ready.store(true, Ordering::Release);
        let mut sleeping = self.sleeping.lock();
        if *sleeping {
            *sleeping = false;
            self.condvar.notify_one();
        }
    }

    /// Returns `true` and clears the flag iff work was pending.
    pub fn check_and_clear(&self) -> bool {
        self.data_ready.swap(false, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.data_ready.load(Ordering::Acquire)
    }

    /// Blocks the calling thread until woken or `timeout` elapses. Returns
    /// `true` if woken by a `notify`, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.check_and_clear() {
            return true;
        }
        let mut sleeping = self.sleeping.lock();
        *sleeping = true;
        let result = self.condvar.wait_for(&mut sleeping, timeout);
        *sleeping = false;
        drop(sleeping);
        if result.timed_out() {
            self.check_and_clear()
        } else {
            self.check_and_clear();
            true
        }
    }
}

impl WakeSink for WakeNotifier {
    fn wake(&self) {
        self.notify();
    }
}

impl WakeSink for Arc<WakeNotifier> {
    fn wake(&self) {
        self.notify();
    }
}
