// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Admission-control functor over an outbound batch of `CacheChange`s, with
//! cancellation-safe refill scheduling.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::ReentrantMutex;

use crate::engine::{Scheduler, WakeSink};
use crate::reliability::{CacheChange, FragmentPresence};

#[derive(Debug, Clone, Copy)]
pub struct ThroughputControllerConfig {
    pub bytes_per_period: u32,
    pub period: Duration,
}

impl Default for ThroughputControllerConfig {
    fn default() -> Self {
        Self {
            bytes_per_period: 1_000_000,
            period: Duration::from_millis(100),
        }
    }
}

/// Pure admission filter plus refill scheduler.
///
/// Internal state is protected by a **reentrant** mutex: the refresh
/// callback may run on the scheduler's own thread while `admit` holds the
/// lock and itself schedules a further refresh. The accumulator lives behind
/// an `Arc` so a scheduled refresh closure can update it without borrowing
/// `self`.
pub struct ThroughputController {
    config: ThroughputControllerConfig,
    accumulated: Arc<ReentrantMutex<Cell<u32>>>,
    scheduler: Arc<dyn Scheduler>,
    wake_sink: Arc<dyn WakeSink>,
    listening: Arc<AtomicBool>,
}

impl ThroughputController {
    #[must_use]
    pub fn new(
        config: ThroughputControllerConfig,
        scheduler: Arc<dyn Scheduler>,
        wake_sink: Arc<dyn WakeSink>,
    ) -> Self {
        Self {
            config,
            accumulated: Arc::new(ReentrantMutex::new(Cell::new(0))),
            scheduler,
            wake_sink,
            listening: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn accumulated_payload_size(&self) -> u32 {
        self.accumulated.lock().get()
    }

    /// Tears down the controller: pending refreshes observe this and no-op.
    pub fn shutdown(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    /// Admits a prefix of `changes` in place, truncating the rest. Returns
    /// the number of bytes admitted this call.
    ///
    /// For a non-fragmented sample of length `L`: admitted iff
    /// `accumulated + L <= bytes_per_period`.
    ///
    /// For a fragmented sample with fragment size `F` and `p` fragments
    /// currently `Present`: admits `k = min((bytes_per_period - accumulated) / F, p)`
    /// fragments. The first `p - k` originally-`Present` flags remain
    /// `Present` (retry next period); the remaining `k` become `NotPresent`
    /// (emit now).
    pub fn admit(&self, changes: &mut Vec<CacheChange>) -> u32 {
        let guard = self.accumulated.lock();
        let before = guard.get();
        let mut accumulated = before;
        let mut cleared = 0usize;

        for change in changes.iter_mut() {
            match &mut change.fragments {
                None => {
                    let len = change.payload_len() as u32;
                    if accumulated + len <= self.config.bytes_per_period {
                        accumulated += len;
                        cleared += 1;
                    } else {
                        break;
                    }
                }
                Some(desc) => {
                    let f = desc.fragment_size;
                    let p = desc.present_count() as u32;
                    let budget = self.config.bytes_per_period.saturating_sub(accumulated);
                    let k = (budget / f).min(p);
                    if k == 0 {
                        break;
                    }
                    accumulated += k * f;

                    let present_indices: Vec<usize> = desc
                        .presence
                        .iter()
                        .enumerate()
                        .filter(|(_, flag)| **flag == FragmentPresence::Present)
                        .map(|(i, _)| i)
                        .collect();
                    let keep = present_indices.len().saturating_sub(k as usize);
                    for (rank, idx) in present_indices.into_iter().enumerate() {
                        if rank >= keep {
                            desc.presence[idx] = FragmentPresence::NotPresent;
                        }
                    }
                    cleared += 1;
                }
            }
        }

        changes.truncate(cleared);
        guard.set(accumulated);
        let admitted = accumulated - before;
        drop(guard);

        if admitted > 0 {
            self.schedule_refresh(admitted);
        }
        admitted
    }

    fn schedule_refresh(&self, restore: u32) {
        let listening = self.listening.clone();
        let wake_sink = self.wake_sink.clone();
        let accumulated = self.accumulated.clone();
        self.scheduler.schedule(
            self.config.period,
            Box::new(move || {
                if !listening.load(Ordering::SeqCst) {
                    log::debug!("[ThroughputController] refresh fired after shutdown, no-op");
                    return;
                }
                let guard = accumulated.lock();
                let current = guard.get();
                guard.set(if restore > current { 0 } else { current - restore });
                drop(guard);
                wake_sink.wake();
            }),
        );
    }
}
