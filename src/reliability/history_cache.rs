// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ordered store of sample records keyed by sequence number.
//!
//! Owns every [`CacheChange`] it holds; readers only ever look samples up by
//! sequence number through a [`ReaderProxy`](super::ReaderProxy) — they never
//! extend a sample's lifetime.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::types::{Guid, SequenceNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Alive,
    NotAliveDisposed,
    NotAliveUnregistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentPresence {
    Present,
    NotPresent,
}

#[derive(Debug, Clone)]
pub struct FragmentDescriptor {
    pub fragment_size: u32,
    pub presence: Vec<FragmentPresence>,
}

impl FragmentDescriptor {
    #[must_use]
    pub fn new(fragment_size: u32, payload_len: usize) -> Self {
        debug_assert!(fragment_size > 0);
        let count = payload_len.div_ceil(fragment_size as usize).max(1);
        Self {
            fragment_size,
            presence: vec![FragmentPresence::Present; count],
        }
    }

    #[must_use]
    pub fn present_count(&self) -> usize {
        self.presence
            .iter()
            .filter(|p| **p == FragmentPresence::Present)
            .count()
    }

    #[must_use]
    pub fn fully_emitted(&self) -> bool {
        self.present_count() == 0
    }
}

/// A single sample record.
///
/// If `fragments` is `None` the sample is atomic. Otherwise the number of
/// fragments equals `ceil(payload.len() / fragment_size)` and at least one
/// flag is `Present` until the sample is fully emitted.
#[derive(Debug, Clone)]
pub struct CacheChange {
    pub sequence_number: SequenceNumber,
    pub writer_guid: Guid,
    pub kind: ChangeKind,
    pub payload: Vec<u8>,
    pub fragments: Option<FragmentDescriptor>,
}

impl CacheChange {
    #[must_use]
    pub fn new(sequence_number: SequenceNumber, writer_guid: Guid, payload: Vec<u8>) -> Self {
        Self {
            sequence_number,
            writer_guid,
            kind: ChangeKind::Alive,
            payload,
            fragments: None,
        }
    }

    #[must_use]
    pub fn fragmented(mut self, fragment_size: u32) -> Self {
        self.fragments = Some(FragmentDescriptor::new(fragment_size, self.payload.len()));
        self
    }

    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// FIFO-ordered store of [`CacheChange`] records, indexed by sequence number.
///
/// Protected by a plain [`Mutex`]; every accessor recovers from poisoning the
/// same way the rest of this crate does, logging at `debug!` and taking the
/// inner guard rather than propagating the poison.
pub struct HistoryCache {
    entries: Mutex<VecDeque<CacheChange>>,
}

impl Default for HistoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<CacheChange>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::debug!("[HistoryCache::lock] Lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Appends a change. Sequence numbers are expected to be strictly
    /// increasing; this is the writer's responsibility to uphold.
    pub fn insert(&self, change: CacheChange) {
        self.lock().push_back(change);
    }

    #[must_use]
    pub fn get(&self, seq: SequenceNumber) -> Option<CacheChange> {
        self.lock().iter().find(|c| c.sequence_number == seq).cloned()
    }

    /// Writes a post-admission `FragmentDescriptor` back into the stored
    /// record with sequence number `seq`. `get` returns a clone, so callers
    /// that mutate fragment-presence flags on that clone (the throughput
    /// controller, during partial admission) must call this to persist the
    /// result; otherwise the retry state is lost on the next drain. No-op if
    /// the entry is gone (e.g. already acknowledged and trimmed).
    pub fn update_fragments(&self, seq: SequenceNumber, fragments: FragmentDescriptor) {
        if let Some(entry) = self.lock().iter_mut().find(|c| c.sequence_number == seq) {
            entry.fragments = Some(fragments);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes every entry with sequence number strictly less than `seq`.
    pub fn remove_acknowledged_before(&self, seq: SequenceNumber) {
        self.lock().retain(|c| c.sequence_number >= seq);
    }

    #[must_use]
    pub fn oldest_seq(&self) -> Option<SequenceNumber> {
        self.lock().front().map(|c| c.sequence_number)
    }

    #[must_use]
    pub fn newest_seq(&self) -> Option<SequenceNumber> {
        self.lock().back().map(|c| c.sequence_number)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<CacheChange> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
