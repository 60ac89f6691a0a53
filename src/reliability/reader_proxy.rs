// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-matched-reader bookkeeping of which samples have been sent, acknowledged,
//! and must be retransmitted.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use parking_lot::Mutex;

use crate::types::{Guid, SequenceNumber};

/// Status of a single `(reader, sample)` relation.
///
/// ```text
/// UNSENT ──send──▶ UNDERWAY ──ack──▶ ACKNOWLEDGED
///                     │
///                     └──nack──▶ UNACKNOWLEDGED ──nack-req──▶ REQUESTED ──resend──▶ UNDERWAY
/// ```
/// `Acknowledged` is terminal for a given sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeForReaderStatus {
    Unsent,
    Unacknowledged,
    Requested,
    Acknowledged,
    Underway,
}

#[derive(Debug, Clone)]
pub struct ChangeForReader {
    pub sequence_number: SequenceNumber,
    pub status: ChangeForReaderStatus,
    pub is_relevant: bool,
}

struct ReaderProxyState {
    unicast_addr: Option<SocketAddr>,
    lease_duration: Duration,
    last_seen: std::time::Instant,
    changes: BTreeMap<SequenceNumber, ChangeForReader>,
}

/// Owns the matched reader's GUID, locator set, and the set of `ChangeForReader` entries.
///
/// Invariant: no two entries share a sequence number (enforced by the
/// `BTreeMap` key) and lookups run in O(log n).
pub struct ReaderProxy {
    reader_guid: Guid,
    state: Mutex<ReaderProxyState>,
}

impl ReaderProxy {
    #[must_use]
    pub fn new(reader_guid: Guid, unicast_addr: Option<SocketAddr>, lease_duration: Duration) -> Self {
        Self {
            reader_guid,
            state: Mutex::new(ReaderProxyState {
                unicast_addr,
                lease_duration,
                last_seen: std::time::Instant::now(),
                changes: BTreeMap::new(),
            }),
        }
    }

    #[must_use]
    pub fn reader_guid(&self) -> Guid {
        self.reader_guid
    }

    pub fn set_unicast_addr(&self, addr: SocketAddr) {
        self.state.lock().unicast_addr = Some(addr);
    }

    #[must_use]
    pub fn unicast_addr(&self) -> Option<SocketAddr> {
        self.state.lock().unicast_addr
    }

    pub fn touch(&self) {
        self.state.lock().last_seen = std::time::Instant::now();
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        let state = self.state.lock();
        state.last_seen.elapsed() > state.lease_duration
    }

    /// Creates a `ChangeForReader` entry in `Unsent` state for `seq`, unless
    /// `is_relevant` is false, in which case no entry is created — the sample
    /// is treated as already-acknowledged by this reader (see
    /// [`StatefulWriter::is_acked_by_all`](super::StatefulWriter::is_acked_by_all)).
    pub fn add_change(&self, seq: SequenceNumber, is_relevant: bool) {
        if !is_relevant {
            return;
        }
        self.state.lock().changes.insert(
            seq,
            ChangeForReader {
                sequence_number: seq,
                status: ChangeForReaderStatus::Unsent,
                is_relevant,
            },
        );
    }

    /// Marks every entry with sequence number `< n` as `Acknowledged`. Idempotent.
    pub fn acked_changes_set(&self, n: SequenceNumber) {
        for entry in self.state.lock().changes.values_mut() {
            if entry.sequence_number < n {
                entry.status = ChangeForReaderStatus::Acknowledged;
            }
        }
    }

    /// For each sequence number in `set`, if its entry is `Unacknowledged` or
    /// `Underway`, transitions it to `Requested`. Absent entries are ignored.
    pub fn requested_changes_set(&self, set: &[SequenceNumber]) {
        let mut state = self.state.lock();
        for seq in set {
            if let Some(entry) = state.changes.get_mut(seq) {
                if matches!(
                    entry.status,
                    ChangeForReaderStatus::Unacknowledged | ChangeForReaderStatus::Underway
                ) {
                    entry.status = ChangeForReaderStatus::Requested;
                }
            }
        }
    }

    /// Transitions `UNDERWAY` to `UNACKNOWLEDGED` for the given sequence, as
    /// driven by a NACK that named it before any explicit re-request.
    pub fn nack(&self, seq: SequenceNumber) {
        if let Some(entry) = self.state.lock().changes.get_mut(&seq) {
            if entry.status == ChangeForReaderStatus::Underway {
                entry.status = ChangeForReaderStatus::Unacknowledged;
            }
        }
    }

    /// Transitions `Unsent` or `Requested` to `Underway`, as performed by the
    /// async sender once it has actually handed the sample to the transport.
    pub fn mark_underway(&self, seq: SequenceNumber) {
        if let Some(entry) = self.state.lock().changes.get_mut(&seq) {
            if matches!(
                entry.status,
                ChangeForReaderStatus::Unsent | ChangeForReaderStatus::Requested
            ) {
                entry.status = ChangeForReaderStatus::Underway;
            }
        }
    }

    #[must_use]
    pub fn next_unsent_change(&self) -> Option<ChangeForReader> {
        self.state
            .lock()
            .changes
            .values()
            .find(|c| c.status == ChangeForReaderStatus::Unsent)
            .cloned()
    }

    #[must_use]
    pub fn next_requested_change(&self) -> Option<ChangeForReader> {
        self.state
            .lock()
            .changes
            .values()
            .find(|c| c.status == ChangeForReaderStatus::Requested)
            .cloned()
    }

    #[must_use]
    pub fn unsent_changes(&self) -> Vec<ChangeForReader> {
        self.state
            .lock()
            .changes
            .values()
            .filter(|c| c.status == ChangeForReaderStatus::Unsent)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn requested_changes(&self) -> Vec<ChangeForReader> {
        self.state
            .lock()
            .changes
            .values()
            .filter(|c| c.status == ChangeForReaderStatus::Requested)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn change_for_reader_lookup(&self, seq: SequenceNumber) -> Option<ChangeForReader> {
        self.state.lock().changes.get(&seq).cloned()
    }

    /// True iff an entry exists for `seq` and it is `Acknowledged`, or no
    /// entry exists at all (the sample was irrelevant to this reader).
    #[must_use]
    pub fn is_acknowledged_or_irrelevant(&self, seq: SequenceNumber) -> bool {
        match self.state.lock().changes.get(&seq) {
            Some(entry) => entry.status == ChangeForReaderStatus::Acknowledged,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn proxy() -> ReaderProxy {
        ReaderProxy::new(Guid::zero(), None, Duration::from_secs(30))
    }

    #[test]
    fn acked_changes_set_is_idempotent_and_monotone() {
        let p = proxy();
        for seq in 1..=3u64 {
            p.add_change(SequenceNumber(seq), true);
        }
        p.acked_changes_set(SequenceNumber(3));
        assert!(p.is_acknowledged_or_irrelevant(SequenceNumber(1)));
        assert!(p.is_acknowledged_or_irrelevant(SequenceNumber(2)));
        assert!(!p.is_acknowledged_or_irrelevant(SequenceNumber(3)));

        // Idempotent: calling again with the same bound changes nothing.
        p.acked_changes_set(SequenceNumber(3));
        assert!(p.is_acknowledged_or_irrelevant(SequenceNumber(1)));
    }

    #[test]
    fn irrelevant_change_never_creates_an_entry() {
        let p = proxy();
        p.add_change(SequenceNumber(1), false);
        assert!(p.change_for_reader_lookup(SequenceNumber(1)).is_none());
        assert!(p.is_acknowledged_or_irrelevant(SequenceNumber(1)));
    }

    #[test]
    fn requested_changes_set_ignores_absent_and_wrong_state() {
        let p = proxy();
        p.add_change(SequenceNumber(1), true);
        p.mark_underway(SequenceNumber(1));
        p.nack(SequenceNumber(1));
        p.requested_changes_set(&[SequenceNumber(1), SequenceNumber(99)]);
        assert_eq!(
            p.change_for_reader_lookup(SequenceNumber(1)).unwrap().status,
            ChangeForReaderStatus::Requested
        );
        assert!(p.change_for_reader_lookup(SequenceNumber(99)).is_none());
    }

    #[test]
    fn next_unsent_change_returns_smallest_sequence() {
        let p = proxy();
        p.add_change(SequenceNumber(5), true);
        p.add_change(SequenceNumber(2), true);
        p.add_change(SequenceNumber(8), true);
        assert_eq!(p.next_unsent_change().unwrap().sequence_number, SequenceNumber(2));
    }

    #[test]
    fn full_resend_cycle() {
        let p = proxy();
        p.add_change(SequenceNumber(1), true);
        p.mark_underway(SequenceNumber(1));
        p.nack(SequenceNumber(1));
        assert_eq!(
            p.change_for_reader_lookup(SequenceNumber(1)).unwrap().status,
            ChangeForReaderStatus::Unacknowledged
        );
        p.requested_changes_set(&[SequenceNumber(1)]);
        assert_eq!(
            p.change_for_reader_lookup(SequenceNumber(1)).unwrap().status,
            ChangeForReaderStatus::Requested
        );
        p.mark_underway(SequenceNumber(1));
        assert_eq!(
            p.change_for_reader_lookup(SequenceNumber(1)).unwrap().status,
            ChangeForReaderStatus::Underway
        );
        p.acked_changes_set(SequenceNumber(2));
        assert!(p.is_acknowledged_or_irrelevant(SequenceNumber(1)));
    }

    #[test]
    fn concurrent_status_transitions_never_panic_or_deadlock() {
        let p = Arc::new(proxy());
        for seq in 1..=50u64 {
            p.add_change(SequenceNumber(seq), true);
        }

        let barrier = Arc::new(Barrier::new(8));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let p = Arc::clone(&p);
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                for _ in 0..500 {
                    let seq = SequenceNumber(fastrand::u64(1..=50));
                    match fastrand::usize(..4) {
                        0 => p.mark_underway(seq),
                        1 => p.nack(seq),
                        2 => p.requested_changes_set(&[seq]),
                        _ => p.acked_changes_set(seq),
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread should succeed");
        }

        for seq in 1..=50u64 {
            assert!(p.change_for_reader_lookup(SequenceNumber(seq)).is_some());
        }
    }
}
