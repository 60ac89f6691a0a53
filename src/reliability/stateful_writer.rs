// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Aggregates reader proxies, answers "acked by all?", and feeds the async sender.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::engine::WakeSink;
use crate::types::{Guid, SequenceNumber};

use super::history_cache::{CacheChange, HistoryCache};
use super::reader_proxy::ReaderProxy;

type RelevanceFn = dyn Fn(&CacheChange, Guid) -> bool + Send + Sync;

fn always_relevant(_change: &CacheChange, _reader: Guid) -> bool {
    true
}

/// Owns its history cache and a set of reader proxies keyed by reader GUID.
///
/// Matching a reader is idempotent on GUID equality. No operation here
/// performs I/O; they purely mutate in-memory bookkeeping and, on new work,
/// notify an injected [`WakeSink`] so the async sender picks it up.
pub struct StatefulWriter {
    writer_guid: Guid,
    history: HistoryCache,
    proxies: RwLock<HashMap<Guid, Arc<ReaderProxy>>>,
    next_seq: std::sync::atomic::AtomicU64,
    relevance: Box<RelevanceFn>,
    wake_sink: Option<Arc<dyn WakeSink>>,
}

impl StatefulWriter {
    #[must_use]
    pub fn new(writer_guid: Guid) -> Self {
        Self {
            writer_guid,
            history: HistoryCache::new(),
            proxies: RwLock::new(HashMap::new()),
            next_seq: std::sync::atomic::AtomicU64::new(1),
            relevance: Box::new(always_relevant),
            wake_sink: None,
        }
    }

    #[must_use]
    pub fn with_wake_sink(mut self, sink: Arc<dyn WakeSink>) -> Self {
        self.wake_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_relevance<F>(mut self, f: F) -> Self
    where
        F: Fn(&CacheChange, Guid) -> bool + Send + Sync + 'static,
    {
        self.relevance = Box::new(f);
        self
    }

    #[must_use]
    pub fn writer_guid(&self) -> Guid {
        self.writer_guid
    }

    #[must_use]
    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    /// Inserts the proxy if the reader GUID is not already present. For every
    /// existing sample, a `ChangeForReader` entry is created in `Unsent` if
    /// the sample is relevant to the new reader. Returns `false` on duplicate GUID.
    pub fn matched_reader_add(&self, proxy: Arc<ReaderProxy>) -> bool {
        let guid = proxy.reader_guid();
        let mut proxies = self.proxies.write();
        if proxies.contains_key(&guid) {
            return false;
        }
        for change in self.history.snapshot() {
            let relevant = (self.relevance)(&change, guid);
            proxy.add_change(change.sequence_number, relevant);
        }
        proxies.insert(guid, proxy);
        true
    }

    /// Removes the proxy for `guid`; returns whether one was removed.
    pub fn matched_reader_remove(&self, guid: Guid) -> bool {
        self.proxies.write().remove(&guid).is_some()
    }

    #[must_use]
    pub fn matched_reader_lookup(&self, guid: Guid) -> Option<Arc<ReaderProxy>> {
        self.proxies.read().get(&guid).cloned()
    }

    #[must_use]
    pub fn matched_reader_count(&self) -> usize {
        self.proxies.read().len()
    }

    #[must_use]
    pub fn matched_reader_guids(&self) -> Vec<Guid> {
        self.proxies.read().keys().copied().collect()
    }

    /// True iff, for every currently matched reader, the corresponding entry
    /// exists and is `Acknowledged`, or does not exist because the sample was
    /// deemed irrelevant at match time. Never blocks.
    #[must_use]
    pub fn is_acked_by_all(&self, seq: SequenceNumber) -> bool {
        self.proxies
            .read()
            .values()
            .all(|proxy| proxy.is_acknowledged_or_irrelevant(seq))
    }

    /// Appends `payload` to the history cache under a freshly assigned
    /// sequence number, creates `Unsent` entries for every matched reader to
    /// which it is relevant, and notifies the async sender. Returns the
    /// assigned sequence number.
    pub fn unsent_change_add(&self, payload: Vec<u8>) -> SequenceNumber {
        let seq = SequenceNumber(
            self.next_seq
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst),
        );
        let change = CacheChange::new(seq, self.writer_guid, payload);
        let proxies = self.proxies.read();
        for proxy in proxies.values() {
            let relevant = (self.relevance)(&change, proxy.reader_guid());
            proxy.add_change(seq, relevant);
        }
        drop(proxies);
        self.history.insert(change);
        if let Some(sink) = &self.wake_sink {
            sink.wake();
        }
        seq
    }

    /// Polls `is_acked_by_all` until it is true or `timeout` elapses. A thin
    /// convenience built on the non-blocking primitive; callers with their
    /// own wake-up mechanism should prefer `is_acked_by_all` directly.
    pub fn wait_for_acknowledgments(&self, seq: SequenceNumber, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_acked_by_all(seq) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1).min(timeout));
        }
    }

    /// Called by a timed collaborator: submits every matched reader's unsent
    /// entries to the async sender by waking it. No-op if nothing is pending.
    pub fn unsent_changes_not_empty(&self) {
        let has_pending = self
            .proxies
            .read()
            .values()
            .any(|proxy| !proxy.unsent_changes().is_empty());
        if has_pending {
            if let Some(sink) = &self.wake_sink {
                sink.wake();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn writer() -> StatefulWriter {
        StatefulWriter::new(Guid::from_bytes([1; 16]))
    }

    fn reader(id: u8) -> Arc<ReaderProxy> {
        let mut bytes = [0u8; 16];
        bytes[0] = id;
        Arc::new(ReaderProxy::new(
            Guid::from_bytes(bytes),
            None,
            Duration::from_secs(30),
        ))
    }

    // Scenario S1: writer matches reader R1, publishes sequences 1..3, R1 ACKs {1,2}.
    #[test]
    fn scenario_s1_ack_partial_history() {
        let w = writer();
        let r1 = reader(1);
        assert!(w.matched_reader_add(r1.clone()));

        w.unsent_change_add(b"one".to_vec());
        w.unsent_change_add(b"two".to_vec());
        w.unsent_change_add(b"three".to_vec());

        r1.acked_changes_set(SequenceNumber(3));

        assert!(w.is_acked_by_all(SequenceNumber(1)));
        assert!(!w.is_acked_by_all(SequenceNumber(3)));
    }

    #[test]
    fn duplicate_match_is_rejected() {
        let w = writer();
        let r1 = reader(1);
        assert!(w.matched_reader_add(r1.clone()));
        assert!(!w.matched_reader_add(r1));
        assert_eq!(w.matched_reader_count(), 1);
    }

    #[test]
    fn unmatched_reader_is_acked_by_all_trivially() {
        let w = writer();
        w.unsent_change_add(b"x".to_vec());
        assert!(w.is_acked_by_all(SequenceNumber(1)));
    }

    #[test]
    fn irrelevant_sample_counts_as_acked() {
        let w = StatefulWriter::new(Guid::from_bytes([2; 16])).with_relevance(|_c, _r| false);
        let r1 = reader(1);
        w.matched_reader_add(r1.clone());
        let seq = w.unsent_change_add(b"irrelevant".to_vec());
        assert!(r1.change_for_reader_lookup(seq).is_none());
        assert!(w.is_acked_by_all(seq));
    }

    #[test]
    fn existing_history_is_backfilled_on_match() {
        let w = writer();
        w.unsent_change_add(b"pre-existing".to_vec());
        let r1 = reader(1);
        w.matched_reader_add(r1.clone());
        assert!(r1.change_for_reader_lookup(SequenceNumber(1)).is_some());
    }
}
