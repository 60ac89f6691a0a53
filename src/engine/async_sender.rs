// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single cooperative worker that drains each writer's admitted batch to the transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::congestion::ThroughputController;
use crate::reliability::{ChangeForReaderStatus, StatefulWriter};

use super::wake::WakeNotifier;

/// External collaborator: datagram I/O is out of scope for this crate, so
/// the sender depends on this trait rather than owning a socket.
pub trait Transport: Send + Sync {
    fn send(&self, locators: &[SocketAddr], bytes: &[u8]) -> std::io::Result<()>;
}

/// Records every send it is asked to perform. Used by tests in place of a
/// real UDP transport.
#[derive(Default)]
pub struct RecordingTransport {
    sent: parking_lot::Mutex<Vec<(Vec<SocketAddr>, Vec<u8>)>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<(Vec<SocketAddr>, Vec<u8>)> {
        self.sent.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, locators: &[SocketAddr], bytes: &[u8]) -> std::io::Result<()> {
        self.sent.lock().push((locators.to_vec(), bytes.to_vec()));
        Ok(())
    }
}

/// One entry registered with the sender: a writer plus the throughput
/// controller gating its outbound batches.
struct RegisteredWriter {
    writer: Arc<StatefulWriter>,
    controller: Arc<ThroughputController>,
}

/// Drains every registered writer's unsent work on each wake, admits it
/// through that writer's throughput controller, hands the admitted bytes to
/// the transport, and advances `ChangeForReader` state to `Underway` once a
/// sample is fully emitted. A fragmented sample only partially admitted this
/// period has its remaining `Present` flags written back to the history
/// cache and is left `Unsent`/`Requested` so the next drain resumes it.
///
/// Single-threaded by construction: `run_once` fully completes one pass over
/// every writer before returning, and never blocks on one writer's transport
/// send for longer than that one call.
pub struct AsyncSender {
    wake: Arc<WakeNotifier>,
    transport: Arc<dyn Transport>,
    writers: parking_lot::Mutex<Vec<RegisteredWriter>>,
}

impl AsyncSender {
    #[must_use]
    pub fn new(wake: Arc<WakeNotifier>, transport: Arc<dyn Transport>) -> Self {
        Self {
            wake,
            transport,
            writers: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, writer: Arc<StatefulWriter>, controller: Arc<ThroughputController>) {
        self.writers.lock().push(RegisteredWriter { writer, controller });
    }

    /// Blocks until woken or `timeout` elapses, then drains all registered
    /// writers. Returns the number of samples handed to the transport.
    pub fn run_once(&self, timeout: Duration) -> usize {
        self.wake.wait_timeout(timeout);
        self.drain()
    }

    /// Drains every registered writer's unsent batch without waiting.
    pub fn drain(&self) -> usize {
        let mut sent_count = 0;
        for entry in self.writers.lock().iter() {
            sent_count += self.drain_writer(entry);
        }
        sent_count
    }

    fn drain_writer(&self, entry: &RegisteredWriter) -> usize {
        let writer = &entry.writer;
        let mut sent_count = 0;

        for reader_guid in writer.matched_reader_guids() {
            let Some(proxy) = writer.matched_reader_lookup(reader_guid) else {
                continue;
            };
            let mut pending = Vec::new();
            for cfr in proxy.unsent_changes().into_iter().chain(proxy.requested_changes()) {
                if let Some(change) = writer.history().get(cfr.sequence_number) {
                    pending.push(change);
                }
            }
            if pending.is_empty() {
                continue;
            }

            let admitted = entry.controller.admit(&mut pending);
            if admitted == 0 {
                continue;
            }

            // Persist the fragment-presence flags `admit` just mutated on
            // these clones. Without this, a partially admitted fragmented
            // sample's "emit k now, retry the rest next period" state is
            // discarded the moment `pending` drops.
            for change in &pending {
                if let Some(desc) = &change.fragments {
                    writer.history().update_fragments(change.sequence_number, desc.clone());
                }
            }

            if let Some(locator) = proxy.unicast_addr() {
                for change in &pending {
                    match self.transport.send(&[locator], &change.payload) {
                        Ok(()) => {
                            // Only retire the `ChangeForReader` once every
                            // fragment has actually gone out. A change left
                            // with fragments still `Present` stays `Unsent`
                            // or `Requested` so it is re-selected on the
                            // next drain instead of getting stuck forever.
                            let fully_sent = match &change.fragments {
                                Some(desc) => desc.fully_emitted(),
                                None => true,
                            };
                            if fully_sent {
                                proxy.mark_underway(change.sequence_number);
                            }
                            sent_count += 1;
                        }
                        Err(err) => {
                            log::error!(
                                "[AsyncSender] transport send failed for writer {}: {}",
                                writer.writer_guid(),
                                err
                            );
                        }
                    }
                }
            }
        }
        sent_count
    }
}
