// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # rtps-reliable-core
//!
//! Reliable stateful-writer bookkeeping, throughput-gated async delivery,
//! and an AES-GCM authenticated transform for an RTPS middleware core.
//!
//! ## Modules Overview
//!
//! - [`reliability`] - history cache, reader proxies, the stateful writer
//! - [`congestion`] - throughput-controller admission and refresh scheduling
//! - [`engine`] - wake-up plumbing, timer service, the async sender
//! - [`security`] - AES-GCM session keys, AEAD, and wire framing
//!
//! Discovery, datagram I/O, and application-type serialization are external
//! collaborators; this crate only consumes their interfaces (a `Transport`
//! trait for sends, already-agreed key material for the transform).

/// Congestion control (throughput-gated admission for outbound batches).
pub mod congestion;
/// The async send path: wake plumbing, a cancellation-safe timer, the sender.
pub mod engine;
/// Crate-wide error taxonomy.
pub mod error;
/// Reliable writer bookkeeping: history cache, reader proxy, stateful writer.
pub mod reliability;
/// AES-GCM authenticated transform: session keys, AEAD, wire framing.
#[cfg(feature = "security")]
pub mod security;
/// Core identifiers shared across every module (`Guid`, `SequenceNumber`).
pub mod types;

pub use error::{Error, Result};
pub use types::{Guid, SequenceNumber};

pub use congestion::{ThroughputController, ThroughputControllerConfig};
pub use engine::{AsyncSender, Scheduler, Transport, WakeNotifier};
pub use reliability::{CacheChange, ChangeForReader, HistoryCache, ReaderProxy, StatefulWriter};

#[cfg(feature = "security")]
pub use security::{CryptoTransform, SecurityError, SecurityTransformConfig};
