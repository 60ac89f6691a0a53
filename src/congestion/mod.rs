// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound bandwidth admission control.
//!
//! A much narrower surface than a full congestion-control stack: a single
//! token-bucket-style admission functor plus cancellation-safe refill
//! scheduling, without AIMD rate control, ECN signalling, or a repair queue.

mod throughput_controller;

pub use throughput_controller::{ThroughputController, ThroughputControllerConfig};
