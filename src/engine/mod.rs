// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The async send path: wake-up plumbing, a cancellation-safe timer service,
//! and the single cooperative sender worker.

pub mod async_sender;
pub mod scheduler;
pub mod wake;

pub use async_sender::{AsyncSender, RecordingTransport, Transport};
pub use scheduler::{ImmediateScheduler, Scheduler, ThreadScheduler, TimerHandle};
pub use wake::{WakeNotifier, WakeSink};
