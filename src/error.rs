// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error types.
//!
//! A flat enum with a hand-written `Display` impl rather than an
//! error-derive crate: every public operation that can fail returns a
//! `Result<T, Error>` (or, in the crypto transform, a dedicated
//! `SecurityError`), never panics on caller-reachable input.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A crypto handle (writer, reader, or participant key material) could not be resolved.
    InvalidHandle(String),
    /// A wire frame was truncated or internally inconsistent.
    Malformed(String),
    /// A GCM tag or receiver-specific MAC failed to verify.
    AuthenticationFailed(String),
    /// A bounded resource (history cache quota, reader-proxy set) is exhausted.
    ResourceExhausted(String),
    /// A submessage-level operation this crate does not yet implement.
    NotImplemented(&'static str),
    /// Any other internal invariant violation.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle(msg) => write!(f, "invalid handle: {}", msg),
            Error::Malformed(msg) => write!(f, "malformed frame: {}", msg),
            Error::AuthenticationFailed(msg) => write!(f, "authentication failed: {}", msg),
            Error::ResourceExhausted(msg) => write!(f, "resource exhausted: {}", msg),
            Error::NotImplemented(what) => write!(f, "not implemented: {}", what),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
