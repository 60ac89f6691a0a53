// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured crypto failure kinds, mirroring the crate-wide [`crate::error::Error`]
//! taxonomy but scoped to what the transform itself can produce.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityErrorKind {
    InvalidHandle,
    Malformed,
    AuthenticationFailed,
    NotImplemented,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityError {
    pub kind: SecurityErrorKind,
    pub message: String,
}

impl SecurityError {
    #[must_use]
    pub fn new(kind: SecurityErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Self::new(SecurityErrorKind::InvalidHandle, message)
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SecurityErrorKind::Malformed, message)
    }

    #[must_use]
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::new(SecurityErrorKind::AuthenticationFailed, message)
    }

    #[must_use]
    pub fn not_implemented(what: &'static str) -> Self {
        Self::new(SecurityErrorKind::NotImplemented, what)
    }
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SecurityErrorKind::InvalidHandle => write!(f, "invalid handle: {}", self.message),
            SecurityErrorKind::Malformed => write!(f, "malformed frame: {}", self.message),
            SecurityErrorKind::AuthenticationFailed => {
                write!(f, "authentication failed: {}", self.message)
            }
            SecurityErrorKind::NotImplemented => write!(f, "not implemented: {}", self.message),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<SecurityError> for crate::error::Error {
    fn from(e: SecurityError) -> Self {
        match e.kind {
            SecurityErrorKind::InvalidHandle => crate::error::Error::InvalidHandle(e.message),
            SecurityErrorKind::Malformed => crate::error::Error::Malformed(e.message),
            SecurityErrorKind::AuthenticationFailed => {
                crate::error::Error::AuthenticationFailed(e.message)
            }
            SecurityErrorKind::NotImplemented => crate::error::Error::NotImplemented("submessage"),
        }
    }
}
