// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the alignment engine.
//!
//! The core does not retry and does not log. Every recoverable condition is
//! either a field on the output (`sectionDetected = false`, an empty anchor
//! list) or one of the typed failures below. Collaborators decide whether to
//! log, retry, or fall back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Failures surfaced by the alignment engine.
#[derive(Debug, Error)]
pub enum AlignError {
    /// A required artifact is not available for the requested operation.
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    /// An artifact parses but violates an invariant.
    #[error("invalid artifact {artifact}: {detail}")]
    InvalidArtifact {
        artifact: &'static str,
        detail: String,
    },

    /// A stored transcript was produced under different normalization rules.
    #[error("incompatible normalization: transcript has {found:?}, reader requires {required:?}")]
    IncompatibleNormalization { found: String, required: String },

    /// Cooperative cancellation was signaled.
    #[error("cancelled")]
    Cancelled,

    /// The pronunciation provider failed; surfaced unchanged, never retried here.
    #[error("pronunciation lookup failed: {0}")]
    PronunciationLookupFailed(String),

    /// Invariant violation inside the engine. Indicates a bug.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

/// Cooperative cancellation signal.
///
/// Cloned handles share one flag. Long-running steps (anchor discovery,
/// per-window DP, hydration, refinement) call [`CancelToken::check`] at each
/// window or sentence boundary and abandon partial output on cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Error out if cancellation has been signaled.
    pub fn check(&self) -> Result<(), AlignError> {
        if self.is_cancelled() {
            Err(AlignError::Cancelled)
        } else {
            Ok(())
        }
    }
}
