//! Cooperative cancellation for long-running operations (§5 "Cancellation").
//!
//! Every long operation (fuse-all-tracks, verify, rebuild-bitmap) accepts a [`CancelToken`] and
//! checks it at track boundaries. A tripped token unwinds as [`crate::error::UffErrorKind::Cancelled`]
//! rather than leaving partial state silently half-applied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{kinds, UffError};

/// A cheaply cloneable cancellation handle. Cloning shares the same underlying flag, so any clone
/// can call [`CancelToken::cancel`] to stop every in-flight operation holding another clone.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that can never be cancelled, for call sites that do not need cooperative
    /// cancellation but still want to share code paths that expect a token.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(UffError::Cancelled)` if the token has been tripped. Intended to be called
    /// once per track (or block) iteration inside long operations.
    pub fn check(&self) -> Result<(), UffError> {
        if self.is_cancelled() {
            Err(kinds::cancelled())
        }
        else {
            Ok(())
        }
    }
}
