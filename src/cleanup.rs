//! Cleanup stack
//!
//! Actions run last-registered-first. The stack is drained by popping one
//! entry at a time rather than iterating a snapshot, so an action that
//! registers further cleanups has them executed before draining finishes.

use std::sync::Arc;

use crate::stack::Frames;
use crate::tb::CleanupFn;

/// A registered cleanup and the stack captured when it was registered.
pub struct CleanupAction {
    pub action: CleanupFn,
    pub frames: Arc<Frames>,
}

impl std::fmt::Debug for CleanupAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupAction")
            .field("frames", &self.frames.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct CleanupStack {
    actions: Vec<CleanupAction>,
}

impl CleanupStack {
    pub fn push(&mut self, action: CleanupFn, frames: Frames) {
        self.actions.push(CleanupAction {
            action,
            frames: Arc::new(frames),
        });
    }

    /// Take the most recently registered action.
    pub fn pop(&mut self) -> Option<CleanupAction> {
        self.actions.pop()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
