//! # Correlation Id Allocator
//!
//! Wait-free, strictly increasing id source shared by every thread that starts
//! operations. One allocator per operation kind; ids are never reused within
//! an allocator's lifetime.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::constants::MAX_SAFE_TOKEN;

use super::CorrelationId;

/// Monotonic correlation id allocator
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicI64,
    base: CorrelationId,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl IdAllocator {
    /// Create an allocator whose first id is `base`
    pub fn new(base: CorrelationId) -> Self {
        Self {
            next: AtomicI64::new(base),
            base,
        }
    }

    /// Allocate the next id.
    ///
    /// Every caller observes a distinct value. Past [`MAX_SAFE_TOKEN`] the ids
    /// no longer round-trip through the engine's number type; façades use
    /// [`IdAllocator::try_next`] to stop there.
    pub fn next(&self) -> CorrelationId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate the next id, or `None` once the safe range is exhausted
    pub fn try_next(&self) -> Option<CorrelationId> {
        let id = self.next();
        (0..=MAX_SAFE_TOKEN).contains(&id).then_some(id)
    }

    /// The id the next call to [`IdAllocator::next`] will return
    pub fn peek(&self) -> CorrelationId {
        self.next.load(Ordering::Relaxed)
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u64 {
        (self.peek() - self.base) as u64
    }
}
