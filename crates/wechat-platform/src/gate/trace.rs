//! Trace identifier allocation for the pending-call table.

use std::collections::BTreeMap;

/// Largest integer the platform's JSON clients represent exactly (2^53 - 1).
pub const MAX_TRACE_ID: u64 = (1 << 53) - 1;

/// Key of a pending call.
pub type TraceId = u64;

/// Wrapping counter that never hands out an identifier still in use.
///
/// Identifiers start at 1 and wrap back to 1 once `limit` has been issued.
#[derive(Debug, Clone)]
pub struct TraceIdAllocator {
    last: TraceId,
    limit: TraceId,
}

impl TraceIdAllocator {
    pub fn new() -> Self {
        Self::with_limit(MAX_TRACE_ID)
    }

    /// Allocator wrapping at `limit` (clamped to at least 1).
    pub fn with_limit(limit: TraceId) -> Self {
        Self {
            last: 0,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> TraceId {
        self.limit
    }

    fn step(&self, id: TraceId) -> TraceId {
        if id >= self.limit { 1 } else { id + 1 }
    }

    /// Next identifier not present in `live`, or `None` when all are taken.
    pub fn allocate<V>(&mut self, live: &BTreeMap<TraceId, V>) -> Option<TraceId> {
        if live.len() as u64 >= self.limit {
            return None;
        }
        let mut candidate = self.step(self.last);
        while live.contains_key(&candidate) {
            candidate = self.step(candidate);
        }
        self.last = candidate;
        Some(candidate)
    }
}

impl Default for TraceIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
