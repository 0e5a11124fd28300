//! Key-based pagination
//!
//! Opportunities carry an auto-increment id, so pages are addressed by the
//! last id seen rather than by offset.

use serde::{Deserialize, Serialize};

/// Maximum items per page
const MAX_LIMIT: u32 = 100;

/// Default items per page
const DEFAULT_LIMIT: u32 = 20;

/// Position in an id-ordered listing
///
/// Built through [`Cursor::new`] or [`Default`], so the limit is always in
/// bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    after: i64,
    limit: u32,
}

impl Cursor {
    /// Create a cursor; `after` is clamped to 0 and `limit` to 1..=100.
    pub fn new(after: i64, limit: u32) -> Self {
        Self {
            after: after.max(0),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Only rows with an id strictly greater than this are returned.
    pub fn after(&self) -> i64 {
        self.after
    }

    /// Items per page, always within 1..=100.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Cursor for the page following `page`.
    pub fn next<T>(&self, page: &Page<T>) -> Self {
        Self::new(page.last_id, self.limit)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            after: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus the highest id it contained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub last_id: i64,
}
