//! The interval-indexed state store consumed by the zoom engine.

pub mod memory;
pub mod sqlite;

use std::collections::BTreeSet;

use crate::{
    error::StoreError,
    models::{AttributeId, Interval},
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Read-only view of a state store. Implementations must tolerate
/// concurrent reads from several computation threads.
pub trait IntervalStore: Send + Sync {
    /// First timestamp covered by the store.
    fn start_time(&self) -> i64;

    /// Last timestamp the store can currently answer for.
    fn current_end_time(&self) -> i64;

    /// Every attribute's interval covering `time`. Attributes with no state
    /// at `time` may be omitted.
    fn point_query(&self, time: i64) -> Result<Vec<Interval>, StoreError>;

    /// All intervals of `attributes` overlapping `[start, end]`, in no
    /// particular order.
    fn range_query(
        &self,
        attributes: &BTreeSet<AttributeId>,
        start: i64,
        end: i64,
    ) -> Result<Vec<Interval>, StoreError>;
}

/// Overlap test between a stored half-open interval and an inclusive query range.
pub(crate) fn overlaps_range(interval: &Interval, start: i64, end: i64) -> bool {
    interval.span.start <= end && interval.span.end > start
}
