use std::{
    cmp::{Ordering, Reverse},
    collections::{BTreeMap, BinaryHeap},
};

use crate::models::{DisplayEvent, RowId, TimeSpan};

use super::collector::GapSpan;

/// A union of overlapping gaps across rows, searched with one range query.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedGap {
    pub span: TimeSpan,
    /// Gap events of every row that contributed to the span.
    pub rows: BTreeMap<RowId, Vec<DisplayEvent>>,
}

impl MergedGap {
    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.keys().copied()
    }
}

/// Merged gap spans in time order; spans never overlap each other.
pub type GapTable = Vec<MergedGap>;

struct Queued(GapSpan);

impl Queued {
    fn key(&self) -> (i64, i64, RowId) {
        (self.0.span.start, self.0.span.end, self.0.row)
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Sweeps gaps by `(start, end)` and merges every gap that overlaps the
/// span being built into it, so each merged span is searched only once.
pub fn regroup_overlapping(gaps: Vec<GapSpan>) -> GapTable {
    let mut heap: BinaryHeap<Reverse<Queued>> = gaps.into_iter().map(|gap| Reverse(Queued(gap))).collect();
    let mut table: GapTable = Vec::new();

    while let Some(Reverse(Queued(gap))) = heap.pop() {
        match table.last_mut() {
            Some(current) if current.span.overlaps(&gap.span) => {
                current.span = current.span.union(&gap.span);
                current.rows.entry(gap.row).or_default().extend(gap.events);
            }
            _ => {
                let mut rows = BTreeMap::new();
                rows.insert(gap.row, gap.events);
                table.push(MergedGap { span: gap.span, rows });
            }
        }
    }
    table
}
