use std::{
    collections::{BTreeMap, BTreeSet},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::{
    error::StoreError,
    models::{AttributeId, Interval},
};

use super::{overlaps_range, IntervalStore};

/// An interval store held entirely in memory, sorted per attribute.
#[derive(Debug, Default)]
pub struct MemoryStore {
    attributes: BTreeMap<AttributeId, Vec<Interval>>,
    start: i64,
    end: i64,
    disposed: AtomicBool,
    point_queries: AtomicUsize,
    range_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new(intervals: impl IntoIterator<Item = Interval>) -> Self {
        let mut attributes: BTreeMap<AttributeId, Vec<Interval>> = BTreeMap::new();
        for interval in intervals {
            attributes.entry(interval.attribute).or_default().push(interval);
        }
        for list in attributes.values_mut() {
            list.sort_by_key(|interval| (interval.span.start, interval.span.end));
        }

        let start = attributes
            .values()
            .filter_map(|list| list.first())
            .map(|interval| interval.span.start)
            .min()
            .unwrap_or(0);
        let end = attributes
            .values()
            .filter_map(|list| list.iter().map(|interval| interval.span.end).max())
            .max()
            .unwrap_or(-1);

        Self {
            attributes,
            start,
            end,
            ..Default::default()
        }
    }

    /// Overrides the reported time range, e.g. to model a trace still being read.
    pub fn with_bounds(mut self, start: i64, end: i64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Every later query fails with [`StoreError::Disposed`].
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn point_query_count(&self) -> usize {
        self.point_queries.load(Ordering::SeqCst)
    }

    pub fn range_query_count(&self) -> usize {
        self.range_queries.load(Ordering::SeqCst)
    }

    fn check_alive(&self) -> Result<(), StoreError> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(StoreError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl IntervalStore for MemoryStore {
    fn start_time(&self) -> i64 {
        self.start
    }

    fn current_end_time(&self) -> i64 {
        self.end
    }

    fn point_query(&self, time: i64) -> Result<Vec<Interval>, StoreError> {
        self.check_alive()?;
        self.point_queries.fetch_add(1, Ordering::SeqCst);

        let mut state = Vec::with_capacity(self.attributes.len());
        for list in self.attributes.values() {
            let idx = list.partition_point(|interval| interval.span.start <= time);
            if idx == 0 {
                continue;
            }
            let candidate = &list[idx - 1];
            if candidate.covers(time) {
                state.push(candidate.clone());
            }
        }
        Ok(state)
    }

    fn range_query(
        &self,
        attributes: &BTreeSet<AttributeId>,
        start: i64,
        end: i64,
    ) -> Result<Vec<Interval>, StoreError> {
        self.check_alive()?;
        self.range_queries.fetch_add(1, Ordering::SeqCst);

        let mut found = Vec::new();
        for attribute in attributes {
            let Some(list) = self.attributes.get(attribute) else {
                continue;
            };
            let first = list.partition_point(|interval| interval.span.end <= start);
            found.extend(
                list[first..]
                    .iter()
                    .take_while(|interval| interval.span.start <= end)
                    .filter(|interval| overlaps_range(interval, start, end))
                    .cloned(),
            );
        }
        // Callers may not rely on ordering; hand back the newest first.
        found.reverse();
        Ok(found)
    }
}
