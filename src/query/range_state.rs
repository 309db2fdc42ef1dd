use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::StoreError,
    models::{AttributeId, FullState, Interval},
    store::IntervalStore,
};

use super::{sample_times, ChunkBuffer, QueryContext, QueryStatus};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Same stepped full states as [`query_full_states`], restricted to
/// `attributes`, from a single bulk range query.
///
/// Intervals are sorted per attribute by `(start, end)` and each attribute
/// keeps a cursor that only moves forward as the sample time advances.
///
/// [`query_full_states`]: super::query_full_states
pub fn query_range_states<F>(
    store: &dyn IntervalStore,
    start: i64,
    end: i64,
    attributes: &BTreeSet<AttributeId>,
    resolution: i64,
    ctx: &QueryContext,
    on_chunk: F,
) -> Result<QueryStatus, StoreError>
where
    F: FnMut(&[FullState], Option<&FullState>),
{
    if end < start {
        return Ok(QueryStatus::EmptyWindow);
    }
    if ctx.is_cancelled() {
        return Ok(QueryStatus::Cancelled);
    }

    let mut per_attribute: BTreeMap<AttributeId, Vec<Interval>> = attributes
        .iter()
        .map(|attribute| (*attribute, Vec::new()))
        .collect();
    for interval in store.range_query(attributes, start, end)? {
        if let Some(list) = per_attribute.get_mut(&interval.attribute) {
            list.push(interval);
        }
    }
    for list in per_attribute.values_mut() {
        list.sort_by_key(|interval| (interval.span.start, interval.span.end));
        list.dedup();
    }
    log_debug!(
        "range query [{start}, {end}] returned {} intervals over {} attributes",
        per_attribute.values().map(Vec::len).sum::<usize>(),
        per_attribute.len()
    );

    let width = per_attribute.len();
    let mut cursors = vec![0usize; width];
    let mut buffer = ChunkBuffer::new(ctx.max_intervals, on_chunk);
    for time in sample_times(start, end, resolution) {
        if ctx.is_cancelled() {
            log_debug!("range state query cancelled at {time}");
            return Ok(QueryStatus::Cancelled);
        }
        let mut state = Vec::with_capacity(width);
        for (list, cursor) in per_attribute.values().zip(cursors.iter_mut()) {
            while *cursor < list.len() && list[*cursor].span.end <= time {
                *cursor += 1;
            }
            if let Some(interval) = list.get(*cursor).filter(|interval| interval.covers(time)) {
                state.push(interval.clone());
            }
        }
        buffer.push(FullState::new(time, state), width);
    }
    Ok(buffer.finish())
}
