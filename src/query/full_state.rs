use crate::{
    error::StoreError,
    models::FullState,
    store::IntervalStore,
};

use super::{sample_times, ChunkBuffer, QueryContext, QueryStatus};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Queries the store's full state at every sample instant of
/// `[start, end]`, one point query per step.
///
/// Returns `EmptyWindow` without touching the store when `end < start`.
/// A store error aborts the walk; chunks already delivered stay delivered.
pub fn query_full_states<F>(
    store: &dyn IntervalStore,
    start: i64,
    end: i64,
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

    let mut buffer = ChunkBuffer::new(ctx.max_intervals, on_chunk);
    for time in sample_times(start, end, resolution) {
        if ctx.is_cancelled() {
            log_debug!("full state query cancelled at {time}");
            return Ok(QueryStatus::Cancelled);
        }
        let intervals = store.point_query(time)?;
        let width = intervals.len();
        buffer.push(FullState::new(time, intervals), width);
    }
    Ok(buffer.finish())
}
