//! Chronological, chunked, cancellable state queries over an [`IntervalStore`].
//!
//! Both queries walk `start, start + resolution, ...` up to and including
//! `end` (the last step is clamped to `end`) and hand the resulting full
//! states to a chunk handler. A chunk is flushed whenever the number of
//! buffered interval cells passes the configured ceiling; every chunk after
//! the first receives the last full state of the previous one as context.
//!
//! [`IntervalStore`]: crate::store::IntervalStore

mod full_state;
mod range_state;

use tokio_util::sync::CancellationToken;

use crate::{config::MAX_INTERVALS, models::FullState};

pub use full_state::query_full_states;
pub use range_state::query_range_states;

/// How a state query ended when the store itself did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Completed { chunks: usize },
    Cancelled,
    /// `end < start`: nothing was queried.
    EmptyWindow,
}

/// Per-computation settings shared by both queries.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub cancel: CancellationToken,
    pub max_intervals: usize,
}

impl QueryContext {
    pub fn new(cancel: CancellationToken, max_intervals: usize) -> Self {
        Self {
            cancel,
            max_intervals,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new(CancellationToken::new(), MAX_INTERVALS)
    }
}

/// Sample instants of a window: every `resolution` from `start`, then `end`.
pub fn sample_times(start: i64, end: i64, resolution: i64) -> impl Iterator<Item = i64> {
    let resolution = resolution.max(1);
    let mut next = (end >= start).then_some(start);
    std::iter::from_fn(move || {
        let time = next?;
        next = (time < end).then(|| end.min(time.saturating_add(resolution)));
        Some(time)
    })
}

/// Buffers full states and flushes them to the chunk handler.
struct ChunkBuffer<F> {
    max_intervals: usize,
    states: Vec<FullState>,
    prev: Option<FullState>,
    chunks: usize,
    on_chunk: F,
}

impl<F> ChunkBuffer<F>
where
    F: FnMut(&[FullState], Option<&FullState>),
{
    fn new(max_intervals: usize, on_chunk: F) -> Self {
        Self {
            max_intervals,
            states: Vec::new(),
            prev: None,
            chunks: 0,
            on_chunk,
        }
    }

    fn push(&mut self, state: FullState, width: usize) {
        self.states.push(state);
        if self.states.len() * width.max(1) > self.max_intervals {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.states.is_empty() {
            return;
        }
        (self.on_chunk)(&self.states, self.prev.as_ref());
        self.chunks += 1;
        self.prev = self.states.pop();
        self.states.clear();
    }

    fn finish(mut self) -> QueryStatus {
        self.flush();
        QueryStatus::Completed {
            chunks: self.chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_times_clamp_the_last_step() {
        let times: Vec<_> = sample_times(0, 25, 10).collect();
        assert_eq!(times, vec![0, 10, 20, 25]);
        let exact: Vec<_> = sample_times(0, 20, 10).collect();
        assert_eq!(exact, vec![0, 10, 20]);
    }

    #[test]
    fn sample_times_of_degenerate_windows() {
        assert_eq!(sample_times(5, 5, 10).collect::<Vec<_>>(), vec![5]);
        assert_eq!(sample_times(100, 50, 10).count(), 0);
        assert_eq!(sample_times(0, 3, 0).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn buffer_carries_the_previous_chunk_tail() {
        let mut seen: Vec<(Vec<i64>, Option<i64>)> = Vec::new();
        let mut buffer = ChunkBuffer::new(4, |states: &[FullState], prev: Option<&FullState>| {
            seen.push((states.iter().map(|s| s.time).collect(), prev.map(|p| p.time)));
        });
        for t in 0..7 {
            buffer.push(FullState::new(t, Vec::new()), 2);
        }
        assert_eq!(buffer.finish(), QueryStatus::Completed { chunks: 3 });
        assert_eq!(
            seen,
            vec![
                (vec![0, 1, 2], None),
                (vec![3, 4, 5], Some(2)),
                (vec![6], Some(5)),
            ]
        );
    }
}
