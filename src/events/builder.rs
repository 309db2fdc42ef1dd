use std::collections::BTreeSet;

use crate::models::{AttributeId, DisplayEvent, FullState, TimeSpan, Value};

/// The row's state at one sample instant.
///
/// For a row backed by several attributes this is the intersection of their
/// intervals, carrying the first non-null payload. A sample where none of
/// the row's attributes has a state yields a one-tick null state.
#[derive(Debug, Clone, PartialEq)]
struct RowState {
    span: TimeSpan,
    payload: Value,
}

impl RowState {
    fn at(state: &FullState, attributes: &BTreeSet<AttributeId>) -> Self {
        let mut span: Option<TimeSpan> = None;
        let mut payload = Value::Null;
        for interval in attributes.iter().filter_map(|attribute| state.get(*attribute)) {
            span = Some(match span {
                Some(current) => TimeSpan {
                    start: current.start.max(interval.span.start),
                    end: current.end.min(interval.span.end),
                },
                None => interval.span,
            });
            if payload.is_null() && !interval.payload.is_null() {
                payload = interval.payload.clone();
            }
        }
        Self {
            span: span.unwrap_or(TimeSpan {
                start: state.time,
                end: state.time.saturating_add(1),
            }),
            payload,
        }
    }

    fn to_event(&self, span: TimeSpan) -> DisplayEvent {
        match &self.payload {
            Value::Null => DisplayEvent::empty(span),
            payload => DisplayEvent::state(span, payload.clone()),
        }
    }
}

/// Turns one chunk of sampled full states into the row's display events.
///
/// `window` is the sampled window; events cover `[window.start,
/// window.end)` without holes. Between two distinct states that do not
/// touch, an unsampled filler event is inserted. `prev` is the last full
/// state of the previous chunk: it gives the first state of this chunk its
/// context and is never re-emitted. The chunk whose last sample reaches
/// `window.end` closes the list.
///
/// Pure: equal inputs give equal outputs, and the concatenation of the
/// per-chunk outputs equals the output for the unchunked sequence.
pub fn build_events(
    attributes: &BTreeSet<AttributeId>,
    window: TimeSpan,
    snapshots: &[FullState],
    prev: Option<&FullState>,
) -> Vec<DisplayEvent> {
    let mut events = Vec::new();
    if attributes.is_empty() || window.is_empty() {
        return events;
    }

    let mut last = prev.map(|state| RowState::at(state, attributes));
    let mut cursor = match &last {
        Some(state) => state.span.end.clamp(window.start, window.end),
        None => window.start,
    };

    for snapshot in snapshots {
        let state = RowState::at(snapshot, attributes);
        if last.as_ref() == Some(&state) {
            continue;
        }

        let start = state.span.start.max(cursor);
        let end = state.span.end.min(window.end);
        if start < end {
            if cursor < start {
                events.push(DisplayEvent::unsampled(TimeSpan { start: cursor, end: start }));
            }
            events.push(state.to_event(TimeSpan { start, end }));
            cursor = end;
        }
        last = Some(state);
    }

    let reaches_end = snapshots.last().is_some_and(|s| s.time >= window.end);
    if reaches_end && cursor < window.end {
        events.push(DisplayEvent::unsampled(TimeSpan {
            start: cursor,
            end: window.end,
        }));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{is_contiguous_over, EventKind, Interval},
        query::{query_full_states, QueryContext},
        store::{IntervalStore, MemoryStore},
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn attrs(ids: &[u32]) -> BTreeSet<AttributeId> {
        ids.iter().copied().map(AttributeId).collect()
    }

    fn sampled(store: &MemoryStore, start: i64, end: i64, resolution: i64, max: usize) -> Vec<(Vec<FullState>, Option<FullState>)> {
        let mut chunks = Vec::new();
        let ctx = QueryContext {
            max_intervals: max,
            ..QueryContext::default()
        };
        query_full_states(store, start, end, resolution, &ctx, |states, prev| {
            chunks.push((states.to_vec(), prev.cloned()));
        })
        .unwrap();
        chunks
    }

    fn build_all(
        attributes: &BTreeSet<AttributeId>,
        window: TimeSpan,
        chunks: &[(Vec<FullState>, Option<FullState>)],
    ) -> Vec<DisplayEvent> {
        chunks
            .iter()
            .flat_map(|(states, prev)| build_events(attributes, window, states, prev.as_ref()))
            .collect()
    }

    fn random_store(rng: &mut StdRng, attributes: u32, horizon: i64) -> MemoryStore {
        let mut intervals = Vec::new();
        for attr in 0..attributes {
            let mut t = rng.gen_range(0..20);
            while t < horizon {
                let len = rng.gen_range(1..60);
                let value = match rng.gen_range(0..6) {
                    0 => Value::Null,
                    1 => Value::Str("wait".into()),
                    n => Value::Int(n),
                };
                intervals.push(Interval::new(AttributeId(attr), t, t + len, value));
                // Leave holes now and then so some samples find no state.
                t += len + if rng.gen_bool(0.2) { rng.gen_range(1..30) } else { 0 };
            }
        }
        MemoryStore::new(intervals)
    }

    #[test]
    fn two_states_at_coarse_resolution() {
        let store = MemoryStore::new(vec![
            Interval::new(AttributeId(0), 0, 50, Value::Str("A".into())),
            Interval::new(AttributeId(0), 50, 100, Value::Str("B".into())),
        ]);
        let window = TimeSpan::new(0, 100);
        let chunks = sampled(&store, 0, 100, 10, usize::MAX);
        let events = build_all(&attrs(&[0]), window, &chunks);

        assert_eq!(
            events,
            vec![
                DisplayEvent::state(TimeSpan::new(0, 50), Value::Str("A".into())),
                DisplayEvent::state(TimeSpan::new(50, 100), Value::Str("B".into())),
            ]
        );
    }

    #[test]
    fn short_states_between_samples_become_unsampled() {
        let store = MemoryStore::new(vec![
            Interval::new(AttributeId(0), 0, 12, Value::Int(1)),
            Interval::new(AttributeId(0), 12, 14, Value::Int(2)),
            Interval::new(AttributeId(0), 14, 30, Value::Int(3)),
        ]);
        let window = TimeSpan::new(0, 30);
        let events = build_all(&attrs(&[0]), window, &sampled(&store, 0, 30, 10, usize::MAX));

        let kinds: Vec<_> = events.iter().map(|e| (e.span, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (TimeSpan::new(0, 12), EventKind::State),
                (TimeSpan::new(12, 14), EventKind::Unsampled),
                (TimeSpan::new(14, 30), EventKind::State),
            ]
        );
    }

    #[test]
    fn missing_and_null_states_are_empty() {
        let store = MemoryStore::new(vec![
            Interval::new(AttributeId(0), 0, 10, Value::Null),
            Interval::new(AttributeId(0), 20, 40, Value::Int(7)),
        ])
        .with_bounds(0, 40);
        let window = TimeSpan::new(0, 40);
        let events = build_all(&attrs(&[0]), window, &sampled(&store, 0, 40, 5, usize::MAX));

        assert!(is_contiguous_over(&events, &window));
        assert_eq!(events[0], DisplayEvent::empty(TimeSpan::new(0, 10)));
        // Sample at 10 and 15 find nothing: one-tick empty events.
        assert_eq!(events[1], DisplayEvent::empty(TimeSpan::new(10, 11)));
        assert_eq!(events[2].kind, EventKind::Unsampled);
        assert_eq!(events.last().unwrap().payload, Some(Value::Int(7)));
    }

    #[test]
    fn composite_rows_intersect_their_attributes() {
        let store = MemoryStore::new(vec![
            Interval::new(AttributeId(0), 0, 30, Value::Null),
            Interval::new(AttributeId(0), 30, 60, Value::Int(1)),
            Interval::new(AttributeId(1), 0, 20, Value::Str("cpu".into())),
            Interval::new(AttributeId(1), 20, 60, Value::Str("io".into())),
        ]);
        let window = TimeSpan::new(0, 60);
        let events = build_all(&attrs(&[0, 1]), window, &sampled(&store, 0, 60, 1, usize::MAX));

        assert_eq!(
            events,
            vec![
                DisplayEvent::state(TimeSpan::new(0, 20), Value::Str("cpu".into())),
                DisplayEvent::state(TimeSpan::new(20, 30), Value::Str("io".into())),
                DisplayEvent::state(TimeSpan::new(30, 60), Value::Int(1)),
            ]
        );
    }

    #[test]
    fn degenerate_window_has_no_events() {
        let store = MemoryStore::new(vec![Interval::new(AttributeId(0), 0, 10, Value::Int(1))]);
        let chunks = sampled(&store, 5, 5, 1, usize::MAX);
        assert!(build_all(&attrs(&[0]), TimeSpan::new(5, 5), &chunks).is_empty());
    }

    #[test]
    fn events_tile_the_window_for_every_resolution() {
        let mut rng = StdRng::seed_from_u64(42);
        for round in 0..40 {
            let store = random_store(&mut rng, 3, 1_000);
            let start = rng.gen_range(0..200);
            let end = rng.gen_range(start + 1..1_000);
            let resolution = rng.gen_range(1..120);
            let row = attrs(&[round % 3, (round + 1) % 3]);
            let window = TimeSpan::new(start, end);

            let events = build_all(&row, window, &sampled(&store, start, end, resolution, usize::MAX));
            assert!(
                is_contiguous_over(&events, &window),
                "round {round}: [{start}, {end}] r={resolution}: {events:?}"
            );
        }
    }

    #[test]
    fn chunked_and_unchunked_builds_agree() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            let store = random_store(&mut rng, 4, 2_000);
            let end = store.current_end_time();
            let resolution = rng.gen_range(1..50);
            let row = attrs(&[1, 2]);
            let window = TimeSpan::new(0, end);

            let whole = build_all(&row, window, &sampled(&store, 0, end, resolution, usize::MAX));
            let chunks = sampled(&store, 0, end, resolution, 12);
            assert!(chunks.len() > 1);
            assert_eq!(build_all(&row, window, &chunks), whole);
        }
    }

    #[test]
    fn building_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(5);
        let store = random_store(&mut rng, 2, 500);
        let chunks = sampled(&store, 0, 499, 7, 30);
        let window = TimeSpan::new(0, 499);
        assert_eq!(
            build_all(&attrs(&[0]), window, &chunks),
            build_all(&attrs(&[0]), window, &chunks)
        );
    }
}
