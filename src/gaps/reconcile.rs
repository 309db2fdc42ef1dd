use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    error::StoreError,
    events::{apply_filters, build_events},
    models::{AttributeId, DisplayEvent, FilterSet, RowId},
    query::{query_range_states, QueryContext, QueryStatus},
    store::IntervalStore,
};

use super::regroup::MergedGap;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Re-samples one merged gap at `resolution` and downgrades the flags of
/// every row's gap events from what the finer sampling found inside them.
///
/// `attributes` maps each row to its backing attributes; the range query
/// covers the union over the rows of the merged gap.
pub fn search_merged_gap(
    store: &dyn IntervalStore,
    merged: &mut MergedGap,
    attributes: &HashMap<RowId, BTreeSet<AttributeId>>,
    filters: &FilterSet,
    resolution: i64,
    ctx: &QueryContext,
) -> Result<QueryStatus, StoreError> {
    let window = merged.span;
    let rows: Vec<(RowId, &BTreeSet<AttributeId>)> = merged
        .row_ids()
        .filter_map(|row| attributes.get(&row).map(|attrs| (row, attrs)))
        .collect();
    let union: BTreeSet<AttributeId> = rows.iter().flat_map(|(_, attrs)| attrs.iter().copied()).collect();

    let mut fine: BTreeMap<RowId, Vec<DisplayEvent>> = BTreeMap::new();
    let status = query_range_states(store, window.start, window.end, &union, resolution, ctx, |states, prev| {
        for (row, attrs) in &rows {
            fine.entry(*row)
                .or_default()
                .extend(build_events(attrs, window, states, prev));
        }
    })?;
    if !matches!(status, QueryStatus::Completed { .. }) {
        return Ok(status);
    }

    let mut downgraded = 0;
    for (row, mut events) in fine {
        apply_filters(&mut events, filters);
        if let Some(gap_events) = merged.rows.get_mut(&row) {
            downgraded += reconcile_gap_events(gap_events, &events);
        }
    }
    log_debug!("gap {} at r={resolution}: {downgraded} events revealed", merged.span);
    Ok(status)
}

/// Lowers `dimmed`/`excluded` of each gap event when a finer event inside
/// it is not dimmed/excluded. Flags are never raised.
///
/// `fine` must be sorted and contiguous. Returns how many events changed.
pub fn reconcile_gap_events(gap_events: &mut [DisplayEvent], fine: &[DisplayEvent]) -> usize {
    let mut changed = 0;
    for event in gap_events.iter_mut() {
        let first = fine.partition_point(|f| f.span.end <= event.span.start);
        let inside = fine[first..]
            .iter()
            .take_while(|f| f.span.start < event.span.end);

        let mut any = false;
        let mut all_dimmed = true;
        let mut all_excluded = true;
        for sub in inside {
            any = true;
            all_dimmed &= sub.dimmed;
            all_excluded &= sub.excluded;
        }
        if !any {
            continue;
        }

        let before = (event.dimmed, event.excluded);
        event.dimmed &= all_dimmed;
        event.excluded &= all_excluded;
        if before != (event.dimmed, event.excluded) {
            changed += 1;
        }
    }
    changed
}

/// Copies the flags of resolved gap events onto the row's event list,
/// matching events by span.
pub fn write_back(row_events: &mut [DisplayEvent], resolved: &[DisplayEvent]) {
    for event in resolved {
        if let Ok(idx) = row_events.binary_search_by_key(&event.span.start, |e| e.span.start) {
            let target = &mut row_events[idx];
            if target.span == event.span {
                target.dimmed = event.dimmed;
                target.excluded = event.excluded;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gaps::{collect_gaps, regroup_overlapping},
        models::{FilterAction, Interval, TimeSpan, Value, ValueMatcher},
        store::MemoryStore,
    };

    fn hidden(span: TimeSpan) -> DisplayEvent {
        let mut event = DisplayEvent::unsampled(span);
        event.dimmed = true;
        event.excluded = true;
        event
    }

    fn flagged(start: i64, end: i64, dimmed: bool, excluded: bool) -> DisplayEvent {
        let mut event = DisplayEvent::state(TimeSpan::new(start, end), Value::Int(0));
        event.dimmed = dimmed;
        event.excluded = excluded;
        event
    }

    #[test]
    fn any_visible_sub_event_reveals_the_gap() {
        let mut gap = vec![hidden(TimeSpan::new(10, 20))];
        let fine = vec![
            flagged(0, 12, false, false),
            flagged(12, 15, true, true),
            flagged(15, 20, true, false),
        ];
        assert_eq!(reconcile_gap_events(&mut gap, &fine), 1);
        assert!(!gap[0].dimmed);
        assert!(!gap[0].excluded);
    }

    #[test]
    fn flags_are_never_raised() {
        let mut gap = vec![flagged(10, 20, false, false)];
        let fine = vec![flagged(10, 20, true, true)];
        assert_eq!(reconcile_gap_events(&mut gap, &fine), 0);
        assert!(!gap[0].dimmed && !gap[0].excluded);
    }

    #[test]
    fn gap_without_fine_events_keeps_its_flags() {
        let mut gap = vec![hidden(TimeSpan::new(50, 60))];
        let fine = vec![flagged(0, 50, false, false)];
        assert_eq!(reconcile_gap_events(&mut gap, &fine), 0);
        assert!(gap[0].dimmed && gap[0].excluded);
    }

    #[test]
    fn write_back_matches_by_span() {
        let mut row = vec![
            flagged(0, 10, false, false),
            hidden(TimeSpan::new(10, 20)),
            flagged(20, 30, false, false),
        ];
        let mut resolved = hidden(TimeSpan::new(10, 20));
        resolved.excluded = false;
        write_back(&mut row, &[resolved, hidden(TimeSpan::new(10, 15))]);

        assert!(row[1].dimmed);
        assert!(!row[1].excluded);
    }

    #[test]
    fn finer_search_finds_the_matching_state() {
        let store = MemoryStore::new(vec![
            Interval::new(AttributeId(0), 0, 12, Value::Str("idle".into())),
            Interval::new(AttributeId(0), 12, 14, Value::Str("irq".into())),
            Interval::new(AttributeId(0), 14, 30, Value::Str("idle".into())),
            Interval::new(AttributeId(1), 0, 30, Value::Str("idle".into())),
        ]);
        let filters = FilterSet::new(
            vec![ValueMatcher::Equals {
                value: Value::Str("irq".into()),
            }],
            FilterAction::Exclude,
        );
        let gap = collect_gaps(RowId(0), &[hidden(TimeSpan::new(12, 14))]);
        let mut table = regroup_overlapping(gap);
        let attributes: HashMap<RowId, BTreeSet<AttributeId>> =
            [(RowId(0), [AttributeId(0)].into_iter().collect())].into_iter().collect();

        let status =
            search_merged_gap(&store, &mut table[0], &attributes, &filters, 1, &QueryContext::default()).unwrap();

        assert_eq!(status, QueryStatus::Completed { chunks: 1 });
        let resolved = &table[0].rows[&RowId(0)][0];
        assert!(!resolved.dimmed);
        assert!(!resolved.excluded);
        assert_eq!(store.range_query_count(), 1);
    }

    #[test]
    fn cancelled_search_leaves_the_gap_alone() {
        let store = MemoryStore::new(vec![Interval::new(AttributeId(0), 0, 30, Value::Int(1))]);
        let mut table = regroup_overlapping(collect_gaps(RowId(0), &[hidden(TimeSpan::new(5, 9))]));
        let attributes: HashMap<RowId, BTreeSet<AttributeId>> =
            [(RowId(0), [AttributeId(0)].into_iter().collect())].into_iter().collect();
        let ctx = QueryContext::default();
        ctx.cancel.cancel();

        let status = search_merged_gap(&store, &mut table[0], &attributes, &FilterSet::none(), 1, &ctx).unwrap();
        assert_eq!(status, QueryStatus::Cancelled);
        assert!(table[0].rows[&RowId(0)][0].dimmed);
    }
}
