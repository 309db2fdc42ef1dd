use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use tokio_util::sync::CancellationToken;

use crate::{
    error::StoreError,
    events::{apply_filters, build_events},
    gaps::{collect_gaps, regroup_overlapping, search_merged_gap, write_back},
    models::{AttributeId, DisplayEvent, RowId, SamplingKey, StoreId, TimeSpan},
    query::{query_full_states, QueryContext, QueryStatus},
    registry::{RegistrySnapshot, RowView, StoreGroup},
    utils::ScopeTimer,
};

use super::{
    annotations::{AnnotationProvider, StoreAnnotations, ViewMarker},
    viewport::Viewport,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// One generation's computation, detached from the controller.
pub struct ZoomTask {
    pub generation: u64,
    pub requested: Viewport,
    pub resolution: i64,
    pub cancel: CancellationToken,
    pub(super) snapshot: RegistrySnapshot,
    pub(super) max_intervals: usize,
    pub(super) gap_resolution: i64,
    pub(super) annotations: Option<Arc<dyn AnnotationProvider>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub row: RowId,
    pub key: SamplingKey,
    pub events: Vec<DisplayEvent>,
    /// Merged gap spans the row was searched in.
    pub gaps: Vec<TimeSpan>,
}

#[derive(Debug)]
pub enum ZoomOutcome {
    Completed {
        key: SamplingKey,
        rows: Vec<RowUpdate>,
        /// One entry per store sampled (or found empty) by this computation.
        annotations: Vec<StoreAnnotations>,
        trace_markers: Vec<ViewMarker>,
        /// Stores that failed; their rows are left out of `rows`.
        failures: Vec<(StoreId, StoreError)>,
    },
    Cancelled,
}

#[derive(Debug)]
pub struct ZoomResult {
    pub generation: u64,
    pub outcome: ZoomOutcome,
}

struct SampledGroup {
    rows: Vec<RowUpdate>,
    annotations: StoreAnnotations,
}

impl ZoomTask {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs the whole computation on the calling thread. Store queries block.
    pub fn compute(self) -> ZoomResult {
        let ctx = QueryContext::new(self.cancel.clone(), self.max_intervals);
        let outcome = self.run(&ctx);
        if matches!(outcome, ZoomOutcome::Cancelled) {
            log_debug!("zoom generation {} cancelled", self.generation);
        }
        ZoomResult {
            generation: self.generation,
            outcome,
        }
    }

    fn run(&self, ctx: &QueryContext) -> ZoomOutcome {
        let key = SamplingKey::new(
            self.requested.start,
            self.requested.end,
            self.resolution,
            &self.requested.filters,
        );

        let mut rows = Vec::new();
        let mut annotations = Vec::new();
        let mut failures = Vec::new();
        for group in &self.snapshot.groups {
            if ctx.is_cancelled() {
                return ZoomOutcome::Cancelled;
            }
            let Some(window) = self.clamp_window(group) else {
                log_debug!(
                    "store {:?} has nothing in [{}, {}]",
                    group.store_id,
                    self.requested.start,
                    self.requested.end
                );
                annotations.push(StoreAnnotations::for_store(group.store_id));
                continue;
            };
            let stale: Vec<&RowView> = group
                .rows
                .iter()
                .filter(|row| !row.attributes.is_empty() && row.needs_resample(&key))
                .collect();
            if stale.is_empty() {
                continue;
            }

            match self.sample_group(group, &stale, window, key, ctx) {
                Ok(Some(sampled)) => {
                    rows.extend(sampled.rows);
                    annotations.push(sampled.annotations);
                }
                Ok(None) => return ZoomOutcome::Cancelled,
                Err(err) => {
                    log_warn!(
                        "store {:?} failed in zoom generation {}, its rows stay stale: {err}",
                        group.store_id,
                        self.generation
                    );
                    failures.push((group.store_id, err));
                }
            }
        }

        if ctx.is_cancelled() {
            return ZoomOutcome::Cancelled;
        }
        let trace_markers = match &self.annotations {
            Some(provider) => provider.trace_markers(
                TimeSpan {
                    start: self.requested.start,
                    end: self.requested.end,
                },
                self.resolution,
            ),
            None => Vec::new(),
        };
        ZoomOutcome::Completed {
            key,
            rows,
            annotations,
            trace_markers,
            failures,
        }
    }

    /// The requested window intersected with what the store can answer.
    fn clamp_window(&self, group: &StoreGroup) -> Option<TimeSpan> {
        let start = self.requested.start.max(group.store.start_time());
        let end = self.requested.end.min(group.store.current_end_time());
        (start <= end).then_some(TimeSpan { start, end })
    }

    /// Samples, filters and gap-searches the stale rows of one store.
    fn sample_group(
        &self,
        group: &StoreGroup,
        rows: &[&RowView],
        window: TimeSpan,
        key: SamplingKey,
        ctx: &QueryContext,
    ) -> Result<Option<SampledGroup>, StoreError> {
        let Some((mut events, annotations)) = self.sample_rows(group, rows, window, ctx)? else {
            return Ok(None);
        };
        for row_events in events.values_mut() {
            apply_filters(row_events, &self.requested.filters);
        }

        let mut gaps = BTreeMap::new();
        if self.requested.filters.is_active() {
            let Some(found) = self.search_gaps(group, rows, &mut events, ctx)? else {
                return Ok(None);
            };
            gaps = found;
        }

        let rows = events
            .into_iter()
            .map(|(row, events)| RowUpdate {
                row,
                key,
                events,
                gaps: gaps.remove(&row).unwrap_or_default(),
            })
            .collect();
        Ok(Some(SampledGroup { rows, annotations }))
    }

    fn sample_rows(
        &self,
        group: &StoreGroup,
        rows: &[&RowView],
        window: TimeSpan,
        ctx: &QueryContext,
    ) -> Result<Option<(BTreeMap<RowId, Vec<DisplayEvent>>, StoreAnnotations)>, StoreError> {
        let _scope = ScopeTimer::new("zoom:getting-states");
        let mut events: BTreeMap<RowId, Vec<DisplayEvent>> =
            rows.iter().map(|row| (row.id, Vec::new())).collect();
        let mut annotations = StoreAnnotations::for_store(group.store_id);
        let provider = self.annotations.as_deref();

        let status = query_full_states(
            group.store.as_ref(),
            window.start,
            window.end,
            self.resolution,
            ctx,
            |states, prev| {
                for row in rows {
                    if let Some(list) = events.get_mut(&row.id) {
                        list.extend(build_events(&row.attributes, window, states, prev));
                    }
                }
                if let Some(provider) = provider {
                    annotations
                        .links
                        .extend(provider.links(group.store_id, states, prev));
                    annotations
                        .markers
                        .extend(provider.view_markers(group.store_id, states, prev));
                }
            },
        )?;
        Ok(match status {
            QueryStatus::Cancelled => None,
            QueryStatus::Completed { .. } | QueryStatus::EmptyWindow => Some((events, annotations)),
        })
    }

    /// Searches the merged gaps at the fine resolution and writes the
    /// reconciled flags back. Returns the gap spans each row took part in.
    fn search_gaps(
        &self,
        group: &StoreGroup,
        rows: &[&RowView],
        events: &mut BTreeMap<RowId, Vec<DisplayEvent>>,
        ctx: &QueryContext,
    ) -> Result<Option<BTreeMap<RowId, Vec<TimeSpan>>>, StoreError> {
        let _scope = ScopeTimer::new("zoom:gap-search");
        let gaps = events
            .iter()
            .flat_map(|(row, row_events)| collect_gaps(*row, row_events))
            .collect();
        let mut table = regroup_overlapping(gaps);
        let mut spans: BTreeMap<RowId, Vec<TimeSpan>> = BTreeMap::new();
        if table.is_empty() {
            return Ok(Some(spans));
        }

        let attributes: HashMap<RowId, BTreeSet<AttributeId>> = rows
            .iter()
            .map(|row| (row.id, row.attributes.clone()))
            .collect();
        log_debug!(
            "searching {} merged gaps at r={} for store {:?}",
            table.len(),
            self.gap_resolution,
            group.store_id
        );

        for merged in table.iter_mut() {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            let status = search_merged_gap(
                group.store.as_ref(),
                merged,
                &attributes,
                &self.requested.filters,
                self.gap_resolution,
                ctx,
            )?;
            if status == QueryStatus::Cancelled {
                return Ok(None);
            }
            for (row, resolved) in &merged.rows {
                if let Some(row_events) = events.get_mut(row) {
                    write_back(row_events, resolved);
                }
                spans.entry(*row).or_default().push(merged.span);
            }
        }
        Ok(Some(spans))
    }
}
