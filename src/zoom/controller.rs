use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};

use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{config::ZoomConfig, registry::RowRegistry};

use super::{
    annotations::{AnnotationProvider, StoreAnnotations},
    state::{Marker, ZoomState, ZoomStatus},
    task::{ZoomOutcome, ZoomResult, ZoomTask},
    viewport::{Viewport, ViewportSource},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

struct Running {
    generation: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct ControllerInner {
    registry: Arc<RowRegistry>,
    config: ZoomConfig,
    runtime: Handle,
    generation: AtomicU64,
    /// Serializes generation changes and applies.
    gate: Mutex<()>,
    state: Mutex<ZoomState>,
    current: Mutex<Option<Running>>,
    outstanding: AtomicUsize,
    annotations: Mutex<Option<Arc<dyn AnnotationProvider>>>,
}

/// Turns viewport changes into zoom computations, keeping at most one
/// current and letting only the newest one write display state.
///
/// Lock order: gate, then state, then the registry.
#[derive(Clone)]
pub struct ZoomController {
    inner: Arc<ControllerInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ZoomController {
    pub fn new(registry: Arc<RowRegistry>, config: ZoomConfig, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                registry,
                config,
                runtime,
                generation: AtomicU64::new(0),
                gate: Mutex::new(()),
                state: Mutex::new(ZoomState::new()),
                current: Mutex::new(None),
                outstanding: AtomicUsize::new(0),
                annotations: Mutex::new(None),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<RowRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &ZoomConfig {
        &self.inner.config
    }

    pub fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ZoomStatus {
        lock(&self.inner.state).status
    }

    pub fn state(&self) -> ZoomState {
        lock(&self.inner.state).clone()
    }

    pub fn markers(&self) -> Vec<Marker> {
        lock(&self.inner.state).markers.clone()
    }

    pub fn annotations(&self) -> Vec<StoreAnnotations> {
        lock(&self.inner.state).annotations.clone()
    }

    /// Installs the provider asked for links and markers by every later
    /// computation.
    pub fn set_annotation_provider(&self, provider: Arc<dyn AnnotationProvider>) {
        *lock(&self.inner.annotations) = Some(provider);
    }

    /// Whether some computation, current or superseded, is still running.
    pub fn is_dirty(&self) -> bool {
        self.inner.outstanding.load(Ordering::SeqCst) > 0
    }

    /// Starts a computation for `viewport`, superseding any running one.
    /// Returns the generation allocated for it.
    pub fn set_viewport(&self, viewport: Viewport) -> u64 {
        match self.prepare(viewport) {
            Some(task) => {
                let generation = task.generation;
                self.spawn(task);
                generation
            }
            None => self.current_generation(),
        }
    }

    /// Re-runs the last viewport, e.g. after rows were registered. Rows
    /// already sampled for it are left alone.
    pub fn refresh(&self) -> Option<u64> {
        let viewport = lock(&self.inner.state).viewport.clone()?;
        Some(self.set_viewport(viewport))
    }

    /// Cancels the current computation; its results will not be applied.
    pub fn cancel(&self) {
        let _gate = lock(&self.inner.gate);
        if let Some(running) = lock(&self.inner.current).as_ref() {
            running.cancel.cancel();
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.inner.state);
        if state.is_running() {
            state.status = ZoomStatus::Cancelled;
        }
    }

    /// Allocates a generation and snapshots the registry for `viewport`,
    /// cancelling the previous computation. An empty window yields no task.
    pub fn prepare(&self, viewport: Viewport) -> Option<ZoomTask> {
        let _gate = lock(&self.inner.gate);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = lock(&self.inner.current).take() {
            previous.cancel.cancel();
        }

        let mut state = lock(&self.inner.state);
        if let Some(last) = state.viewport.as_ref() {
            if state.is_running() && last.same_window(&viewport) {
                log_debug!("restarting zoom over [{}, {}] as generation {generation}", viewport.start, viewport.end);
            }
        }
        state.viewport = Some(viewport.clone());
        state.generation = generation;

        if viewport.is_empty() {
            log_debug!("empty window [{}, {}], nothing to compute", viewport.start, viewport.end);
            state.status = ZoomStatus::Idle;
            return None;
        }

        let snapshot = self.inner.registry.snapshot(viewport.visible.as_deref());
        let cancel = CancellationToken::new();
        *lock(&self.inner.current) = Some(Running {
            generation,
            cancel: cancel.clone(),
            handle: None,
        });
        state.status = ZoomStatus::Running;

        let resolution = viewport.resolution.max(1);
        Some(ZoomTask {
            generation,
            resolution,
            gap_resolution: self.inner.config.gap_resolution(resolution),
            max_intervals: self.inner.config.max_intervals,
            annotations: lock(&self.inner.annotations).clone(),
            requested: viewport,
            cancel,
            snapshot,
        })
    }

    fn spawn(&self, task: ZoomTask) {
        let generation = task.generation;
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        let controller = self.clone();
        let handle = self.inner.runtime.spawn_blocking(move || {
            let result = task.compute();
            controller.commit(result);
            controller.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
        });

        if let Some(running) = lock(&self.inner.current).as_mut() {
            if running.generation == generation {
                running.handle = Some(handle);
            }
        }
    }

    /// Runs `f` on the registry and zoom state, but only while `generation`
    /// is still the newest one. Returns whether `f` ran.
    pub fn apply<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&RowRegistry, &mut ZoomState),
    {
        let _gate = lock(&self.inner.gate);
        let current = self.current_generation();
        if generation != current {
            log_debug!("dropping stale zoom generation {generation} (current {current})");
            return false;
        }
        let mut state = lock(&self.inner.state);
        f(&self.inner.registry, &mut state);
        true
    }

    /// Applies a finished computation if it is still current. Rows of a
    /// failed store keep their previous events and are retried next time.
    pub fn commit(&self, result: ZoomResult) -> bool {
        let generation = result.generation;
        self.apply(generation, move |registry, state| {
            state.generation = generation;
            match result.outcome {
                ZoomOutcome::Completed {
                    key,
                    rows,
                    annotations,
                    trace_markers,
                    failures,
                } => {
                    let count = rows.len();
                    for update in rows {
                        registry.set_events(update.row, update.key, update.events, update.gaps);
                    }
                    state.markers = registry
                        .gap_spans(&key)
                        .into_iter()
                        .map(|(span, rows)| Marker { span, rows })
                        .collect();

                    state.annotations.retain(|entry| registry.has_store(entry.store));
                    for sampled in annotations {
                        state.annotations.retain(|entry| entry.store != sampled.store);
                        if !sampled.is_empty() {
                            state.annotations.push(sampled);
                        }
                    }
                    state.annotations.sort_by_key(|entry| entry.store);
                    state.trace_markers = trace_markers;

                    state.last_error = failures
                        .first()
                        .map(|(store, err)| format!("store {}: {err}", store.0));
                    if !failures.is_empty() {
                        log_warn!(
                            "zoom generation {generation} skipped {} failed stores",
                            failures.len()
                        );
                    }
                    state.status = ZoomStatus::Completed;
                    log_debug!("zoom generation {generation} applied to {count} rows");
                }
                ZoomOutcome::Cancelled => {
                    state.status = ZoomStatus::Cancelled;
                }
            }
        })
    }

    /// Waits until no computation of the current generation is running.
    pub async fn join(&self) {
        loop {
            let handle = lock(&self.inner.current)
                .as_mut()
                .and_then(|running| running.handle.take());
            match handle {
                Some(handle) => {
                    let _ = handle.await;
                }
                None => break,
            }
        }
    }

    /// Drives the controller from `source` until it closes or `stop` fires.
    pub fn follow<S>(&self, mut source: S, stop: CancellationToken) -> JoinHandle<()>
    where
        S: ViewportSource + 'static,
    {
        let controller = self.clone();
        self.inner.runtime.spawn(async move {
            controller.set_viewport(source.current());
            loop {
                tokio::select! {
                    changed = source.changed() => {
                        if !changed {
                            break;
                        }
                        controller.set_viewport(source.current());
                    }
                    _ = stop.cancelled() => break,
                }
            }
            log_info!("viewport source closed, zoom controller idle");
        })
    }
}
