//! Ownership of rows and of the stores that back them.
//!
//! Structural changes (register/unregister) and row display updates go
//! through a single mutex. Computations take a [`RegistrySnapshot`] under
//! that mutex and then work on it without holding any lock, so a change
//! made mid-computation is only seen by the next computation.

mod snapshot;

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    models::{ContextId, DisplayEvent, Row, RowId, RowSpec, SamplingKey, StoreId, TimeSpan},
    store::IntervalStore,
};

pub use snapshot::{RegistrySnapshot, RowView, StoreGroup};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

struct StoreEntry {
    context: ContextId,
    store: Arc<dyn IntervalStore>,
    rows: Vec<RowId>,
}

#[derive(Default)]
struct ContextEntry {
    stores: Vec<StoreId>,
    roots: Vec<RowId>,
}

#[derive(Default)]
struct RegistryInner {
    rows: HashMap<RowId, Row>,
    stores: HashMap<StoreId, StoreEntry>,
    contexts: HashMap<ContextId, ContextEntry>,
    next_row: u64,
    next_store: u32,
}

#[derive(Default)]
pub struct RowRegistry {
    inner: Mutex<RegistryInner>,
}

impl RowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Attaches a store to a data context. Registering the same store
    /// instance twice for a context returns the existing id.
    pub fn register_store(&self, context: ContextId, store: Arc<dyn IntervalStore>) -> StoreId {
        let mut inner = self.lock();
        if let Some((id, _)) = inner
            .stores
            .iter()
            .find(|(_, entry)| entry.context == context && Arc::ptr_eq(&entry.store, &store))
        {
            return *id;
        }

        let id = StoreId(inner.next_store);
        inner.next_store += 1;
        inner.stores.insert(
            id,
            StoreEntry {
                context,
                store,
                rows: Vec::new(),
            },
        );
        inner.contexts.entry(context).or_default().stores.push(id);
        log_debug!("registered store {:?} for context {context}", id);
        id
    }

    /// Adds a forest of rows backed by `store`. A [`RowSpec`] whose label already
    /// exists under the same parent updates that row instead of adding a
    /// duplicate, so registering the same forest twice is a no-op.
    ///
    /// Returns the root row ids in input order, or an empty list when the
    /// store does not belong to the context.
    pub fn register_rows(&self, context: ContextId, store: StoreId, specs: Vec<RowSpec>) -> Vec<RowId> {
        let mut inner = self.lock();
        match inner.stores.get(&store) {
            Some(entry) if entry.context == context => {}
            _ => return Vec::new(),
        }

        let mut roots = Vec::with_capacity(specs.len());
        for spec in specs {
            let existing = inner.contexts.get(&context).and_then(|ctx| {
                ctx.roots
                    .iter()
                    .copied()
                    .find(|id| inner.rows.get(id).is_some_and(|row| row.store == store && row.label == spec.label))
            });
            let id = inner.upsert(store, None, existing, spec);
            if existing.is_none() {
                inner.contexts.entry(context).or_default().roots.push(id);
            }
            roots.push(id);
        }
        roots
    }

    /// Drops every row and store of a context. Unknown contexts are ignored.
    pub fn unregister_rows(&self, context: ContextId) {
        let mut inner = self.lock();
        let Some(entry) = inner.contexts.remove(&context) else {
            return;
        };
        let mut removed = 0;
        for root in entry.roots {
            removed += inner.remove_subtree(root);
        }
        for store in entry.stores {
            inner.stores.remove(&store);
        }
        log_info!("unregistered context {context}: {removed} rows removed");
    }

    /// Removes one row together with its whole subtree.
    pub fn remove_row(&self, id: RowId) -> usize {
        let mut inner = self.lock();
        let Some(row) = inner.rows.get(&id) else {
            return 0;
        };
        let parent = row.parent;
        let store = row.store;
        match parent {
            Some(parent) => {
                if let Some(parent_row) = inner.rows.get_mut(&parent) {
                    parent_row.children.retain(|child| *child != id);
                }
            }
            None => {
                let context = inner.stores.get(&store).map(|entry| entry.context);
                if let Some(ctx) = context.and_then(|c| inner.contexts.get_mut(&c)) {
                    ctx.roots.retain(|root| *root != id);
                }
            }
        }
        inner.remove_subtree(id)
    }

    /// Captures the rows a computation will work on, grouped by store.
    /// `visible = None` takes every registered row.
    pub fn snapshot(&self, visible: Option<&[RowId]>) -> RegistrySnapshot {
        let inner = self.lock();
        let mut groups: Vec<StoreGroup> = Vec::new();
        let mut store_ids: Vec<&StoreId> = inner.stores.keys().collect();
        store_ids.sort();

        let wanted: Option<BTreeSet<RowId>> = visible.map(|ids| ids.iter().copied().collect());
        for store_id in store_ids {
            let entry = &inner.stores[store_id];
            let rows: Vec<RowView> = entry
                .rows
                .iter()
                .filter(|id| wanted.as_ref().map_or(true, |set| set.contains(id)))
                .filter_map(|id| inner.rows.get(id))
                .map(RowView::from)
                .collect();
            if rows.is_empty() {
                continue;
            }
            groups.push(StoreGroup {
                store_id: *store_id,
                store: Arc::clone(&entry.store),
                rows,
            });
        }
        RegistrySnapshot { groups }
    }

    pub fn row(&self, id: RowId) -> Option<Row> {
        self.lock().rows.get(&id).cloned()
    }

    pub fn events(&self, id: RowId) -> Option<Vec<DisplayEvent>> {
        self.lock().rows.get(&id).map(|row| row.current_events.clone())
    }

    pub fn rows_for_store(&self, store: StoreId) -> Vec<RowId> {
        self.lock()
            .stores
            .get(&store)
            .map(|entry| entry.rows.clone())
            .unwrap_or_default()
    }

    pub fn has_store(&self, store: StoreId) -> bool {
        self.lock().stores.contains_key(&store)
    }

    pub fn roots(&self, context: ContextId) -> Vec<RowId> {
        self.lock()
            .contexts
            .get(&context)
            .map(|entry| entry.roots.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores freshly computed events for a row. Rows removed since the
    /// computation started are skipped; returns whether the row was updated.
    pub(crate) fn set_events(
        &self,
        id: RowId,
        key: SamplingKey,
        events: Vec<DisplayEvent>,
        gaps: Vec<TimeSpan>,
    ) -> bool {
        let mut inner = self.lock();
        match inner.rows.get_mut(&id) {
            Some(row) => {
                row.current_sampling = Some(key);
                row.current_events = events;
                row.current_gaps = gaps;
                true
            }
            None => false,
        }
    }

    /// Gap spans of the rows currently sampled for `key`, with the rows
    /// sharing each span in id order.
    pub fn gap_spans(&self, key: &SamplingKey) -> BTreeMap<TimeSpan, Vec<RowId>> {
        let inner = self.lock();
        let mut spans: BTreeMap<TimeSpan, Vec<RowId>> = BTreeMap::new();
        for row in inner.rows.values() {
            if row.current_sampling.as_ref() != Some(key) {
                continue;
            }
            for span in &row.current_gaps {
                spans.entry(*span).or_default().push(row.id);
            }
        }
        for rows in spans.values_mut() {
            rows.sort();
        }
        spans
    }

    /// Forgets every row's sampling so the next computation resamples all.
    pub fn invalidate(&self) {
        for row in self.lock().rows.values_mut() {
            row.current_sampling = None;
        }
    }
}

impl RegistryInner {
    fn allocate_row(&mut self) -> RowId {
        let id = RowId(self.next_row);
        self.next_row += 1;
        id
    }

    fn upsert(&mut self, store: StoreId, parent: Option<RowId>, existing: Option<RowId>, spec: RowSpec) -> RowId {
        let id = match existing {
            Some(id) => {
                if let Some(row) = self.rows.get_mut(&id) {
                    if row.attribute_keys != spec.attributes {
                        row.attribute_keys = spec.attributes.clone();
                        row.current_sampling = None;
                    }
                }
                id
            }
            None => {
                let id = self.allocate_row();
                let mut row = Row::new(id, store, spec.label.clone(), spec.attributes.clone());
                row.parent = parent;
                self.rows.insert(id, row);
                if let Some(entry) = self.stores.get_mut(&store) {
                    entry.rows.push(id);
                }
                if let Some(parent_row) = parent.and_then(|p| self.rows.get_mut(&p)) {
                    parent_row.children.push(id);
                }
                id
            }
        };

        for child in spec.children {
            let existing_child = self.rows.get(&id).and_then(|row| {
                row.children
                    .iter()
                    .copied()
                    .find(|c| self.rows.get(c).is_some_and(|r| r.label == child.label))
            });
            self.upsert(store, Some(id), existing_child, child);
        }
        id
    }

    fn remove_subtree(&mut self, root: RowId) -> usize {
        let mut pending = vec![root];
        let mut removed = 0;
        while let Some(id) = pending.pop() {
            let Some(row) = self.rows.remove(&id) else {
                continue;
            };
            if let Some(entry) = self.stores.get_mut(&row.store) {
                entry.rows.retain(|r| *r != id);
            }
            pending.extend(row.children);
            removed += 1;
        }
        removed
    }
}
