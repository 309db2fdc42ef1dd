use std::{collections::BTreeSet, sync::Arc};

use crate::{
    models::{AttributeId, Row, RowId, SamplingKey, StoreId},
    store::IntervalStore,
};

/// What a computation needs to know about one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: RowId,
    pub attributes: BTreeSet<AttributeId>,
    pub sampling: Option<SamplingKey>,
}

impl RowView {
    pub fn needs_resample(&self, key: &SamplingKey) -> bool {
        self.sampling.as_ref() != Some(key)
    }
}

impl From<&Row> for RowView {
    fn from(row: &Row) -> Self {
        Self {
            id: row.id,
            attributes: row.attribute_keys.clone(),
            sampling: row.current_sampling,
        }
    }
}

pub struct StoreGroup {
    pub store_id: StoreId,
    pub store: Arc<dyn IntervalStore>,
    pub rows: Vec<RowView>,
}

/// Rows grouped by their backing store, detached from the registry.
#[derive(Default)]
pub struct RegistrySnapshot {
    pub groups: Vec<StoreGroup>,
}

impl RegistrySnapshot {
    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|group| group.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
