use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{event::DisplayEvent, interval::AttributeId, sampling::SamplingKey, time::TimeSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(pub u32);

/// One data context (usually a trace) whose rows come and go together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: RowId,
    pub store: StoreId,
    pub label: String,
    pub parent: Option<RowId>,
    pub attribute_keys: BTreeSet<AttributeId>,
    pub children: Vec<RowId>,
    pub current_sampling: Option<SamplingKey>,
    pub current_events: Vec<DisplayEvent>,
    /// Merged gap spans this row took part in when `current_events` was computed.
    pub current_gaps: Vec<TimeSpan>,
}

impl Row {
    pub fn new(
        id: RowId,
        store: StoreId,
        label: impl Into<String>,
        attribute_keys: BTreeSet<AttributeId>,
    ) -> Self {
        Self {
            id,
            store,
            label: label.into(),
            parent: None,
            attribute_keys,
            children: Vec::new(),
            current_sampling: None,
            current_events: Vec::new(),
            current_gaps: Vec::new(),
        }
    }
}

/// Caller-side description of a row to register, with its subtree.
#[derive(Debug, Clone, Default)]
pub struct RowSpec {
    pub label: String,
    pub attributes: BTreeSet<AttributeId>,
    pub children: Vec<RowSpec>,
}

impl RowSpec {
    pub fn new(label: impl Into<String>, attributes: impl IntoIterator<Item = AttributeId>) -> Self {
        Self {
            label: label.into(),
            attributes: attributes.into_iter().collect(),
            children: Vec::new(),
        }
    }

    /// A grouping row with no backing attribute.
    pub fn group(label: impl Into<String>, children: Vec<RowSpec>) -> Self {
        Self {
            label: label.into(),
            attributes: BTreeSet::new(),
            children,
        }
    }

    pub fn with_children(mut self, children: Vec<RowSpec>) -> Self {
        self.children = children;
        self
    }
}
