//! Links and markers a data source may attach to the sampled states.
//!
//! A provider sees the same full-state chunks the rows are built from, so
//! arrows between rows and per-view markers come out of the one pass over
//! the store. Trace-wide markers are asked for once per computation.

use serde::{Deserialize, Serialize};

use crate::models::{AttributeId, FullState, StoreId, TimeSpan, Value};

/// An arrow drawn between two attributes' rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub span: TimeSpan,
    pub source: AttributeId,
    pub target: AttributeId,
    pub payload: Option<Value>,
}

/// A labelled span drawn across the view, optionally tied to one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMarker {
    pub span: TimeSpan,
    pub category: String,
    pub label: String,
    pub attribute: Option<AttributeId>,
}

impl ViewMarker {
    pub fn new(span: TimeSpan, category: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            span,
            category: category.into(),
            label: label.into(),
            attribute: None,
        }
    }
}

/// Everything one store contributed to the last computation that sampled it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreAnnotations {
    pub store: StoreId,
    pub links: Vec<Link>,
    pub markers: Vec<ViewMarker>,
}

impl StoreAnnotations {
    pub fn for_store(store: StoreId) -> Self {
        Self {
            store,
            links: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.markers.is_empty()
    }
}

/// Called from the computation thread. Every method defaults to nothing.
pub trait AnnotationProvider: Send + Sync {
    /// Links found in one chunk of sampled states. `prev` is the state
    /// sampled just before the chunk, if any.
    fn links(&self, _store: StoreId, _states: &[FullState], _prev: Option<&FullState>) -> Vec<Link> {
        Vec::new()
    }

    /// View markers found in one chunk of sampled states.
    fn view_markers(
        &self,
        _store: StoreId,
        _states: &[FullState],
        _prev: Option<&FullState>,
    ) -> Vec<ViewMarker> {
        Vec::new()
    }

    /// Markers that do not depend on any store, for the whole window.
    fn trace_markers(&self, _window: TimeSpan, _resolution: i64) -> Vec<ViewMarker> {
        Vec::new()
    }
}
