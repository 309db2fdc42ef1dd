use serde::{Deserialize, Serialize};

use crate::models::{RowId, TimeSpan};

use super::{
    annotations::{StoreAnnotations, ViewMarker},
    viewport::Viewport,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ZoomStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// A searched gap span, shown by the renderer as a marker across its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub span: TimeSpan,
    pub rows: Vec<RowId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomState {
    pub status: ZoomStatus,
    /// Generation of the computation that last changed `status`.
    pub generation: u64,
    /// Latest viewport handed to the controller.
    pub viewport: Option<Viewport>,
    /// Gap markers of every row sampled for the current viewport.
    pub markers: Vec<Marker>,
    /// Provider links and markers, one entry per store that produced any.
    pub annotations: Vec<StoreAnnotations>,
    pub trace_markers: Vec<ViewMarker>,
    /// First store failure of the last applied computation.
    pub last_error: Option<String>,
}

impl ZoomState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == ZoomStatus::Running
    }
}
