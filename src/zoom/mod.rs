mod annotations;
mod controller;
mod state;
mod task;
mod viewport;

pub use annotations::{AnnotationProvider, Link, StoreAnnotations, ViewMarker};
pub use controller::ZoomController;
pub use state::{Marker, ZoomState, ZoomStatus};
pub use task::{RowUpdate, ZoomOutcome, ZoomResult, ZoomTask};
pub use viewport::{viewport_channel, Viewport, ViewportSource};
