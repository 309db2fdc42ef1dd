//! Incremental time-window query and sampling for time-graph views.
//!
//! Rows registered in a [`RowRegistry`] are backed by attributes of an
//! [`IntervalStore`]. A [`ZoomController`] turns viewport changes into
//! cancellable computations that sample the store, build gap-free display
//! events per row, search unsampled gaps when filters are active, and
//! apply the newest result only.

pub mod config;
pub mod error;
pub mod events;
pub mod gaps;
pub mod models;
pub mod query;
pub mod registry;
pub mod store;
pub mod utils;
pub mod zoom;

pub use config::ZoomConfig;
pub use error::StoreError;
pub use registry::RowRegistry;
pub use store::{IntervalStore, MemoryStore, SqliteStore};
pub use utils::init_logging;
pub use zoom::{Viewport, ZoomController};
