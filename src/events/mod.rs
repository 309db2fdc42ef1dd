//! Conversion of sampled full states into per-row display events.

mod builder;
mod filtering;

pub use builder::build_events;
pub use filtering::apply_filters;
