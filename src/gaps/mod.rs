//! Background search of unsampled gaps when filters are active.
//!
//! Gaps of every row are collected, merged across rows where they overlap,
//! and each merged span is re-sampled once at a finer resolution.

mod collector;
mod reconcile;
mod regroup;

pub use collector::{collect_gaps, GapSpan};
pub use reconcile::{reconcile_gap_events, search_merged_gap, write_back};
pub use regroup::{regroup_overlapping, GapTable, MergedGap};
