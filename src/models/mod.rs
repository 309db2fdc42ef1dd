pub mod event;
pub mod filter;
pub mod interval;
pub mod row;
pub mod sampling;
pub mod time;

pub use event::{is_contiguous_over, DisplayEvent, EventKind};
pub use filter::{FilterAction, FilterSet, ValueMatcher};
pub use interval::{AttributeId, FullState, Interval, Value};
pub use row::{ContextId, Row, RowId, RowSpec, StoreId};
pub use sampling::{needs_resample, SamplingKey};
pub use time::{format_timestamp, TimeSpan};
