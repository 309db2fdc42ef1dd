use crate::models::{DisplayEvent, FilterSet};

/// Stamps `dimmed`/`excluded` on every event.
///
/// Unsampled events cannot be judged yet: while filters are active they are
/// provisionally dimmed and excluded until the gap search looks inside them.
pub fn apply_filters(events: &mut [DisplayEvent], filters: &FilterSet) {
    let active = filters.is_active();
    for event in events.iter_mut() {
        let (dimmed, excluded) = if active && event.is_unsampled() {
            (true, true)
        } else {
            filters.flags_for(event.payload.as_ref())
        };
        event.dimmed = dimmed;
        event.excluded = excluded;
    }
}
