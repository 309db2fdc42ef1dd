use serde::{Deserialize, Serialize};

use super::{interval::Value, time::TimeSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The row held a non-null state for the whole span.
    State,
    /// The store reported a null state, or no state at all, for the span.
    Empty,
    /// Lies between two samples; the sampling step did not observe it.
    Unsampled,
}

/// One contiguous segment on a row's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEvent {
    pub span: TimeSpan,
    pub payload: Option<Value>,
    pub kind: EventKind,
    pub dimmed: bool,
    pub excluded: bool,
}

impl DisplayEvent {
    pub fn state(span: TimeSpan, payload: Value) -> Self {
        Self {
            span,
            payload: Some(payload),
            kind: EventKind::State,
            dimmed: false,
            excluded: false,
        }
    }

    pub fn empty(span: TimeSpan) -> Self {
        Self {
            span,
            payload: None,
            kind: EventKind::Empty,
            dimmed: false,
            excluded: false,
        }
    }

    pub fn unsampled(span: TimeSpan) -> Self {
        Self {
            span,
            payload: None,
            kind: EventKind::Unsampled,
            dimmed: false,
            excluded: false,
        }
    }

    pub fn is_unsampled(&self) -> bool {
        self.kind == EventKind::Unsampled
    }
}

/// Checks that `events` tile `window` exactly: no gap, no overlap.
pub fn is_contiguous_over(events: &[DisplayEvent], window: &TimeSpan) -> bool {
    if window.is_empty() {
        return events.is_empty();
    }
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return false;
    };
    first.span.start == window.start
        && last.span.end == window.end
        && events.iter().all(|event| !event.span.is_empty())
        && events
            .windows(2)
            .all(|pair| pair[0].span.end == pair[1].span.start)
}
