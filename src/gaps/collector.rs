use crate::models::{DisplayEvent, RowId, TimeSpan};

/// A stretch of a row's timeline the coarse sampling could not see into.
#[derive(Debug, Clone, PartialEq)]
pub struct GapSpan {
    pub span: TimeSpan,
    pub row: RowId,
    /// The unsampled events making up the gap, in time order.
    pub events: Vec<DisplayEvent>,
}

/// Collects the maximal runs of contiguous unsampled events of a row.
pub fn collect_gaps(row: RowId, events: &[DisplayEvent]) -> Vec<GapSpan> {
    let mut gaps: Vec<GapSpan> = Vec::new();
    let mut open = false;
    for event in events {
        if !event.is_unsampled() {
            open = false;
            continue;
        }
        match gaps.last_mut() {
            Some(gap) if open && gap.span.end == event.span.start => {
                gap.span.end = event.span.end;
                gap.events.push(event.clone());
            }
            _ => gaps.push(GapSpan {
                span: event.span,
                row,
                events: vec![event.clone()],
            }),
        }
        open = true;
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    #[test]
    fn runs_of_unsampled_events_form_one_gap() {
        let events = vec![
            DisplayEvent::state(TimeSpan::new(0, 5), Value::Int(1)),
            DisplayEvent::unsampled(TimeSpan::new(5, 7)),
            DisplayEvent::unsampled(TimeSpan::new(7, 9)),
            DisplayEvent::state(TimeSpan::new(9, 12), Value::Int(2)),
            DisplayEvent::unsampled(TimeSpan::new(12, 20)),
        ];
        let gaps = collect_gaps(RowId(3), &events);

        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].span, TimeSpan::new(5, 9));
        assert_eq!(gaps[0].events.len(), 2);
        assert_eq!(gaps[1].span, TimeSpan::new(12, 20));
        assert!(gaps.iter().all(|g| g.row == RowId(3)));
    }

    #[test]
    fn no_unsampled_events_no_gaps() {
        let events = vec![DisplayEvent::empty(TimeSpan::new(0, 1))];
        assert!(collect_gaps(RowId(0), &events).is_empty());
    }
}
