use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::{FilterSet, RowId, TimeSpan};

/// The window, resolution and filters a renderer wants displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub start: i64,
    pub end: i64,
    pub resolution: i64,
    #[serde(default)]
    pub filters: FilterSet,
    /// Rows to compute; `None` computes every registered row.
    #[serde(default)]
    pub visible: Option<Vec<RowId>>,
}

impl Viewport {
    pub fn new(start: i64, end: i64, resolution: i64) -> Self {
        Self {
            start,
            end,
            resolution,
            filters: FilterSet::none(),
            visible: None,
        }
    }

    /// One sample per pixel column of a `width` pixel wide view.
    pub fn for_display(start: i64, end: i64, width: i64, filters: FilterSet) -> Self {
        let resolution = (end.saturating_sub(start) / width.max(1)).max(1);
        Self {
            filters,
            ..Self::new(start, end, resolution)
        }
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_visible(mut self, rows: Vec<RowId>) -> Self {
        self.visible = Some(rows);
        self
    }

    /// `end < start`: nothing can be sampled.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start, self.end)
    }

    pub fn same_window(&self, other: &Viewport) -> bool {
        self.start == other.start && self.end == other.end && self.resolution == other.resolution
    }
}

/// Supplies viewport changes to a controller.
pub trait ViewportSource: Send {
    /// The latest viewport, marking it as seen.
    fn current(&mut self) -> Viewport;

    /// Resolves once a newer viewport is available; `false` when the
    /// source is gone.
    fn changed(&mut self) -> impl Future<Output = bool> + Send;
}

impl ViewportSource for watch::Receiver<Viewport> {
    fn current(&mut self) -> Viewport {
        self.borrow_and_update().clone()
    }

    fn changed(&mut self) -> impl Future<Output = bool> + Send {
        async move { watch::Receiver::changed(self).await.is_ok() }
    }
}

pub fn viewport_channel(initial: Viewport) -> (watch::Sender<Viewport>, watch::Receiver<Viewport>) {
    watch::channel(initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resolution_never_drops_below_one() {
        assert_eq!(Viewport::for_display(0, 10_000, 1000, FilterSet::none()).resolution, 10);
        assert_eq!(Viewport::for_display(0, 50, 1000, FilterSet::none()).resolution, 1);
        assert_eq!(Viewport::for_display(0, 50, 0, FilterSet::none()).resolution, 50);
    }

    #[test]
    fn display_resolution_survives_extreme_windows() {
        let whole = Viewport::for_display(i64::MIN, i64::MAX, 1000, FilterSet::none());
        assert_eq!(whole.resolution, i64::MAX / 1000);
        let reversed = Viewport::for_display(i64::MAX, i64::MIN, 1000, FilterSet::none());
        assert_eq!(reversed.resolution, 1);
        assert!(reversed.is_empty());
    }

    #[test]
    fn same_window_ignores_filters() {
        let a = Viewport::new(0, 100, 10);
        let b = a.clone().with_visible(vec![RowId(1)]);
        assert!(a.same_window(&b));
        assert!(!a.same_window(&Viewport::new(0, 100, 5)));
        assert!(Viewport::new(100, 50, 1).is_empty());
    }

    #[tokio::test]
    async fn watch_receiver_reports_changes() {
        let (tx, mut rx) = viewport_channel(Viewport::new(0, 10, 1));
        assert_eq!(ViewportSource::current(&mut rx).end, 10);

        tx.send(Viewport::new(0, 20, 1)).unwrap();
        assert!(ViewportSource::changed(&mut rx).await);
        assert_eq!(ViewportSource::current(&mut rx).end, 20);

        drop(tx);
        assert!(!ViewportSource::changed(&mut rx).await);
    }
}
