use serde::{Deserialize, Serialize};

use super::{filter::FilterSet, row::Row};

/// Identifies the exact `(window, resolution, filters)` a row's events were
/// computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingKey {
    pub start: i64,
    pub end: i64,
    pub resolution: i64,
    pub filter_fingerprint: u64,
}

impl SamplingKey {
    pub fn new(start: i64, end: i64, resolution: i64, filters: &FilterSet) -> Self {
        Self {
            start,
            end,
            resolution,
            filter_fingerprint: filters.fingerprint(),
        }
    }
}

pub fn needs_resample(row: &Row, key: &SamplingKey) -> bool {
    row.current_sampling.as_ref() != Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        filter::{FilterAction, ValueMatcher},
        row::{Row, RowId, StoreId},
    };

    #[test]
    fn resample_only_when_key_differs() {
        let mut row = Row::new(RowId(1), StoreId(0), "cpu0", Default::default());
        let key = SamplingKey::new(0, 100, 10, &FilterSet::none());
        assert!(needs_resample(&row, &key));

        row.current_sampling = Some(key);
        assert!(!needs_resample(&row, &key));

        let filtered = FilterSet::new(
            vec![ValueMatcher::Contains { text: "run".into() }],
            FilterAction::Dim,
        );
        assert!(needs_resample(&row, &SamplingKey::new(0, 100, 10, &filtered)));
        assert!(needs_resample(&row, &SamplingKey::new(0, 100, 5, &FilterSet::none())));
    }
}
