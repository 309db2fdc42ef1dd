use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use super::interval::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ValueMatcher {
    Equals { value: Value },
    Contains { text: String },
    IntRange { min: i64, max: i64 },
}

impl ValueMatcher {
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueMatcher::Equals { value: expected }, actual) => expected == actual,
            (ValueMatcher::Contains { text }, Value::Str(s)) => s.contains(text.as_str()),
            (ValueMatcher::Contains { text }, Value::Int(v)) => v.to_string().contains(text.as_str()),
            (ValueMatcher::IntRange { min, max }, Value::Int(v)) => min <= v && v <= max,
            _ => false,
        }
    }
}

/// What happens to events that match none of the predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    #[default]
    Dim,
    /// Hidden entirely; excluded events are always dimmed too.
    Exclude,
}

/// The active filter predicates of a viewport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSet {
    pub predicates: Vec<ValueMatcher>,
    pub action: FilterAction,
}

impl FilterSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(predicates: Vec<ValueMatcher>, action: FilterAction) -> Self {
        Self { predicates, action }
    }

    pub fn is_active(&self) -> bool {
        !self.predicates.is_empty()
    }

    pub fn matches(&self, payload: Option<&Value>) -> bool {
        match payload {
            Some(value) => self.predicates.iter().any(|p| p.matches(value)),
            None => false,
        }
    }

    /// `(dimmed, excluded)` for an event carrying `payload`.
    pub fn flags_for(&self, payload: Option<&Value>) -> (bool, bool) {
        if !self.is_active() || self.matches(payload) {
            return (false, false);
        }
        match self.action {
            FilterAction::Dim => (true, false),
            FilterAction::Exclude => (true, true),
        }
    }

    /// Stable within a process; the empty set always yields 0.
    pub fn fingerprint(&self) -> u64 {
        if !self.is_active() {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        match hasher.finish() {
            0 => 1,
            fp => fp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_filters_never_dim() {
        let filters = FilterSet::none();
        assert_eq!(filters.flags_for(None), (false, false));
        assert_eq!(filters.fingerprint(), 0);
    }

    #[test]
    fn non_matching_events_follow_the_action() {
        let dim = FilterSet::new(
            vec![ValueMatcher::Contains { text: "irq".into() }],
            FilterAction::Dim,
        );
        assert_eq!(dim.flags_for(Some(&Value::Str("softirq".into()))), (false, false));
        assert_eq!(dim.flags_for(Some(&Value::Str("idle".into()))), (true, false));
        assert_eq!(dim.flags_for(None), (true, false));

        let exclude = FilterSet {
            action: FilterAction::Exclude,
            ..dim.clone()
        };
        assert_eq!(exclude.flags_for(Some(&Value::Int(3))), (true, true));
        assert_ne!(dim.fingerprint(), exclude.fingerprint());
    }

    #[test]
    fn int_range_is_inclusive() {
        let m = ValueMatcher::IntRange { min: 2, max: 4 };
        assert!(m.matches(&Value::Int(2)));
        assert!(m.matches(&Value::Int(4)));
        assert!(!m.matches(&Value::Int(5)));
        assert!(!m.matches(&Value::Null));
    }
}
