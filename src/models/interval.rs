use std::fmt;

use serde::{Deserialize, Serialize};

use super::time::TimeSpan;

/// Index of an attribute (quark) tracked by an interval store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(pub u32);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State value carried by an interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Int(i64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// A maximal span during which one attribute holds one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub span: TimeSpan,
    pub attribute: AttributeId,
    pub payload: Value,
}

impl Interval {
    pub fn new(attribute: AttributeId, start: i64, end: i64, payload: Value) -> Self {
        Self {
            span: TimeSpan::new(start, end),
            attribute,
            payload,
        }
    }

    pub fn covers(&self, time: i64) -> bool {
        self.span.contains(time)
    }
}

/// Every active interval across the store's attributes at one instant.
///
/// Intervals are kept sorted by attribute so rows can look theirs up by
/// binary search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullState {
    pub time: i64,
    intervals: Vec<Interval>,
}

impl FullState {
    pub fn new(time: i64, mut intervals: Vec<Interval>) -> Self {
        intervals.sort_by_key(|interval| interval.attribute);
        Self { time, intervals }
    }

    pub fn get(&self, attribute: AttributeId) -> Option<&Interval> {
        self.intervals
            .binary_search_by_key(&attribute, |interval| interval.attribute)
            .ok()
            .map(|idx| &self.intervals[idx])
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
