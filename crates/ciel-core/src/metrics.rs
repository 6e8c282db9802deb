//! Flat metric records emitted by the runtime and the experiments.
//!
//! A `Metrics` value is a mapping from metric name to a scalar: a float,
//! an integer, a flag, or a short status string. It serializes as a plain
//! JSON object so it can be flattened into journal lines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Numeric view of the value. Flags and text have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Flag(_) | Self::Text(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Key under which the runtime reports whether the state stayed finite.
pub const STATUS_KEY: &str = "status";
pub const STATUS_OK: &str = "ok";
pub const STATUS_NON_FINITE: &str = "non-finite";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<String, MetricValue>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a metric.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(MetricValue::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(MetricValue::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetricValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merge `other` into `self`; keys in `other` win.
    pub fn extend(&mut self, other: Metrics) {
        self.0.extend(other.0);
    }

    /// True when every numeric entry is finite.
    pub fn is_finite(&self) -> bool {
        self.0.values().all(MetricValue::is_finite)
    }

    /// Turn a `status = "non-finite"` report (or any non-finite number)
    /// into a `NonFiniteState` error for callers that want to abort.
    pub fn check_finite(&self) -> Result<()> {
        if self.get_str(STATUS_KEY) == Some(STATUS_NON_FINITE) {
            return Err(Error::NonFiniteState("state reported non-finite".into()));
        }
        match self.0.iter().find(|(_, v)| !v.is_finite()) {
            Some((key, value)) => Err(Error::NonFiniteState(format!("{} = {}", key, value))),
            None => Ok(()),
        }
    }
}

impl FromIterator<(String, MetricValue)> for Metrics {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Metrics {
    type Item = (String, MetricValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, MetricValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
