//! Reduction results.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Key of one reduced value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatKey {
    /// Per-band aggregate (`NDVI`, `DSM_min`, ...)
    Band(String),
    /// Grouped aggregate for a class index
    Class(i64),
    /// Histogram bin index
    Bin(usize),
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Band(name) => write!(f, "{}", name),
            Self::Class(id) => write!(f, "class:{}", id),
            Self::Bin(idx) => write!(f, "bin:{}", idx),
        }
    }
}

impl Serialize for StatKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Mapping from key to aggregate. An absent key means "no data".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Statistics {
    values: BTreeMap<StatKey, f64>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: StatKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &StatKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Per-band value, e.g. `band("precipitation")` or `band("DSM_min")`.
    pub fn band(&self, name: &str) -> Option<f64> {
        self.get(&StatKey::Band(name.to_string()))
    }

    /// Grouped values in class order.
    pub fn classes(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.values.iter().filter_map(|(k, v)| match k {
            StatKey::Class(id) => Some((*id, *v)),
            _ => None,
        })
    }

    /// Histogram counts in bin order.
    pub fn bins(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().filter_map(|(k, v)| match k {
            StatKey::Bin(idx) => Some((*idx, *v)),
            _ => None,
        })
    }

    /// Sum of all grouped values.
    pub fn class_total(&self) -> f64 {
        self.classes().map(|(_, v)| v).sum()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StatKey, &f64)> {
        self.values.iter()
    }
}

impl FromIterator<(StatKey, f64)> for Statistics {
    fn from_iter<I: IntoIterator<Item = (StatKey, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
