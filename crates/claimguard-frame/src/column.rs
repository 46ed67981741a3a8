use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Inferred storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Categorical,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Categorical => "categorical",
        };
        f.write_str(s)
    }
}

/// Cell storage; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric {
        values: Vec<Option<f64>>,
        integer: bool,
    },
    Categorical(Vec<Option<String>>),
}

/// A named column of a [`Frame`](crate::Frame).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>, integer: bool) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Numeric { values, integer },
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Categorical(values),
        }
    }

    /// Infer the column kind from raw cells (already stripped of the missing marker).
    ///
    /// All present cells integral → `Integer`; all parse as floats → `Float`;
    /// otherwise `Categorical`. A column with no present cell is `Float`.
    pub fn infer(name: impl Into<String>, raw: Vec<Option<String>>) -> Self {
        let present = || raw.iter().flatten().map(|s| s.trim());
        if present().all(|s| s.parse::<i64>().is_ok()) && present().next().is_some() {
            let values = raw
                .iter()
                .map(|c| c.as_deref().and_then(|s| s.trim().parse::<i64>().ok()).map(|v| v as f64))
                .collect();
            return Column::numeric(name, values, true);
        }
        if present().all(|s| s.parse::<f64>().is_ok()) {
            let values = raw
                .iter()
                .map(|c| c.as_deref().and_then(|s| s.trim().parse::<f64>().ok()))
                .collect();
            return Column::numeric(name, values, false);
        }
        Column::categorical(name, raw)
    }

    pub fn kind(&self) -> ColumnKind {
        match &self.data {
            ColumnData::Numeric { integer: true, .. } => ColumnKind::Integer,
            ColumnData::Numeric { integer: false, .. } => ColumnKind::Float,
            ColumnData::Categorical(_) => ColumnKind::Categorical,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric { values, .. } => values.len(),
            ColumnData::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_count(&self) -> usize {
        match &self.data {
            ColumnData::Numeric { values, .. } => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Categorical(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Count of distinct present values.
    pub fn n_unique(&self) -> usize {
        match &self.data {
            ColumnData::Numeric { values, .. } => values
                .iter()
                .flatten()
                .map(|v| v.to_bits())
                .collect::<HashSet<_>>()
                .len(),
            ColumnData::Categorical(values) => {
                values.iter().flatten().collect::<HashSet<_>>().len()
            }
        }
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric { values, .. } => Some(values),
            ColumnData::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&[Option<String>]> {
        match &self.data {
            ColumnData::Categorical(values) => Some(values),
            ColumnData::Numeric { .. } => None,
        }
    }

    /// Replace missing cells with the most frequent value.
    ///
    /// Ties resolve to the smallest value. Returns the fill value rendered as
    /// text, or `None` when the column has nothing to impute from.
    pub fn fill_mode(&mut self) -> Option<String> {
        match &mut self.data {
            ColumnData::Categorical(values) => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for v in values.iter().flatten() {
                    *counts.entry(v.as_str()).or_default() += 1;
                }
                let mode = most_frequent(counts)?.to_string();
                for v in values.iter_mut().filter(|v| v.is_none()) {
                    *v = Some(mode.clone());
                }
                Some(mode)
            }
            ColumnData::Numeric { values, .. } => {
                let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mut best: Option<(f64, usize)> = None;
                for run in sorted.chunk_by(|a, b| a == b) {
                    if best.map_or(true, |(_, c)| run.len() > c) {
                        best = Some((run[0], run.len()));
                    }
                }
                let (mode, _) = best?;
                for v in values.iter_mut().filter(|v| v.is_none()) {
                    *v = Some(mode);
                }
                Some(mode.to_string())
            }
        }
    }
}

fn most_frequent<K: Copy>(counts: BTreeMap<K, usize>) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for (k, c) in counts {
        if best.map_or(true, |(_, bc)| c > bc) {
            best = Some((k, c));
        }
    }
    best.map(|(k, _)| k)
}
