use claimguard_core::{ClaimError, ClaimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One hyper-parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_usize(&self) -> ClaimResult<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(ClaimError::InvalidOperation(format!(
                "expected a non-negative integer, got {}",
                other
            ))),
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> ClaimResult<f64> {
        match self {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            other => Err(ClaimError::InvalidOperation(format!("expected a number, got {}", other))),
        }
    }

    pub fn as_str(&self) -> ClaimResult<&str> {
        match self {
            ParamValue::Text(s) => Ok(s),
            other => Err(ClaimError::InvalidOperation(format!("expected text, got {}", other))),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// One concrete assignment of hyper-parameters.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Look up `key`, failing with a parameter error when it is absent.
pub fn require<'a>(params: &'a ParamSet, key: &str) -> ClaimResult<&'a ParamValue> {
    params
        .get(key)
        .ok_or_else(|| ClaimError::param(key, "missing from the parameter set"))
}

/// Render `{'a': 1, 'b': 'gini'}` for logs and reports.
pub fn format_params(params: &ParamSet) -> String {
    let body: Vec<String> = params.iter().map(|(k, v)| format!("'{}': {}", k, v)).collect();
    format!("{{{}}}", body.join(", "))
}

/// Candidate values per hyper-parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        ParamGrid::default()
    }

    pub fn add<V: Into<ParamValue>>(mut self, name: &str, values: Vec<V>) -> Self {
        self.params
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Number of candidates in the cartesian product.
    pub fn len(&self) -> usize {
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination; keys iterate in sorted order and the last key
    /// varies fastest.
    pub fn candidates(&self) -> ClaimResult<Vec<ParamSet>> {
        if let Some((name, _)) = self.params.iter().find(|(_, v)| v.is_empty()) {
            return Err(ClaimError::param(name, "grid lists no values"));
        }
        let mut out = vec![ParamSet::new()];
        for (name, values) in &self.params {
            out = out
                .into_iter()
                .flat_map(|set| {
                    values.iter().map(move |v| {
                        let mut next = set.clone();
                        next.insert(name.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(out)
    }
}
