use crate::column::ColumnKind;
use crate::error::FrameResult;
use crate::frame::Frame;
use claimguard_core::Matrix;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Summary statistics of one numeric column (missing values skipped).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Pearson correlation between the numeric columns of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Matrix,
}

/// Quantile with linear interpolation between closest ranks. `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn pearson(pairs: &[(f64, f64)]) -> f64 {
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

impl Frame {
    /// `describe()`-style summary of every numeric column that has values.
    pub fn describe(&self) -> Vec<ColumnSummary> {
        self.columns()
            .iter()
            .filter_map(|col| {
                let values = col.as_numeric()?;
                let mut present: Vec<f64> = values.iter().flatten().copied().collect();
                if present.is_empty() {
                    return None;
                }
                present.sort_by(|a, b| a.total_cmp(b));
                let n = present.len() as f64;
                let mean = present.iter().sum::<f64>() / n;
                let std = if present.len() > 1 {
                    (present.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)).sqrt()
                } else {
                    f64::NAN
                };
                Some(ColumnSummary {
                    name: col.name.clone(),
                    count: present.len(),
                    mean,
                    std,
                    min: present[0],
                    q25: quantile(&present, 0.25),
                    median: quantile(&present, 0.5),
                    q75: quantile(&present, 0.75),
                    max: present[present.len() - 1],
                })
            })
            .collect()
    }

    /// Pairwise-complete Pearson correlation over integer and float columns.
    pub fn correlation(&self) -> FrameResult<CorrelationMatrix> {
        let numeric = self.select_kinds(&[ColumnKind::Integer, ColumnKind::Float]);
        let cols: Vec<&[Option<f64>]> = numeric
            .columns()
            .iter()
            .filter_map(|c| c.as_numeric())
            .collect();
        let p = cols.len();
        let mut values = vec![0.0; p * p];
        for a in 0..p {
            for b in a..p {
                let pairs: Vec<(f64, f64)> = cols[a]
                    .iter()
                    .zip(cols[b].iter())
                    .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                    .collect();
                let r = pearson(&pairs);
                values[a * p + b] = r;
                values[b * p + a] = r;
            }
        }
        Ok(CorrelationMatrix {
            names: numeric.column_names(),
            values: Matrix::new(values, p, p)?,
        })
    }
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values.at(i, j))
    }

    /// Upper-triangle pairs with `|r| >= threshold`, in column order.
    pub fn pairs_above(&self, threshold: f64) -> Vec<(String, String, f64)> {
        let p = self.names.len();
        let mut out = Vec::new();
        for i in 0..p {
            for j in (i + 1)..p {
                let r = self.values.at(i, j);
                if r.abs() >= threshold {
                    out.push((self.names[i].clone(), self.names[j].clone(), r));
                }
            }
        }
        out
    }

    /// Greedy pruning: for each highly correlated pair whose members are both
    /// still kept, drop the later column.
    pub fn prune_candidates(&self, threshold: f64) -> Vec<String> {
        let mut dropped: HashSet<&str> = HashSet::new();
        let mut order = Vec::new();
        for (a, b, _) in self.pairs_above(threshold) {
            let (a, b) = (
                self.names.iter().find(|n| **n == a).map(String::as_str),
                self.names.iter().find(|n| **n == b).map(String::as_str),
            );
            if let (Some(a), Some(b)) = (a, b) {
                if !dropped.contains(a) && dropped.insert(b) {
                    order.push(b.to_string());
                }
            }
        }
        order
    }
}

impl fmt::Display for CorrelationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.names.iter().map(|n| n.len()).max().unwrap_or(0).max(6);
        write!(f, "{:width$}", "", width = width)?;
        for j in 0..self.names.len() {
            write!(f, " {:>6}", j)?;
        }
        writeln!(f)?;
        for (i, name) in self.names.iter().enumerate() {
            write!(f, "{:width$}", name, width = width)?;
            for j in 0..self.names.len() {
                write!(f, " {:>6.2}", self.values.at(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CsvOptions;
    use approx::assert_abs_diff_eq;

    fn frame() -> Frame {
        let text = "\
age,months_as_customer,total_claim_amount,injury_claim,constant,label
20,40,100,10,1,a
30,61,200,20,1,b
40,79,300,30,1,a
50,?,400,40,1,b
60,121,500,50,1,a
";
        Frame::from_reader(text.as_bytes(), &CsvOptions::default()).unwrap()
    }

    #[test]
    fn test_describe() {
        let summary = frame().describe();
        assert_eq!(summary.len(), 5);
        let age = &summary[0];
        assert_eq!(age.count, 5);
        assert_abs_diff_eq!(age.mean, 40.0, epsilon = 1e-12);
        assert_abs_diff_eq!(age.std, 250.0f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(age.q25, 30.0, epsilon = 1e-12);
        assert_abs_diff_eq!(age.median, 40.0, epsilon = 1e-12);
        assert_eq!(summary[1].count, 4);
        assert_abs_diff_eq!(quantile(&[1.0, 2.0], 0.25), 1.25, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_pairwise_complete() {
        let corr = frame().correlation().unwrap();
        assert_eq!(corr.names.len(), 5);
        assert_abs_diff_eq!(corr.get("age", "total_claim_amount").unwrap(), 1.0, epsilon = 1e-12);
        let r = corr.get("age", "months_as_customer").unwrap();
        assert!(r > 0.99 && r < 1.0);
        assert!(corr.get("age", "constant").unwrap().is_nan());
        assert!(corr.get("age", "label").is_none());
    }

    #[test]
    fn test_correlation_is_symmetric() {
        let corr = frame().correlation().unwrap();
        let names = corr.names.clone();
        for a in &names {
            for b in &names {
                let (ab, ba) = (corr.get(a, b).unwrap(), corr.get(b, a).unwrap());
                assert!(ab == ba || (ab.is_nan() && ba.is_nan()), "{a} vs {b}");
            }
        }
        assert_abs_diff_eq!(corr.get("age", "age").unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(corr.get("injury_claim", "injury_claim").unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_prune_candidates_drops_later_member() {
        let corr = frame().correlation().unwrap();
        let pairs = corr.pairs_above(0.95);
        assert!(pairs.iter().all(|(_, _, r)| r.abs() >= 0.95));
        let dropped = corr.prune_candidates(0.95);
        // age is kept; everything perfectly correlated with it goes
        assert_eq!(
            dropped,
            vec!["months_as_customer", "total_claim_amount", "injury_claim"]
        );
    }
}
