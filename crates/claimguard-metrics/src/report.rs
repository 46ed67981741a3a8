use claimguard_core::{ClaimError, ClaimResult};
use serde::Serialize;
use std::fmt;

use crate::classification::{accuracy, f1_class, precision_class, recall_class};

/// Precision, recall, F1 and support for one class or one average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScores {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class scores plus accuracy and macro / weighted averages, rendered
/// as a fixed-width text table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassScores>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    /// `target_names[c]` labels class index `c`.
    pub fn new<S: AsRef<str>>(y_true: &[usize], y_pred: &[usize], target_names: &[S]) -> ClaimResult<Self> {
        let accuracy = accuracy(y_true, y_pred)?;
        if let Some(&c) = y_true.iter().chain(y_pred).find(|&&c| c >= target_names.len()) {
            return Err(ClaimError::IndexOutOfBounds {
                index: c,
                axis: 0,
                size: target_names.len(),
            });
        }
        let classes: Vec<ClassScores> = target_names
            .iter()
            .enumerate()
            .map(|(c, name)| ClassScores {
                name: name.as_ref().to_string(),
                precision: precision_class(y_true, y_pred, c),
                recall: recall_class(y_true, y_pred, c),
                f1: f1_class(y_true, y_pred, c),
                support: y_true.iter().filter(|&&t| t == c).count(),
            })
            .collect();

        let total = y_true.len();
        let k = classes.len() as f64;
        let macro_avg = ClassScores {
            name: "macro avg".to_string(),
            precision: classes.iter().map(|s| s.precision).sum::<f64>() / k,
            recall: classes.iter().map(|s| s.recall).sum::<f64>() / k,
            f1: classes.iter().map(|s| s.f1).sum::<f64>() / k,
            support: total,
        };
        let weighted = |f: fn(&ClassScores) -> f64| {
            classes.iter().map(|s| f(s) * s.support as f64).sum::<f64>() / total as f64
        };
        let weighted_avg = ClassScores {
            name: "weighted avg".to_string(),
            precision: weighted(|s| s.precision),
            recall: weighted(|s| s.recall),
            f1: weighted(|s| s.f1),
            support: total,
        };
        Ok(ClassificationReport {
            classes,
            accuracy,
            macro_avg,
            weighted_avg,
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = self
            .classes
            .iter()
            .map(|s| s.name.len())
            .chain(std::iter::once(self.weighted_avg.name.len()))
            .max()
            .unwrap_or(0);
        let row = |f: &mut fmt::Formatter<'_>, s: &ClassScores| {
            writeln!(
                f,
                "{:>w$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                s.name, s.precision, s.recall, s.f1, s.support
            )
        };

        writeln!(f, "{:>w$}  {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for s in &self.classes {
            row(f, s)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>w$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, &self.macro_avg)?;
        row(f, &self.weighted_avg)
    }
}
