use crate::error::{ClaimError, ClaimResult};
use crate::matrix::Matrix;

/// A supervised classifier over class-index labels `0..n_classes`.
///
/// Every model in the workspace implements this so the pipeline, grid search
/// and voting ensemble can treat them uniformly.
pub trait Classifier: Send + Sync {
    /// Fit on `x` (`[samples, features]`) and labels `y` (one per row).
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()>;

    /// Predict one class index per row.
    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>>;

    /// Class probabilities, shape `[samples, n_classes]`.
    fn predict_proba(&self, _x: &Matrix) -> ClaimResult<Matrix> {
        Err(ClaimError::InvalidOperation(
            "predict_proba is not available for this classifier".into(),
        ))
    }

    /// Number of classes seen during fit (0 before fit).
    fn n_classes(&self) -> usize;
}

/// Validate a training pair and return the class count (`max label + 1`).
pub fn n_classes_of(x: &Matrix, y: &[usize]) -> ClaimResult<usize> {
    if x.rows() == 0 || y.is_empty() {
        return Err(ClaimError::EmptyInput);
    }
    if x.rows() != y.len() {
        return Err(ClaimError::ShapeMismatch {
            expected: vec![x.rows()],
            got: vec![y.len()],
        });
    }
    Ok(y.iter().copied().max().unwrap_or(0) + 1)
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_lowest_on_tie() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), 1);
        assert_eq!(argmax(&[2.0, 2.0]), 0);
    }

    #[test]
    fn test_n_classes_of() {
        let x = Matrix::zeros(3, 1);
        assert_eq!(n_classes_of(&x, &[0, 2, 1]).unwrap(), 3);
        assert!(n_classes_of(&x, &[0, 1]).is_err());
        assert_eq!(n_classes_of(&Matrix::zeros(0, 1), &[]), Err(ClaimError::EmptyInput));
    }
}
