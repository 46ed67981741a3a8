use claimguard_core::{ClaimError, ClaimResult};

fn check_lengths(y_true: &[usize], y_pred: &[usize]) -> ClaimResult<()> {
    if y_true.is_empty() {
        return Err(ClaimError::EmptyInput);
    }
    if y_true.len() != y_pred.len() {
        return Err(ClaimError::ShapeMismatch {
            expected: vec![y_true.len()],
            got: vec![y_pred.len()],
        });
    }
    Ok(())
}

/// Compute accuracy: fraction of correct predictions.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> ClaimResult<f64> {
    check_lengths(y_true, y_pred)?;
    let correct = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Confusion matrix of shape `[n_classes][n_classes]`; rows are true labels,
/// columns are predictions.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> ClaimResult<Vec<Vec<usize>>> {
    check_lengths(y_true, y_pred)?;
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t >= n_classes || p >= n_classes {
            return Err(ClaimError::IndexOutOfBounds {
                index: t.max(p),
                axis: 0,
                size: n_classes,
            });
        }
        matrix[t][p] += 1;
    }
    Ok(matrix)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Precision for a specific class; 0 when the class is never predicted.
pub fn precision_class(y_true: &[usize], y_pred: &[usize], class: usize) -> f64 {
    let predicted = y_pred.iter().filter(|&&p| p == class).count();
    let tp = y_true.iter().zip(y_pred).filter(|(&t, &p)| p == class && t == class).count();
    ratio(tp, predicted)
}

/// Recall for a specific class; 0 when the class never occurs.
pub fn recall_class(y_true: &[usize], y_pred: &[usize], class: usize) -> f64 {
    let actual = y_true.iter().filter(|&&t| t == class).count();
    let tp = y_true.iter().zip(y_pred).filter(|(&t, &p)| p == class && t == class).count();
    ratio(tp, actual)
}

/// F1 score for a specific class.
pub fn f1_class(y_true: &[usize], y_pred: &[usize], class: usize) -> f64 {
    let p = precision_class(y_true, y_pred, class);
    let r = recall_class(y_true, y_pred, class);
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_accuracy() {
        let y_true = [0, 1, 1, 0, 1];
        let y_pred = [0, 1, 0, 0, 1];
        assert_abs_diff_eq!(accuracy(&y_true, &y_pred).unwrap(), 0.8, epsilon = 1e-10);
        assert!(accuracy(&[], &[]).is_err());
        assert!(accuracy(&[0, 1], &[0]).is_err());
    }

    #[test]
    fn test_confusion_matrix() {
        let y_true = [0, 0, 1, 1, 1];
        let y_pred = [0, 1, 1, 1, 0];
        let cm = confusion_matrix(&y_true, &y_pred, 2).unwrap();
        assert_eq!(cm, vec![vec![1, 1], vec![1, 2]]);
        assert!(confusion_matrix(&[0, 2], &[0, 1], 2).is_err());
    }

    #[test]
    fn test_precision_recall_f1() {
        let y_true = [0, 0, 1, 1, 1];
        let y_pred = [0, 1, 1, 1, 0];
        assert_abs_diff_eq!(precision_class(&y_true, &y_pred, 1), 2.0 / 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(recall_class(&y_true, &y_pred, 1), 2.0 / 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(f1_class(&y_true, &y_pred, 1), 2.0 / 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(precision_class(&y_true, &y_pred, 0), 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_undefined_scores_are_zero() {
        let y_true = [0, 0, 1];
        let y_pred = [0, 0, 0];
        assert_eq!(precision_class(&y_true, &y_pred, 1), 0.0);
        assert_eq!(f1_class(&y_true, &y_pred, 1), 0.0);
        assert_eq!(recall_class(&y_true, &y_pred, 2), 0.0);
    }
}
