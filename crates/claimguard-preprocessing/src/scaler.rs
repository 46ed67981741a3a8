use claimguard_core::{ClaimError, ClaimResult, Matrix};
use serde::Serialize;

/// Standardize features by removing the mean and scaling to unit variance.
///
/// Optionally restricted to a subset of columns; the other columns pass
/// through untouched. Uses the population standard deviation, and a zero
/// deviation is treated as 1.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StandardScaler {
    pub columns: Option<Vec<usize>>,
    pub mean: Option<Vec<f64>>,
    pub std: Option<Vec<f64>>,
    n_features: usize,
}

impl StandardScaler {
    pub fn new() -> Self {
        StandardScaler::default()
    }

    /// Scale only the given column indices.
    pub fn with_columns(columns: Vec<usize>) -> Self {
        StandardScaler {
            columns: Some(columns),
            ..StandardScaler::default()
        }
    }

    fn targets(&self, n_cols: usize) -> Vec<usize> {
        match &self.columns {
            Some(cols) => cols.clone(),
            None => (0..n_cols).collect(),
        }
    }

    /// Compute mean and std of the target columns from training data.
    pub fn fit(&mut self, x: &Matrix) -> ClaimResult<()> {
        if x.rows() == 0 {
            return Err(ClaimError::EmptyInput);
        }
        let targets = self.targets(x.cols());
        let n = x.rows() as f64;
        let mut means = Vec::with_capacity(targets.len());
        let mut stds = Vec::with_capacity(targets.len());
        for &j in &targets {
            let col = x.column(j)?;
            let mean = col.iter().sum::<f64>() / n;
            let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            means.push(mean);
            stds.push(var.sqrt());
        }
        self.mean = Some(means);
        self.std = Some(stds);
        self.n_features = x.cols();
        Ok(())
    }

    /// Transform data using the fitted statistics.
    pub fn transform(&self, x: &Matrix) -> ClaimResult<Matrix> {
        let (Some(mean), Some(std)) = (&self.mean, &self.std) else {
            return Err(ClaimError::NotFitted("transform()"));
        };
        if x.cols() != self.n_features {
            return Err(ClaimError::ShapeMismatch {
                expected: vec![self.n_features],
                got: vec![x.cols()],
            });
        }
        let targets = self.targets(x.cols());
        let mut out = x.clone();
        for i in 0..x.rows() {
            for (k, &j) in targets.iter().enumerate() {
                let s = if std[k].abs() < f64::EPSILON { 1.0 } else { std[k] };
                out.set(i, j, (x.at(i, j) - mean[k]) / s)?;
            }
        }
        Ok(out)
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, x: &Matrix) -> ClaimResult<Matrix> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_standard_scaler() {
        let x = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();

        let mut scaler = StandardScaler::new();
        let transformed = scaler.fit_transform(&x).unwrap();

        for j in 0..2 {
            let col = transformed.column(j).unwrap();
            let mean: f64 = col.iter().sum::<f64>() / 3.0;
            let var: f64 = col.iter().map(|v| v * v).sum::<f64>() / 3.0;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_column_subset_and_constant_column() {
        let train = Matrix::from_rows(&[vec![1.0, 7.0, 0.0], vec![3.0, 7.0, 1.0]]).unwrap();
        let mut scaler = StandardScaler::with_columns(vec![0, 1]);
        let t = scaler.fit_transform(&train).unwrap();
        assert_eq!(t.row(0), &[-1.0, 0.0, 0.0]);
        assert_eq!(t.row(1), &[1.0, 0.0, 1.0]);

        // statistics come from the training rows only
        let test = Matrix::from_rows(&[vec![5.0, 9.0, 1.0]]).unwrap();
        let t = scaler.transform(&test).unwrap();
        assert_eq!(t.row(0), &[3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&Matrix::zeros(1, 1)),
            Err(ClaimError::NotFitted(_))
        ));
    }
}
