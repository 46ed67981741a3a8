use claimguard_core::{n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::debug;

use crate::decision_tree::{DecisionTreeRegressor, MaxFeatures};

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Gradient Boosted Trees for Binary Classification.
///
/// Minimises binomial deviance. Each stage fits a regression tree to the
/// pseudo-residuals `y - sigmoid(raw)` and then replaces the leaf values
/// with one Newton step. With `subsample < 1` every stage sees a random
/// fraction of the rows (stochastic gradient boosting).
#[derive(Debug, Clone)]
pub struct GradientBoostingClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub subsample: f64,
    pub max_features: Option<MaxFeatures>,
    pub seed: Option<u64>,
    trees: Vec<DecisionTreeRegressor>,
    initial_log_odds: f64,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        GradientBoostingClassifier::new(100, 0.1, 3)
    }
}

impl GradientBoostingClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize) -> Self {
        GradientBoostingClassifier {
            n_estimators,
            learning_rate,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: None,
            seed: Some(42),
            trees: Vec::new(),
            initial_log_odds: 0.0,
        }
    }

    /// Stochastic variant: row subsampling plus per-split feature sampling.
    pub fn stochastic(subsample: f64, max_features: f64) -> Self {
        GradientBoostingClassifier {
            subsample,
            max_features: Some(MaxFeatures::Fraction(max_features)),
            ..GradientBoostingClassifier::default()
        }
    }

    fn validate(&self) -> ClaimResult<()> {
        if self.n_estimators == 0 {
            return Err(ClaimError::param("n_estimators", "must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ClaimError::param("learning_rate", "must be positive"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ClaimError::param("subsample", "must lie in (0, 1]"));
        }
        Ok(())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for the positive class.
    pub fn decision_function(&self, x: &Matrix) -> ClaimResult<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(ClaimError::NotFitted("decision_function()"));
        }
        let mut raw = vec![self.initial_log_odds; x.rows()];
        for tree in &self.trees {
            for (r, v) in raw.iter_mut().zip(tree.predict(x)?) {
                *r += self.learning_rate * v;
            }
        }
        Ok(raw)
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        self.validate()?;
        let k = n_classes_of(x, y)?;
        if k > 2 {
            return Err(ClaimError::UnsupportedTarget(format!(
                "gradient boosting handles binary targets, got {} classes",
                k
            )));
        }
        let n = x.rows();
        let yf: Vec<f64> = y.iter().map(|&c| c as f64).collect();

        // Initial log-odds based on class proportions
        let pos = yf.iter().sum::<f64>() / n as f64;
        let pos = pos.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
        self.initial_log_odds = (pos / (1.0 - pos)).ln();

        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let n_sub = ((self.subsample * n as f64) as usize).max(1);
        let mut raw = vec![self.initial_log_odds; n];
        self.trees.clear();

        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = yf.iter().zip(&raw).map(|(&yi, &ri)| yi - sigmoid(ri)).collect();

            let weights = if n_sub < n {
                let mut w = vec![0.0; n];
                for i in sample(&mut rng, n, n_sub).into_iter() {
                    w[i] = 1.0;
                }
                w
            } else {
                vec![1.0; n]
            };

            let mut tree = DecisionTreeRegressor::new(Some(self.max_depth), self.min_samples_split, self.min_samples_leaf);
            tree.max_features = self.max_features.unwrap_or(MaxFeatures::All);
            tree.seed = Some(rng.gen());
            tree.fit_weighted(x, &residuals, &weights)?;

            // Newton step per leaf over the in-bag rows
            let leaves = tree.apply(x)?;
            let mut sums: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
            for i in (0..n).filter(|&i| weights[i] > 0.0) {
                let r = residuals[i];
                let entry = sums.entry(leaves[i]).or_insert((0.0, 0.0));
                entry.0 += r;
                entry.1 += (yf[i] - r) * (1.0 - yf[i] + r);
            }
            for (leaf, (num, den)) in sums {
                let value = if den.abs() < 1e-150 { 0.0 } else { num / den };
                tree.set_leaf_value(leaf, value)?;
            }

            for (r, v) in raw.iter_mut().zip(tree.predict(x)?) {
                *r += self.learning_rate * v;
            }
            self.trees.push(tree);
        }

        debug!(
            n_estimators = self.n_estimators,
            subsample = self.subsample,
            "gradient boosting fitted"
        );
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|r| usize::from(r > 0.0))
            .collect())
    }

    fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        let raw = self.decision_function(x)?;
        let mut data = Vec::with_capacity(raw.len() * 2);
        for r in raw {
            let p = sigmoid(r);
            data.push(1.0 - p);
            data.push(p);
        }
        Matrix::new(data, x.rows(), 2)
    }

    fn n_classes(&self) -> usize {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{agreement, two_blobs};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gb_classifier() {
        let x = Matrix::from_rows(&[
            vec![0.0], vec![1.0], vec![2.0], vec![3.0],
            vec![7.0], vec![8.0], vec![9.0], vec![10.0],
        ])
        .unwrap();
        let y = [0, 0, 0, 0, 1, 1, 1, 1];

        let mut gb = GradientBoostingClassifier::new(20, 0.1, 2);
        gb.fit(&x, &y).unwrap();
        assert_eq!(gb.predict(&x).unwrap(), y);
        let proba = gb.predict_proba(&x).unwrap();
        assert!(proba.at(0, 0) > 0.5);
        assert!(proba.at(7, 1) > 0.5);
        assert_abs_diff_eq!(proba.at(3, 0) + proba.at(3, 1), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_first_stage_is_newton_step() {
        // balanced classes: prior 0, residuals +-0.5, so each pure leaf gets
        // 0.5 / 0.25 = 2 and the raw score moves by learning_rate * 2
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let y = [0, 0, 1, 1];
        let mut gb = GradientBoostingClassifier::new(1, 0.5, 1);
        gb.fit(&x, &y).unwrap();
        let raw = gb.decision_function(&x).unwrap();
        assert_abs_diff_eq!(raw[0], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(raw[3], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stochastic_variant_is_seeded() {
        let (x, y) = two_blobs(60, 1.8, 21);
        let mut a = GradientBoostingClassifier::stochastic(0.9, 0.7);
        let mut b = GradientBoostingClassifier::stochastic(0.9, 0.7);
        a.n_estimators = 30;
        b.n_estimators = 30;
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.decision_function(&x).unwrap(), b.decision_function(&x).unwrap());
        assert!(agreement(&a.predict(&x).unwrap(), &y) > 0.9);
    }

    #[test]
    fn test_predict_checks_feature_count() {
        let (x, y) = two_blobs(20, 1.0, 4);
        let mut gb = GradientBoostingClassifier::new(5, 0.1, 2);
        gb.fit(&x, &y).unwrap();
        let narrow = Matrix::zeros(2, 1);
        assert!(matches!(gb.decision_function(&narrow), Err(ClaimError::ShapeMismatch { .. })));
        assert!(matches!(gb.predict_proba(&narrow), Err(ClaimError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_rejects_multiclass_and_bad_params() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        assert!(matches!(
            GradientBoostingClassifier::default().fit(&x, &[0, 1, 2]),
            Err(ClaimError::UnsupportedTarget(_))
        ));
        let mut gb = GradientBoostingClassifier::default();
        gb.subsample = 0.0;
        assert!(gb.fit(&x, &[0, 1, 1]).is_err());
        assert!(GradientBoostingClassifier::default().predict(&x).is_err());
    }
}
