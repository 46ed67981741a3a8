use crate::builder::{grow_tree, GrowParams, Impurity, SplitSearch, Targets, Tree};
use claimguard_core::{argmax, n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Split quality measure for classification trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Gini,
    Entropy,
}

impl FromStr for Criterion {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            other => Err(ClaimError::param("criterion", format!("unknown value `{}`", other))),
        }
    }
}

impl From<Criterion> for Impurity {
    fn from(c: Criterion) -> Self {
        match c {
            Criterion::Gini => Impurity::Gini,
            Criterion::Entropy => Impurity::Entropy,
        }
    }
}

/// Number of features examined when looking for each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Fraction(f64),
    Count(usize),
}

impl MaxFeatures {
    /// Resolve against `n_features`; always at least 1.
    pub fn resolve(&self, n_features: usize) -> ClaimResult<usize> {
        let p = n_features as f64;
        let k = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => p.sqrt() as usize,
            MaxFeatures::Log2 => p.log2() as usize,
            MaxFeatures::Fraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(ClaimError::param("max_features", "fraction must lie in (0, 1]"));
                }
                (f * p) as usize
            }
            MaxFeatures::Count(c) => {
                if c == 0 || c > n_features {
                    return Err(ClaimError::param(
                        "max_features",
                        format!("count must lie in 1..={}", n_features),
                    ));
                }
                c
            }
        };
        Ok(k.max(1))
    }
}

/// Split strategy: exhaustive best threshold, or one random threshold per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Splitter {
    Best,
    Random,
}

impl From<Splitter> for SplitSearch {
    fn from(s: Splitter) -> Self {
        match s {
            Splitter::Best => SplitSearch::Best,
            Splitter::Random => SplitSearch::Random,
        }
    }
}

fn validate(max_depth: Option<usize>, min_samples_split: usize, min_samples_leaf: usize) -> ClaimResult<()> {
    if max_depth == Some(0) {
        return Err(ClaimError::param("max_depth", "must be at least 1"));
    }
    if min_samples_split < 2 {
        return Err(ClaimError::param("min_samples_split", "must be at least 2"));
    }
    if min_samples_leaf < 1 {
        return Err(ClaimError::param("min_samples_leaf", "must be at least 1"));
    }
    Ok(())
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Decision Tree Classifier using CART (Gini or entropy), with sample weights.
#[derive(Debug, Clone)]
pub struct DecisionTreeClassifier {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub splitter: Splitter,
    pub seed: Option<u64>,
    tree: Option<Tree>,
    n_classes: usize,
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        DecisionTreeClassifier::new(None, 2, 1)
    }
}

impl DecisionTreeClassifier {
    pub fn new(max_depth: Option<usize>, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        DecisionTreeClassifier {
            criterion: Criterion::Gini,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features: MaxFeatures::All,
            splitter: Splitter::Best,
            seed: Some(0),
            tree: None,
            n_classes: 0,
        }
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Fit with per-sample weights; rows with zero weight are ignored.
    pub fn fit_weighted(&mut self, x: &Matrix, y: &[usize], sample_weight: &[f64]) -> ClaimResult<()> {
        let n_classes = n_classes_of(x, y)?;
        self.fit_with_classes(x, y, sample_weight, n_classes)
    }

    /// Fit against a fixed class count (ensembles pass the full count even
    /// when a resample misses a class).
    pub(crate) fn fit_with_classes(
        &mut self,
        x: &Matrix,
        y: &[usize],
        sample_weight: &[f64],
        n_classes: usize,
    ) -> ClaimResult<()> {
        validate(self.max_depth, self.min_samples_split, self.min_samples_leaf)?;
        let params = GrowParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(x.cols())?,
            search: self.splitter.into(),
            impurity: self.criterion.into(),
        };
        let mut rng = rng_from(self.seed);
        self.tree = Some(grow_tree(
            x,
            Targets::Classes(y, n_classes),
            sample_weight,
            &params,
            &mut rng,
        )?);
        self.n_classes = n_classes;
        Ok(())
    }

    fn fitted(&self, x: &Matrix) -> ClaimResult<&Tree> {
        let tree = self.tree.as_ref().ok_or(ClaimError::NotFitted("predict()"))?;
        tree.check_width(x)?;
        Ok(tree)
    }

    pub fn depth(&self) -> usize {
        self.tree.as_ref().map_or(0, Tree::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.tree.as_ref().map_or(0, Tree::n_leaves)
    }
}

impl Classifier for DecisionTreeClassifier {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        self.fit_weighted(x, y, &vec![1.0; y.len()])
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        let tree = self.fitted(x)?;
        Ok((0..x.rows()).map(|i| argmax(tree.leaf_value(x.row(i)))).collect())
    }

    fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        let tree = self.fitted(x)?;
        let mut data = Vec::with_capacity(x.rows() * self.n_classes);
        for i in 0..x.rows() {
            data.extend_from_slice(tree.leaf_value(x.row(i)));
        }
        Matrix::new(data, x.rows(), self.n_classes)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}

/// Decision Tree Regressor using CART (squared error); the base learner of
/// gradient boosting.
#[derive(Debug, Clone)]
pub struct DecisionTreeRegressor {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: Option<u64>,
    tree: Option<Tree>,
}

impl DecisionTreeRegressor {
    pub fn new(max_depth: Option<usize>, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        DecisionTreeRegressor {
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features: MaxFeatures::All,
            seed: Some(0),
            tree: None,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[f64]) -> ClaimResult<()> {
        self.fit_weighted(x, y, &vec![1.0; y.len()])
    }

    /// Fit with per-sample weights; rows with zero weight are ignored.
    pub fn fit_weighted(&mut self, x: &Matrix, y: &[f64], sample_weight: &[f64]) -> ClaimResult<()> {
        validate(self.max_depth, self.min_samples_split, self.min_samples_leaf)?;
        let params = GrowParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(x.cols())?,
            search: SplitSearch::Best,
            impurity: Impurity::SquaredError,
        };
        let mut rng = rng_from(self.seed);
        self.tree = Some(grow_tree(x, Targets::Values(y), sample_weight, &params, &mut rng)?);
        Ok(())
    }

    fn fitted(&self, x: &Matrix) -> ClaimResult<&Tree> {
        let tree = self.tree.as_ref().ok_or(ClaimError::NotFitted("predict()"))?;
        tree.check_width(x)?;
        Ok(tree)
    }

    pub fn predict(&self, x: &Matrix) -> ClaimResult<Vec<f64>> {
        let tree = self.fitted(x)?;
        Ok((0..x.rows()).map(|i| tree.leaf_value(x.row(i))[0]).collect())
    }

    /// Leaf id reached by each row.
    pub fn apply(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        let tree = self.fitted(x)?;
        Ok((0..x.rows()).map(|i| tree.leaf_index(x.row(i))).collect())
    }

    /// Replace the prediction stored in leaf `leaf`.
    pub fn set_leaf_value(&mut self, leaf: usize, value: f64) -> ClaimResult<()> {
        let tree = self.tree.as_mut().ok_or(ClaimError::NotFitted("set_leaf_value()"))?;
        tree.set_leaf_value(leaf, vec![value]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::two_blobs;

    #[test]
    fn test_decision_tree_classifier() {
        let x = Matrix::from_rows(&[
            vec![0.0], vec![1.0], vec![2.0], vec![3.0],
            vec![4.0], vec![5.0], vec![6.0], vec![7.0],
        ])
        .unwrap();
        let y = [0, 0, 0, 0, 1, 1, 1, 1];

        let mut tree = DecisionTreeClassifier::default();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_entropy_tree_fits_xor() {
        let x = Matrix::from_rows(&[
            vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0],
        ])
        .unwrap();
        let y = [0, 1, 1, 0];
        let mut tree = DecisionTreeClassifier::default().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.n_leaves(), 4);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let (x, y) = two_blobs(40, 0.9, 3);
        let mut tree = DecisionTreeClassifier::new(Some(2), 2, 1);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2);
        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), (40, 2));
        for i in 0..40 {
            let s: f64 = proba.row(i).iter().sum();
            assert!((s - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_params_and_unfitted() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0]]).unwrap();
        let mut tree = DecisionTreeClassifier::new(Some(0), 2, 1);
        assert!(tree.fit(&x, &[0, 1]).is_err());
        let mut tree = DecisionTreeClassifier::new(None, 1, 1);
        assert!(tree.fit(&x, &[0, 1]).is_err());
        assert!(DecisionTreeClassifier::default().predict(&x).is_err());
    }

    #[test]
    fn test_predict_checks_feature_count() {
        let x = Matrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 1.0], vec![3.0, 0.0]]).unwrap();
        let mut tree = DecisionTreeClassifier::default();
        tree.fit(&x, &[0, 0, 1, 1]).unwrap();
        for width in [1, 3] {
            let other = Matrix::zeros(1, width);
            assert!(matches!(tree.predict(&other), Err(ClaimError::ShapeMismatch { .. })));
            assert!(matches!(tree.predict_proba(&other), Err(ClaimError::ShapeMismatch { .. })));
        }

        let mut reg = DecisionTreeRegressor::new(None, 2, 1);
        reg.fit(&x, &[0.0, 1.0, 2.0, 3.0]).unwrap();
        let narrow = Matrix::zeros(2, 1);
        assert!(matches!(reg.predict(&narrow), Err(ClaimError::ShapeMismatch { .. })));
        assert!(matches!(reg.apply(&narrow), Err(ClaimError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(60).unwrap(), 7);
        assert_eq!(MaxFeatures::Log2.resolve(60).unwrap(), 5);
        assert_eq!(MaxFeatures::Fraction(0.7).resolve(60).unwrap(), 42);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10).unwrap(), 1);
        assert!(MaxFeatures::Count(61).resolve(60).is_err());
        assert!(MaxFeatures::Fraction(1.5).resolve(60).is_err());
    }

    #[test]
    fn test_criterion_from_str() {
        assert_eq!("gini".parse::<Criterion>().unwrap(), Criterion::Gini);
        assert_eq!("Entropy".parse::<Criterion>().unwrap(), Criterion::Entropy);
        assert!("mse".parse::<Criterion>().is_err());
    }

    #[test]
    fn test_regressor_apply_and_override() {
        let x = Matrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0], vec![4.0]]).unwrap();
        let y = [2.0, 4.0, 6.0, 8.0];
        let mut tree = DecisionTreeRegressor::new(Some(1), 2, 1);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![3.0, 3.0, 7.0, 7.0]);

        let leaves = tree.apply(&x).unwrap();
        assert_eq!(leaves[0], leaves[1]);
        assert_ne!(leaves[1], leaves[2]);
        tree.set_leaf_value(leaves[0], -1.0).unwrap();
        assert_eq!(tree.predict(&x).unwrap()[0], -1.0);
    }
}
