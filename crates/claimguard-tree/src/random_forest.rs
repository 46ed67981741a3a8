use claimguard_core::{argmax, n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::decision_tree::{Criterion, DecisionTreeClassifier, MaxFeatures, Splitter};

/// Fit `n_estimators` copies of `template` in parallel.
///
/// Per-tree seeds are drawn up front from `seed`, so the result does not
/// depend on thread scheduling. With `bootstrap`, each tree sees a
/// resample of the rows expressed as integer sample weights.
pub(crate) fn fit_forest(
    template: &DecisionTreeClassifier,
    n_estimators: usize,
    bootstrap: bool,
    seed: Option<u64>,
    x: &Matrix,
    y: &[usize],
) -> ClaimResult<(Vec<DecisionTreeClassifier>, usize)> {
    if n_estimators == 0 {
        return Err(ClaimError::param("n_estimators", "must be at least 1"));
    }
    let n_classes = n_classes_of(x, y)?;
    let n = x.rows();
    let mut base_rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let tree_seeds: Vec<u64> = (0..n_estimators).map(|_| base_rng.gen()).collect();

    let trees = tree_seeds
        .into_par_iter()
        .map(|tree_seed| {
            let mut rng = StdRng::seed_from_u64(tree_seed);
            let weights = if bootstrap {
                let mut counts = vec![0.0; n];
                for _ in 0..n {
                    counts[rng.gen_range(0..n)] += 1.0;
                }
                counts
            } else {
                vec![1.0; n]
            };
            let mut tree = template.clone();
            tree.seed = Some(rng.gen());
            tree.fit_with_classes(x, y, &weights, n_classes)?;
            Ok(tree)
        })
        .collect::<ClaimResult<Vec<_>>>()?;

    debug!(
        n_estimators,
        mean_depth = trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / trees.len() as f64,
        "forest fitted"
    );
    Ok((trees, n_classes))
}

/// Mean of the member trees' class distributions.
pub(crate) fn forest_proba(trees: &[DecisionTreeClassifier], n_classes: usize, x: &Matrix) -> ClaimResult<Matrix> {
    if trees.is_empty() {
        return Err(ClaimError::NotFitted("predict_proba()"));
    }
    let mut sum = vec![0.0; x.rows() * n_classes];
    for tree in trees {
        let proba = tree.predict_proba(x)?;
        for (s, p) in sum.iter_mut().zip(proba.data()) {
            *s += p;
        }
    }
    let m = trees.len() as f64;
    sum.iter_mut().for_each(|s| *s /= m);
    Matrix::new(sum, x.rows(), n_classes)
}

pub(crate) fn proba_to_labels(proba: &Matrix) -> Vec<usize> {
    (0..proba.rows()).map(|i| argmax(proba.row(i))).collect()
}

/// Random Forest Classifier: bagged decision trees with per-split feature
/// subsampling. Predictions average the trees' probabilities.
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    pub n_estimators: usize,
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: Option<u64>,
    trees: Vec<DecisionTreeClassifier>,
    n_classes: usize,
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        RandomForestClassifier::new(100, None)
    }
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize, max_depth: Option<usize>) -> Self {
        RandomForestClassifier {
            n_estimators,
            criterion: Criterion::Gini,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: Some(42),
            trees: Vec::new(),
            n_classes: 0,
        }
    }

    fn template(&self) -> DecisionTreeClassifier {
        let mut tree = DecisionTreeClassifier::new(self.max_depth, self.min_samples_split, self.min_samples_leaf);
        tree.criterion = self.criterion;
        tree.max_features = self.max_features;
        tree.splitter = Splitter::Best;
        tree
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        let (trees, n_classes) = fit_forest(&self.template(), self.n_estimators, self.bootstrap, self.seed, x, y)?;
        self.trees = trees;
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        Ok(proba_to_labels(&self.predict_proba(x)?))
    }

    fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        forest_proba(&self.trees, self.n_classes, x)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}
