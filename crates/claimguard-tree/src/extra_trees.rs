use claimguard_core::{ClaimResult, Classifier, Matrix};

use crate::decision_tree::{Criterion, DecisionTreeClassifier, MaxFeatures, Splitter};
use crate::random_forest::{fit_forest, forest_proba, proba_to_labels};

/// Extremely randomized trees: every tree sees all rows, and each split
/// draws one random threshold per candidate feature.
#[derive(Debug, Clone)]
pub struct ExtraTreesClassifier {
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

impl Default for ExtraTreesClassifier {
    fn default() -> Self {
        ExtraTreesClassifier::new(100)
    }
}

impl ExtraTreesClassifier {
    pub fn new(n_estimators: usize) -> Self {
        ExtraTreesClassifier {
            n_estimators,
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: false,
            seed: Some(42),
            trees: Vec::new(),
            n_classes: 0,
        }
    }
}

impl Classifier for ExtraTreesClassifier {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        let mut template = DecisionTreeClassifier::new(self.max_depth, self.min_samples_split, self.min_samples_leaf);
        template.criterion = self.criterion;
        template.max_features = self.max_features;
        template.splitter = Splitter::Random;
        let (trees, n_classes) = fit_forest(&template, self.n_estimators, self.bootstrap, self.seed, x, y)?;
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
