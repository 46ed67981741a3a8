use claimguard_core::{n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use claimguard_preprocessing::StratifiedKFold;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::params::{format_params, ParamGrid, ParamSet};
use crate::validation::{cross_val_score, ClassifierFactory};

/// Cross-validated score of one candidate; NaN when fitting failed.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub mean_score: f64,
    pub rank: usize,
}

/// Exhaustive search over a [`ParamGrid`] with stratified k-fold
/// cross-validation, refitting the best candidate on all the data.
pub struct GridSearchCV<F> {
    factory: F,
    pub grid: ParamGrid,
    pub cv: usize,
    results: Vec<CandidateScore>,
    best_index: Option<usize>,
    best_estimator: Option<Box<dyn Classifier>>,
}

impl<F: ClassifierFactory> GridSearchCV<F> {
    pub fn new(factory: F, grid: ParamGrid, cv: usize) -> Self {
        GridSearchCV {
            factory,
            grid,
            cv,
            results: Vec::new(),
            best_index: None,
            best_estimator: None,
        }
    }

    pub fn results(&self) -> &[CandidateScore] {
        &self.results
    }

    pub fn best_params(&self) -> Option<&ParamSet> {
        self.best_index.map(|i| &self.results[i].params)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_index.map(|i| self.results[i].mean_score)
    }

    pub fn best_estimator(&self) -> Option<&dyn Classifier> {
        self.best_estimator.as_deref()
    }

    pub fn into_best_estimator(self) -> Option<Box<dyn Classifier>> {
        self.best_estimator
    }

    /// A fresh, unfitted copy of the winning configuration.
    pub fn build_best(&self) -> ClaimResult<Box<dyn Classifier>> {
        let params = self.best_params().ok_or(ClaimError::NotFitted("build_best()"))?;
        (self.factory)(params)
    }
}

impl<F: ClassifierFactory> Classifier for GridSearchCV<F> {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        n_classes_of(x, y)?;
        let candidates = self.grid.candidates()?;
        let folds = StratifiedKFold::new(self.cv).split(y)?;
        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            folds.len(),
            candidates.len(),
            folds.len() * candidates.len()
        );

        let factory = &self.factory;
        let scores: Vec<f64> = candidates
            .par_iter()
            .map(|params| match cross_val_score(factory, params, x, y, &folds) {
                Ok(score) => score,
                Err(e) => {
                    warn!(params = %format_params(params), error = %e, "candidate failed; scored NaN");
                    f64::NAN
                }
            })
            .collect();

        let mut best: Option<usize> = None;
        for (i, &s) in scores.iter().enumerate() {
            if !s.is_nan() && best.map_or(true, |b| s > scores[b]) {
                best = Some(i);
            }
        }
        let best = best.ok_or_else(|| {
            ClaimError::InvalidOperation("every grid-search candidate failed to fit".to_string())
        })?;

        self.results = candidates
            .into_iter()
            .zip(&scores)
            .map(|(params, &mean_score)| CandidateScore {
                params,
                mean_score,
                rank: 1 + scores.iter().filter(|&&o| o > mean_score).count(),
            })
            .collect();
        for r in self.results.iter_mut().filter(|r| r.mean_score.is_nan()) {
            r.rank = scores.len();
        }

        let mut estimator = (self.factory)(&self.results[best].params)?;
        estimator.fit(x, y)?;
        info!(
            best_params = %format_params(&self.results[best].params),
            best_score = self.results[best].mean_score,
            "grid search finished"
        );
        self.best_index = Some(best);
        self.best_estimator = Some(estimator);
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        self.best_estimator
            .as_ref()
            .ok_or(ClaimError::NotFitted("predict()"))?
            .predict(x)
    }

    fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        self.best_estimator
            .as_ref()
            .ok_or(ClaimError::NotFitted("predict_proba()"))?
            .predict_proba(x)
    }

    fn n_classes(&self) -> usize {
        self.best_estimator.as_ref().map_or(0, |e| e.n_classes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::require;
    use claimguard_tree::DecisionTreeClassifier;

    fn tree_factory(params: &ParamSet) -> ClaimResult<Box<dyn Classifier>> {
        let depth = require(params, "max_depth")?.as_usize()?;
        Ok(Box::new(DecisionTreeClassifier::new(Some(depth), 2, 1)))
    }

    /// Class is 1 inside [10, 20): needs depth 2.
    fn band(n: usize) -> (Matrix, Vec<usize>) {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![(i % 30) as f64]).collect();
        let y = (0..n).map(|i| usize::from((10..20).contains(&(i % 30)))).collect();
        (Matrix::from_rows(&rows).unwrap(), y)
    }

    #[test]
    fn test_grid_search_picks_deeper_tree() {
        let (x, y) = band(90);
        let grid = ParamGrid::new().add("max_depth", vec![1i64, 2, 3]);
        let mut search = GridSearchCV::new(tree_factory, grid, 3);
        search.fit(&x, &y).unwrap();
        // depth 2 and 3 both score 1.0; the earlier candidate wins
        assert_eq!(search.best_params().unwrap()["max_depth"].as_usize().unwrap(), 2);
        assert_eq!(search.best_score().unwrap(), 1.0);
        assert_eq!(search.results()[0].rank, 3);
        assert_eq!(search.predict(&x).unwrap(), y);
        assert!(search.build_best().is_ok());
    }

    #[test]
    fn test_failed_candidates_score_nan() {
        let (x, y) = band(60);
        // depth 0 is rejected by the tree
        let grid = ParamGrid::new().add("max_depth", vec![0i64, 2]);
        let mut search = GridSearchCV::new(tree_factory, grid, 2);
        search.fit(&x, &y).unwrap();
        assert!(search.results()[0].mean_score.is_nan());
        assert_eq!(search.best_params().unwrap()["max_depth"].as_usize().unwrap(), 2);

        let grid = ParamGrid::new().add("max_depth", vec![0i64]);
        let mut search = GridSearchCV::new(tree_factory, grid, 2);
        assert!(search.fit(&x, &y).is_err());
        assert!(search.best_params().is_none());
    }
}
