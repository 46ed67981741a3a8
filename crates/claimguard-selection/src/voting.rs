use claimguard_core::{argmax, n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voting {
    /// Majority of predicted labels.
    #[default]
    Hard,
    /// Argmax of the averaged class probabilities.
    Soft,
}

/// Combines named classifiers by hard or soft voting. `fit` refits every
/// member on the given data.
pub struct VotingClassifier {
    pub estimators: Vec<(String, Box<dyn Classifier>)>,
    pub voting: Voting,
    n_classes: usize,
}

impl VotingClassifier {
    pub fn new(estimators: Vec<(String, Box<dyn Classifier>)>, voting: Voting) -> Self {
        VotingClassifier {
            estimators,
            voting,
            n_classes: 0,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.estimators.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn averaged_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        let mut sum = Matrix::zeros(x.rows(), self.n_classes);
        for (name, est) in &self.estimators {
            let proba = est.predict_proba(x).map_err(|e| {
                ClaimError::InvalidOperation(format!("soft voting needs probabilities from `{}`: {}", name, e))
            })?;
            for i in 0..x.rows() {
                for c in 0..self.n_classes.min(proba.cols()) {
                    sum.set(i, c, sum.at(i, c) + proba.at(i, c))?;
                }
            }
        }
        let m = self.estimators.len() as f64;
        sum.apply_mut(|v| v / m);
        Ok(sum)
    }
}

impl Classifier for VotingClassifier {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        if self.estimators.is_empty() {
            return Err(ClaimError::param("estimators", "at least one estimator is required"));
        }
        self.n_classes = n_classes_of(x, y)?;
        self.estimators
            .par_iter_mut()
            .map(|(name, est)| {
                debug!(estimator = %name, "fitting voting member");
                est.fit(x, y)
            })
            .collect::<ClaimResult<Vec<()>>>()?;
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        if self.n_classes == 0 {
            return Err(ClaimError::NotFitted("predict()"));
        }
        match self.voting {
            Voting::Hard => {
                let mut votes = vec![vec![0.0; self.n_classes]; x.rows()];
                for (_, est) in &self.estimators {
                    for (row, c) in votes.iter_mut().zip(est.predict(x)?) {
                        if c < self.n_classes {
                            row[c] += 1.0;
                        }
                    }
                }
                Ok(votes.iter().map(|v| argmax(v)).collect())
            }
            Voting::Soft => {
                let proba = self.averaged_proba(x)?;
                Ok((0..x.rows()).map(|i| argmax(proba.row(i))).collect())
            }
        }
    }

    fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        if self.n_classes == 0 {
            return Err(ClaimError::NotFitted("predict_proba()"));
        }
        match self.voting {
            Voting::Soft => self.averaged_proba(x),
            Voting::Hard => Err(ClaimError::InvalidOperation(
                "predict_proba is not available with hard voting".to_string(),
            )),
        }
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always predicts one class with full confidence.
    struct Constant(usize);

    impl Classifier for Constant {
        fn fit(&mut self, _x: &Matrix, _y: &[usize]) -> ClaimResult<()> {
            Ok(())
        }
        fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
            Ok(vec![self.0; x.rows()])
        }
        fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
            let mut m = Matrix::zeros(x.rows(), 2);
            for i in 0..x.rows() {
                m.set(i, self.0, 0.9)?;
                m.set(i, 1 - self.0, 0.1)?;
            }
            Ok(m)
        }
        fn n_classes(&self) -> usize {
            2
        }
    }

    fn members(classes: &[usize]) -> Vec<(String, Box<dyn Classifier>)> {
        classes
            .iter()
            .enumerate()
            .map(|(i, &c)| (format!("m{}", i), Box::new(Constant(c)) as Box<dyn Classifier>))
            .collect()
    }

    fn data() -> (Matrix, Vec<usize>) {
        (Matrix::from_rows(&[vec![0.0], vec![1.0]]).unwrap(), vec![0, 1])
    }

    #[test]
    fn test_hard_majority() {
        let (x, y) = data();
        let mut vc = VotingClassifier::new(members(&[1, 0, 1]), Voting::Hard);
        vc.fit(&x, &y).unwrap();
        assert_eq!(vc.predict(&x).unwrap(), vec![1, 1]);
        assert!(vc.predict_proba(&x).is_err());
        assert_eq!(vc.names(), vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn test_hard_tie_goes_to_lowest_class() {
        let (x, y) = data();
        let mut vc = VotingClassifier::new(members(&[1, 0]), Voting::Hard);
        vc.fit(&x, &y).unwrap();
        assert_eq!(vc.predict(&x).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_soft_averages_probabilities() {
        let (x, y) = data();
        let mut vc = VotingClassifier::new(members(&[1, 0, 1]), Voting::Soft);
        vc.fit(&x, &y).unwrap();
        let proba = vc.predict_proba(&x).unwrap();
        assert!((proba.at(0, 1) - (0.9 + 0.1 + 0.9) / 3.0).abs() < 1e-12);
        assert_eq!(vc.predict(&x).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_empty_and_unfitted() {
        let (x, y) = data();
        assert!(VotingClassifier::new(Vec::new(), Voting::Hard).fit(&x, &y).is_err());
        assert!(VotingClassifier::new(members(&[0]), Voting::Hard).predict(&x).is_err());
    }
}
