use claimguard_core::{argmax, n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::decision_tree::DecisionTreeClassifier;

/// Probabilities are clipped to this before taking logs.
const PROBA_FLOOR: f64 = f64::EPSILON;

/// Boosting variant: discrete (`SAMME`) or real, probability-based (`SAMME.R`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaBoostAlgorithm {
    #[serde(rename = "SAMME")]
    Samme,
    #[serde(rename = "SAMME.R")]
    SammeR,
}

impl FromStr for AdaBoostAlgorithm {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SAMME" => Ok(AdaBoostAlgorithm::Samme),
            "SAMME.R" => Ok(AdaBoostAlgorithm::SammeR),
            other => Err(ClaimError::param("algorithm", format!("unknown value `{}`", other))),
        }
    }
}

/// AdaBoost over depth-1 decision trees (stumps).
#[derive(Debug, Clone)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub algorithm: AdaBoostAlgorithm,
    stumps: Vec<DecisionTreeClassifier>,
    weights: Vec<f64>,
    n_classes: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        AdaBoostClassifier::new(50, 1.0, AdaBoostAlgorithm::SammeR)
    }
}

enum Round {
    Keep(DecisionTreeClassifier, f64),
    /// Perfect fit: keep the learner and stop.
    Last(DecisionTreeClassifier, f64),
    Stop,
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64, algorithm: AdaBoostAlgorithm) -> Self {
        AdaBoostClassifier {
            n_estimators,
            learning_rate,
            algorithm,
            stumps: Vec::new(),
            weights: Vec::new(),
            n_classes: 0,
        }
    }

    /// Number of learners kept after early stopping.
    pub fn n_fitted(&self) -> usize {
        self.stumps.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.weights
    }

    fn stump(x: &Matrix, y: &[usize], w: &[f64], k: usize) -> ClaimResult<DecisionTreeClassifier> {
        let mut stump = DecisionTreeClassifier::new(Some(1), 2, 1);
        stump.fit_with_classes(x, y, w, k)?;
        Ok(stump)
    }

    fn boost_discrete(&self, round: usize, x: &Matrix, y: &[usize], w: &mut [f64], k: usize) -> ClaimResult<Round> {
        let stump = Self::stump(x, y, w, k)?;
        let pred = stump.predict(x)?;
        let incorrect: Vec<bool> = pred.iter().zip(y).map(|(p, t)| p != t).collect();
        let total: f64 = w.iter().sum();
        let err = w.iter().zip(&incorrect).filter(|(_, &bad)| bad).map(|(wi, _)| wi).sum::<f64>() / total;

        if err <= 0.0 {
            return Ok(Round::Last(stump, 1.0));
        }
        if err >= 1.0 - 1.0 / k as f64 {
            if round == 0 {
                return Err(ClaimError::InvalidOperation(
                    "first AdaBoost learner is no better than random guessing".to_string(),
                ));
            }
            return Ok(Round::Stop);
        }

        let alpha = self.learning_rate * (((1.0 - err) / err).ln() + (k as f64 - 1.0).ln());
        for (wi, &bad) in w.iter_mut().zip(&incorrect) {
            if bad && *wi > 0.0 {
                *wi *= alpha.exp();
            }
        }
        Ok(Round::Keep(stump, alpha))
    }

    fn boost_real(&self, x: &Matrix, y: &[usize], w: &mut [f64], k: usize) -> ClaimResult<Round> {
        let stump = Self::stump(x, y, w, k)?;
        let proba = stump.predict_proba(x)?;
        let total: f64 = w.iter().sum();
        let err = (0..x.rows())
            .filter(|&i| argmax(proba.row(i)) != y[i])
            .map(|i| w[i])
            .sum::<f64>()
            / total;
        if err <= 0.0 {
            return Ok(Round::Last(stump, 1.0));
        }

        let kf = k as f64;
        let off = -1.0 / (kf - 1.0);
        for (i, wi) in w.iter_mut().enumerate() {
            let dot: f64 = proba
                .row(i)
                .iter()
                .enumerate()
                .map(|(c, &p)| {
                    let code = if c == y[i] { 1.0 } else { off };
                    code * p.max(PROBA_FLOOR).ln()
                })
                .sum();
            let exponent = -self.learning_rate * (kf - 1.0) / kf * dot;
            if *wi > 0.0 || exponent < 0.0 {
                *wi *= exponent.exp();
            }
        }
        Ok(Round::Keep(stump, 1.0))
    }

    /// Per-class scores summed over the learners, normalised by the total
    /// learner weight.
    fn decision(&self, x: &Matrix) -> ClaimResult<Matrix> {
        if self.stumps.is_empty() {
            return Err(ClaimError::NotFitted("predict()"));
        }
        let k = self.n_classes;
        let mut scores = Matrix::zeros(x.rows(), k);
        for (stump, &alpha) in self.stumps.iter().zip(&self.weights) {
            match self.algorithm {
                AdaBoostAlgorithm::Samme => {
                    for (i, c) in stump.predict(x)?.into_iter().enumerate() {
                        scores.set(i, c, scores.at(i, c) + alpha)?;
                    }
                }
                AdaBoostAlgorithm::SammeR => {
                    let proba = stump.predict_proba(x)?;
                    for i in 0..x.rows() {
                        let logs: Vec<f64> = proba.row(i).iter().map(|p| p.max(PROBA_FLOOR).ln()).collect();
                        let mean = logs.iter().sum::<f64>() / k as f64;
                        for (c, l) in logs.iter().enumerate() {
                            scores.set(i, c, scores.at(i, c) + (k as f64 - 1.0) * (l - mean))?;
                        }
                    }
                }
            }
        }
        let total: f64 = self.weights.iter().sum();
        scores.apply_mut(|s| s / total);
        Ok(scores)
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        if self.n_estimators == 0 {
            return Err(ClaimError::param("n_estimators", "must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ClaimError::param("learning_rate", "must be positive"));
        }
        let k = n_classes_of(x, y)?.max(2);
        let n = x.rows();
        let mut w = vec![1.0 / n as f64; n];
        self.stumps.clear();
        self.weights.clear();
        self.n_classes = k;

        for round in 0..self.n_estimators {
            let outcome = match self.algorithm {
                AdaBoostAlgorithm::Samme => self.boost_discrete(round, x, y, &mut w, k)?,
                AdaBoostAlgorithm::SammeR => self.boost_real(x, y, &mut w, k)?,
            };
            match outcome {
                Round::Keep(stump, alpha) => {
                    self.stumps.push(stump);
                    self.weights.push(alpha);
                }
                Round::Last(stump, alpha) => {
                    self.stumps.push(stump);
                    self.weights.push(alpha);
                    break;
                }
                Round::Stop => break,
            }
            let sum: f64 = w.iter().sum();
            if !sum.is_finite() || sum <= 0.0 {
                break;
            }
            w.iter_mut().for_each(|wi| *wi /= sum);
        }

        debug!(
            algorithm = ?self.algorithm,
            kept = self.stumps.len(),
            requested = self.n_estimators,
            "adaboost fitted"
        );
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        let scores = self.decision(x)?;
        Ok((0..x.rows()).map(|i| argmax(scores.row(i))).collect())
    }

    fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        let mut scores = self.decision(x)?;
        let k = self.n_classes as f64;
        for i in 0..scores.rows() {
            let row: Vec<f64> = scores.row(i).iter().map(|s| s / (k - 1.0)).collect();
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exps: Vec<f64> = row.iter().map(|s| (s - max).exp()).collect();
            let z: f64 = exps.iter().sum();
            for (c, e) in exps.iter().enumerate() {
                scores.set(i, c, e / z)?;
            }
        }
        Ok(scores)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{agreement, two_blobs};

    /// Interval data that no single stump separates.
    fn band() -> (Matrix, Vec<usize>) {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let y = (0..30).map(|i| usize::from((10..20).contains(&i))).collect();
        (Matrix::from_rows(&rows).unwrap(), y)
    }

    #[test]
    fn test_samme_combines_stumps() {
        let (x, y) = band();
        let mut ada = AdaBoostClassifier::new(200, 1.0, AdaBoostAlgorithm::Samme);
        ada.fit(&x, &y).unwrap();
        assert!(ada.n_fitted() > 1);
        // a single stump tops out at 2/3 on this data
        assert!(agreement(&ada.predict(&x).unwrap(), &y) >= 0.9);
    }

    #[test]
    fn test_samme_r_on_blobs() {
        let (x, y) = two_blobs(40, 1.7, 1);
        let mut ada = AdaBoostClassifier::default();
        ada.fit(&x, &y).unwrap();
        assert!(agreement(&ada.predict(&x).unwrap(), &y) > 0.9);
        let proba = ada.predict_proba(&x).unwrap();
        for i in 0..x.rows() {
            let s: f64 = proba.row(i).iter().sum();
            assert!((s - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_perfect_stump_stops_early() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let y = [0, 0, 1, 1];
        for algorithm in [AdaBoostAlgorithm::Samme, AdaBoostAlgorithm::SammeR] {
            let mut ada = AdaBoostClassifier::new(20, 0.5, algorithm);
            ada.fit(&x, &y).unwrap();
            assert_eq!(ada.n_fitted(), 1);
            assert_eq!(ada.estimator_weights(), &[1.0]);
            assert_eq!(ada.predict(&x).unwrap(), y);
        }
    }

    #[test]
    fn test_predict_checks_feature_count() {
        let (x, y) = band();
        for algorithm in [AdaBoostAlgorithm::Samme, AdaBoostAlgorithm::SammeR] {
            let mut ada = AdaBoostClassifier::new(10, 1.0, algorithm);
            ada.fit(&x, &y).unwrap();
            let wide = Matrix::zeros(3, 2);
            assert!(matches!(ada.predict(&wide), Err(ClaimError::ShapeMismatch { .. })));
            assert!(matches!(ada.predict_proba(&wide), Err(ClaimError::ShapeMismatch { .. })));
        }
    }

    #[test]
    fn test_huge_learning_rate_does_not_fail() {
        let (x, y) = band();
        let mut ada = AdaBoostClassifier::new(200, 10.0, AdaBoostAlgorithm::Samme);
        ada.fit(&x, &y).unwrap();
        assert!(ada.n_fitted() >= 1);
        assert!(ada.predict(&x).is_ok());
    }

    #[test]
    fn test_algorithm_from_str_and_params() {
        assert_eq!("samme.r".parse::<AdaBoostAlgorithm>().unwrap(), AdaBoostAlgorithm::SammeR);
        assert_eq!("SAMME".parse::<AdaBoostAlgorithm>().unwrap(), AdaBoostAlgorithm::Samme);
        assert!("adam".parse::<AdaBoostAlgorithm>().is_err());

        let (x, y) = band();
        assert!(AdaBoostClassifier::new(0, 1.0, AdaBoostAlgorithm::Samme).fit(&x, &y).is_err());
        assert!(AdaBoostClassifier::new(5, 0.0, AdaBoostAlgorithm::Samme).fit(&x, &y).is_err());
    }
}
