use claimguard_core::{argmax, n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use rayon::prelude::*;

/// Distance metric for KNN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

/// K-Nearest Neighbors Classifier with uniform voting.
///
/// Neighbours at equal distance keep their training order; a tied vote goes
/// to the smallest class index.
#[derive(Debug, Clone)]
pub struct KNNClassifier {
    pub k: usize,
    pub metric: DistanceMetric,
    x_train: Option<Matrix>,
    y_train: Vec<usize>,
    n_classes: usize,
}

impl KNNClassifier {
    pub fn new(k: usize, metric: DistanceMetric) -> Self {
        KNNClassifier {
            k,
            metric,
            x_train: None,
            y_train: Vec::new(),
            n_classes: 0,
        }
    }

    /// Vote counts per class for each query row.
    fn votes(&self, x: &Matrix) -> ClaimResult<Vec<Vec<usize>>> {
        let train = self.x_train.as_ref().ok_or(ClaimError::NotFitted("predict()"))?;
        if x.cols() != train.cols() {
            return Err(ClaimError::ShapeMismatch {
                expected: vec![train.cols()],
                got: vec![x.cols()],
            });
        }
        Ok((0..x.rows())
            .into_par_iter()
            .map(|i| {
                let query = x.row(i);
                let mut dists: Vec<(f64, usize)> = (0..train.rows())
                    .map(|j| (self.metric.distance(query, train.row(j)), j))
                    .collect();
                dists.sort_by(|a, b| a.0.total_cmp(&b.0));
                let mut votes = vec![0usize; self.n_classes];
                for &(_, j) in dists.iter().take(self.k) {
                    votes[self.y_train[j]] += 1;
                }
                votes
            })
            .collect())
    }
}

impl Classifier for KNNClassifier {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        let n_classes = n_classes_of(x, y)?;
        if self.k == 0 {
            return Err(ClaimError::param("k", "must be at least 1"));
        }
        if self.k > x.rows() {
            return Err(ClaimError::param(
                "k",
                format!("{} exceeds the {} training samples", self.k, x.rows()),
            ));
        }
        self.x_train = Some(x.clone());
        self.y_train = y.to_vec();
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        Ok(self
            .votes(x)?
            .into_iter()
            .map(|v| {
                let as_f64: Vec<f64> = v.iter().map(|&c| c as f64).collect();
                argmax(&as_f64)
            })
            .collect())
    }

    fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        let votes = self.votes(x)?;
        let data = votes
            .iter()
            .flat_map(|v| v.iter().map(|&c| c as f64 / self.k as f64))
            .collect();
        Matrix::new(data, x.rows(), self.n_classes)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knn_classifier() {
        let x = Matrix::from_rows(&[
            vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0],
            vec![5.0, 5.0], vec![6.0, 5.0], vec![5.0, 6.0],
        ])
        .unwrap();
        let y = [0, 0, 0, 1, 1, 1];

        let mut knn = KNNClassifier::new(3, DistanceMetric::Euclidean);
        knn.fit(&x, &y).unwrap();

        let test = Matrix::from_rows(&[vec![0.5, 0.5], vec![5.5, 5.5]]).unwrap();
        assert_eq!(knn.predict(&test).unwrap(), vec![0, 1]);
        let proba = knn.predict_proba(&test).unwrap();
        assert_eq!(proba.row(0), &[1.0, 0.0]);
    }

    #[test]
    fn test_tied_vote_goes_to_smallest_class() {
        let x = Matrix::from_rows(&[vec![-1.0], vec![1.0], vec![10.0]]).unwrap();
        let y = [1, 0, 1];
        let mut knn = KNNClassifier::new(2, DistanceMetric::Manhattan);
        knn.fit(&x, &y).unwrap();
        // both neighbours sit at distance 1, one vote each
        let q = Matrix::from_rows(&[vec![0.0]]).unwrap();
        assert_eq!(knn.predict(&q).unwrap(), vec![0]);
        assert_eq!(knn.predict_proba(&q).unwrap().row(0), &[0.5, 0.5]);
    }

    #[test]
    fn test_distance_ties_keep_training_order() {
        let x = Matrix::from_rows(&[vec![-1.0], vec![1.0], vec![3.0]]).unwrap();
        let y = [1, 0, 0];
        let mut knn = KNNClassifier::new(1, DistanceMetric::Euclidean);
        knn.fit(&x, &y).unwrap();
        let q = Matrix::from_rows(&[vec![0.0]]).unwrap();
        assert_eq!(knn.predict(&q).unwrap(), vec![1]);
    }

    #[test]
    fn test_knn_errors() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0]]).unwrap();
        assert!(KNNClassifier::new(3, DistanceMetric::Euclidean).fit(&x, &[0, 1]).is_err());
        assert!(KNNClassifier::new(0, DistanceMetric::Euclidean).fit(&x, &[0, 1]).is_err());
        let knn = KNNClassifier::new(1, DistanceMetric::Euclidean);
        assert!(knn.predict(&x).is_err());
    }
}
