use claimguard_core::{ClaimError, ClaimResult, Matrix};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Split data into shuffled training and test sets.
///
/// `n_test = ceil(n * test_size)`, the rest is training data. The same seed
/// always yields the same split.
///
/// Returns `(x_train, x_test, y_train, y_test)`.
pub fn train_test_split(
    x: &Matrix,
    y: &[usize],
    test_size: f64,
    seed: Option<u64>,
) -> ClaimResult<(Matrix, Matrix, Vec<usize>, Vec<usize>)> {
    let (train_idx, test_idx) = train_test_indices(x.rows(), test_size, seed)?;
    if x.rows() != y.len() {
        return Err(ClaimError::ShapeMismatch {
            expected: vec![x.rows()],
            got: vec![y.len()],
        });
    }
    Ok((
        x.select_rows(&train_idx)?,
        x.select_rows(&test_idx)?,
        train_idx.iter().map(|&i| y[i]).collect(),
        test_idx.iter().map(|&i| y[i]).collect(),
    ))
}

/// Row indices of a shuffled split, `(train, test)`.
pub fn train_test_indices(
    n: usize,
    test_size: f64,
    seed: Option<u64>,
) -> ClaimResult<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ClaimError::param("test_size", "must lie strictly between 0 and 1"));
    }
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(ClaimError::param(
            "test_size",
            format!("{} of {} samples leaves an empty side", test_size, n),
        ));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    indices.shuffle(&mut rng);

    let train = indices[n_test..].to_vec();
    let test = indices[..n_test].to_vec();
    Ok((train, test))
}

/// Stratified K-fold cross-validator (no shuffling).
///
/// Each class is spread over the folds as evenly as possible; samples of a
/// class are assigned to folds contiguously in their original order.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    pub n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        StratifiedKFold { n_splits }
    }

    /// `(train_indices, test_indices)` per fold, both ascending.
    pub fn split(&self, y: &[usize]) -> ClaimResult<Vec<(Vec<usize>, Vec<usize>)>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(ClaimError::param("n_splits", "must be at least 2"));
        }
        if k > y.len() {
            return Err(ClaimError::param(
                "n_splits",
                format!("cannot exceed the number of samples ({})", y.len()),
            ));
        }

        // encode classes in order of first appearance
        let mut order: Vec<usize> = Vec::new();
        let encoded: Vec<usize> = y
            .iter()
            .map(|label| match order.iter().position(|c| c == label) {
                Some(pos) => pos,
                None => {
                    order.push(*label);
                    order.len() - 1
                }
            })
            .collect();
        let n_classes = order.len();
        let mut counts = vec![0usize; n_classes];
        for &c in &encoded {
            counts[c] += 1;
        }
        if counts.iter().all(|&c| k > c) {
            return Err(ClaimError::param(
                "n_splits",
                format!("{} is greater than the member count of every class", k),
            ));
        }

        // allocation[fold][class]: round-robin over the class-sorted labels
        let mut sorted = encoded.clone();
        sorted.sort_unstable();
        let mut allocation = vec![vec![0usize; n_classes]; k];
        for (pos, &c) in sorted.iter().enumerate() {
            allocation[pos % k][c] += 1;
        }

        let mut test_fold = vec![0usize; y.len()];
        for class in 0..n_classes {
            let folds_for_class = (0..k).flat_map(|f| std::iter::repeat(f).take(allocation[f][class]));
            let members = encoded.iter().enumerate().filter(|(_, &c)| c == class).map(|(i, _)| i);
            for (i, fold) in members.zip(folds_for_class) {
                test_fold[i] = fold;
            }
        }

        Ok((0..k)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| test_fold[i] == fold);
                (train, test)
            })
            .collect())
    }
}
