//! Shared fixtures for the tree crate's tests.

use claimguard_core::Matrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `n` two-feature rows; class 0 is centred on (0, 0) and class 1 on (3, 3),
/// each coordinate jittered uniformly by up to `spread`. Classes alternate.
pub(crate) fn two_blobs(n: usize, spread: f64, seed: u64) -> (Matrix, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let class = i % 2;
        let centre = 3.0 * class as f64;
        rows.push(vec![
            centre + rng.gen_range(-spread..=spread),
            centre + rng.gen_range(-spread..=spread),
        ]);
        y.push(class);
    }
    (Matrix::from_rows(&rows).unwrap(), y)
}

/// Fraction of equal entries.
pub(crate) fn agreement(a: &[usize], b: &[usize]) -> f64 {
    a.iter().zip(b).filter(|(p, q)| p == q).count() as f64 / a.len() as f64
}
