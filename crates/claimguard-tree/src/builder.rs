//! CART growth shared by the classification and regression trees.
//!
//! Every feature is presorted once at the root; each split stably partitions
//! the per-feature orderings, so finding the best threshold is a linear sweep.

use claimguard_core::{ClaimError, ClaimResult, Matrix};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Values closer than this are treated as equal when placing thresholds.
const FEATURE_THRESHOLD: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Impurity {
    Gini,
    Entropy,
    SquaredError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SplitSearch {
    Best,
    Random,
}

/// Training targets: class labels with their class count, or real values.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Targets<'a> {
    Classes(&'a [usize], usize),
    Values(&'a [f64]),
}

#[derive(Debug, Clone)]
pub(crate) struct GrowParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Resolved number of features examined per split.
    pub max_features: usize,
    pub search: SplitSearch,
    pub impurity: Impurity,
}

#[derive(Debug, Clone)]
pub(crate) enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class distribution (classification) or `[mean]` (regression).
    Leaf { value: Vec<f64> },
}

/// Reject a matrix whose width differs from the training data.
pub(crate) fn check_width(x: &Matrix, n_features: usize) -> ClaimResult<()> {
    if x.cols() != n_features {
        return Err(ClaimError::ShapeMismatch {
            expected: vec![n_features],
            got: vec![x.cols()],
        });
    }
    Ok(())
}

/// A fitted tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tree {
    nodes: Vec<TreeNode>,
    n_features: usize,
}

impl Tree {
    /// Wrap nodes grown elsewhere; node 0 must be the root.
    pub fn from_nodes(nodes: Vec<TreeNode>, n_features: usize) -> Self {
        Tree { nodes, n_features }
    }

    pub fn check_width(&self, x: &Matrix) -> ClaimResult<()> {
        check_width(x, self.n_features)
    }

    /// Node id of the leaf reached by `row`.
    pub fn leaf_index(&self, row: &[f64]) -> usize {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                TreeNode::Leaf { .. } => return id,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn leaf_value(&self, row: &[f64]) -> &[f64] {
        match &self.nodes[self.leaf_index(row)] {
            TreeNode::Leaf { value } => value,
            TreeNode::Split { .. } => unreachable!("leaf_index always stops at a leaf"),
        }
    }

    /// Overwrite the value of leaf `id`; ignored for split nodes.
    pub fn set_leaf_value(&mut self, id: usize, new_value: Vec<f64>) {
        if let Some(TreeNode::Leaf { value }) = self.nodes.get_mut(id) {
            *value = new_value;
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], id: usize) -> usize {
            match &nodes[id] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

struct Grower<'a> {
    x: &'a Matrix,
    targets: Targets<'a>,
    weights: &'a [f64],
    params: &'a GrowParams,
    rng: &'a mut StdRng,
    nodes: Vec<TreeNode>,
    goes_left: Vec<bool>,
}

/// Grow a tree on the rows of `x` with positive weight.
pub(crate) fn grow_tree(
    x: &Matrix,
    targets: Targets<'_>,
    weights: &[f64],
    params: &GrowParams,
    rng: &mut StdRng,
) -> ClaimResult<Tree> {
    let n = x.rows();
    let n_targets = match targets {
        Targets::Classes(y, _) => y.len(),
        Targets::Values(y) => y.len(),
    };
    if n_targets != n || weights.len() != n {
        return Err(ClaimError::ShapeMismatch {
            expected: vec![n],
            got: vec![n_targets, weights.len()],
        });
    }
    if let Targets::Classes(y, k) = targets {
        if y.iter().any(|&c| c >= k) {
            return Err(ClaimError::InvalidOperation(format!(
                "class label out of range for {} classes",
                k
            )));
        }
    }
    let samples: Vec<usize> = (0..n).filter(|&i| weights[i] > 0.0).collect();
    if samples.is_empty() {
        return Err(ClaimError::EmptyInput);
    }

    let sorted: Vec<Vec<usize>> = (0..x.cols())
        .map(|f| {
            let mut order = samples.clone();
            order.sort_by(|&a, &b| x.at(a, f).total_cmp(&x.at(b, f)));
            order
        })
        .collect();

    let mut grower = Grower {
        x,
        targets,
        weights,
        params,
        rng,
        nodes: Vec::new(),
        goes_left: vec![false; n],
    };
    grower.grow(samples, sorted, 0);
    Ok(Tree {
        nodes: grower.nodes,
        n_features: x.cols(),
    })
}

impl<'a> Grower<'a> {
    fn stats_len(&self) -> usize {
        match self.targets {
            Targets::Classes(_, k) => k,
            Targets::Values(_) => 3,
        }
    }

    fn add(&self, stats: &mut [f64], i: usize) {
        let w = self.weights[i];
        match self.targets {
            Targets::Classes(y, _) => stats[y[i]] += w,
            Targets::Values(y) => {
                stats[0] += w;
                stats[1] += w * y[i];
                stats[2] += w * y[i] * y[i];
            }
        }
    }

    fn total_weight(&self, stats: &[f64]) -> f64 {
        match self.targets {
            Targets::Classes(..) => stats.iter().sum(),
            Targets::Values(_) => stats[0],
        }
    }

    /// Impurity multiplied by the node weight.
    fn cost(&self, stats: &[f64]) -> f64 {
        let w = self.total_weight(stats);
        if w <= 0.0 {
            return 0.0;
        }
        match self.params.impurity {
            Impurity::Gini => w - stats.iter().map(|c| c * c).sum::<f64>() / w,
            Impurity::Entropy => -stats
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| c * (c / w).log2())
                .sum::<f64>(),
            Impurity::SquaredError => (stats[2] - stats[1] * stats[1] / w).max(0.0),
        }
    }

    fn leaf_value(&self, stats: &[f64]) -> Vec<f64> {
        let w = self.total_weight(stats);
        match self.targets {
            Targets::Classes(..) => stats.iter().map(|c| c / w).collect(),
            Targets::Values(_) => vec![stats[1] / w],
        }
    }

    fn grow(&mut self, samples: Vec<usize>, sorted: Vec<Vec<usize>>, depth: usize) -> usize {
        let mut stats = vec![0.0; self.stats_len()];
        for &i in &samples {
            self.add(&mut stats, i);
        }
        let m = samples.len();
        let impurity = self.cost(&stats) / self.total_weight(&stats);
        let is_leaf = self.params.max_depth.is_some_and(|d| depth >= d)
            || m < self.params.min_samples_split
            || m < 2 * self.params.min_samples_leaf
            || impurity <= f64::EPSILON;

        if !is_leaf {
            if let Some(split) = self.find_split(&sorted, &stats) {
                for &i in &samples {
                    self.goes_left[i] = self.x.at(i, split.feature) <= split.threshold;
                }
                let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
                    samples.into_iter().partition(|&i| self.goes_left[i]);
                let mut left_sorted = Vec::with_capacity(sorted.len());
                let mut right_sorted = Vec::with_capacity(sorted.len());
                for order in sorted {
                    let (l, r): (Vec<usize>, Vec<usize>) =
                        order.into_iter().partition(|&i| self.goes_left[i]);
                    left_sorted.push(l);
                    right_sorted.push(r);
                }

                let id = self.nodes.len();
                self.nodes.push(TreeNode::Leaf { value: Vec::new() });
                let left = self.grow(left_samples, left_sorted, depth + 1);
                let right = self.grow(right_samples, right_sorted, depth + 1);
                self.nodes[id] = TreeNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
                return id;
            }
        }

        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: self.leaf_value(&stats),
        });
        id
    }

    fn find_split(&mut self, sorted: &[Vec<usize>], stats: &[f64]) -> Option<Candidate> {
        let p = sorted.len();
        let mut features: Vec<usize> = (0..p).collect();
        if self.params.max_features < p || self.params.search == SplitSearch::Random {
            features.shuffle(&mut *self.rng);
        }

        let mut best: Option<Candidate> = None;
        let mut examined = 0;
        for f in features {
            if examined >= self.params.max_features {
                break;
            }
            let order = &sorted[f];
            let lo = self.x.at(order[0], f);
            let hi = self.x.at(order[order.len() - 1], f);
            if hi <= lo + FEATURE_THRESHOLD {
                continue;
            }
            examined += 1;
            let candidate = match self.params.search {
                SplitSearch::Best => self.best_threshold(f, order, stats),
                SplitSearch::Random => {
                    let t = self.rng.gen_range(lo..hi);
                    self.score_threshold(f, order, stats, t)
                }
            };
            if let Some(c) = candidate {
                if best.as_ref().map_or(true, |b| c.score < b.score) {
                    best = Some(c);
                }
            }
        }
        best
    }

    fn best_threshold(&self, f: usize, order: &[usize], stats: &[f64]) -> Option<Candidate> {
        let msl = self.params.min_samples_leaf;
        let m = order.len();
        let mut left = vec![0.0; stats.len()];
        let mut right = vec![0.0; stats.len()];
        let mut best: Option<Candidate> = None;

        for pos in 0..m - 1 {
            self.add(&mut left, order[pos]);
            let xv = self.x.at(order[pos], f);
            let xn = self.x.at(order[pos + 1], f);
            if xn <= xv + FEATURE_THRESHOLD {
                continue;
            }
            let n_left = pos + 1;
            if n_left < msl || m - n_left < msl {
                continue;
            }
            for (r, (t, l)) in right.iter_mut().zip(stats.iter().zip(left.iter())) {
                *r = t - l;
            }
            let score = self.cost(&left) + self.cost(&right);
            if best.as_ref().map_or(true, |b| score < b.score) {
                let mut threshold = xv / 2.0 + xn / 2.0;
                if threshold >= xn || !threshold.is_finite() {
                    threshold = xv;
                }
                best = Some(Candidate {
                    feature: f,
                    threshold,
                    score,
                });
            }
        }
        best
    }

    fn score_threshold(&self, f: usize, order: &[usize], stats: &[f64], threshold: f64) -> Option<Candidate> {
        let mut left = vec![0.0; stats.len()];
        let mut n_left = 0;
        for &i in order {
            if self.x.at(i, f) > threshold {
                break;
            }
            self.add(&mut left, i);
            n_left += 1;
        }
        let msl = self.params.min_samples_leaf;
        if n_left < msl || order.len() - n_left < msl {
            return None;
        }
        let right: Vec<f64> = stats.iter().zip(left.iter()).map(|(t, l)| t - l).collect();
        Some(Candidate {
            feature: f,
            threshold,
            score: self.cost(&left) + self.cost(&right),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params(impurity: Impurity) -> GrowParams {
        GrowParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
            search: SplitSearch::Best,
            impurity,
        }
    }

    #[test]
    fn test_single_split_threshold_is_midpoint() {
        let x = Matrix::from_rows(&[vec![1.0], vec![2.0], vec![4.0], vec![5.0]]).unwrap();
        let y = [0, 0, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = grow_tree(&x, Targets::Classes(&y, 2), &[1.0; 4], &params(Impurity::Gini), &mut rng).unwrap();
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        match &tree.nodes[0] {
            TreeNode::Split { threshold, .. } => assert_eq!(*threshold, 3.0),
            other => panic!("root should split, got {:?}", other),
        }
        assert_eq!(tree.leaf_value(&[0.0]), &[1.0, 0.0]);
    }

    #[test]
    fn test_zero_weight_rows_are_ignored() {
        let x = Matrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let y = [0, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = grow_tree(
            &x,
            Targets::Classes(&y, 2),
            &[1.0, 0.0, 3.0],
            &params(Impurity::Entropy),
            &mut rng,
        )
        .unwrap();
        match &tree.nodes[0] {
            TreeNode::Split { threshold, .. } => assert_eq!(*threshold, 2.0),
            other => panic!("root should split, got {:?}", other),
        }
    }

    #[test]
    fn test_regression_leaf_means() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![10.0], vec![11.0]]).unwrap();
        let y = [1.0, 3.0, 10.0, 12.0];
        let mut p = params(Impurity::SquaredError);
        p.max_depth = Some(1);
        let mut rng = StdRng::seed_from_u64(0);
        let tree = grow_tree(&x, Targets::Values(&y), &[1.0; 4], &p, &mut rng).unwrap();
        assert_eq!(tree.leaf_value(&[0.5]), &[2.0]);
        assert_eq!(tree.leaf_value(&[10.5]), &[11.0]);
    }

    #[test]
    fn test_min_samples_leaf_blocks_split() {
        let x = Matrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let y = [0, 1, 1];
        let mut p = params(Impurity::Gini);
        p.min_samples_leaf = 2;
        let mut rng = StdRng::seed_from_u64(0);
        let tree = grow_tree(&x, Targets::Classes(&y, 2), &[1.0; 3], &p, &mut rng).unwrap();
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_rejects_all_zero_weights() {
        let x = Matrix::from_rows(&[vec![1.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(grow_tree(&x, Targets::Values(&[1.0]), &[0.0], &params(Impurity::SquaredError), &mut rng).is_err());
    }
}
