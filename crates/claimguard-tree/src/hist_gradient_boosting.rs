//! Histogram-based gradient boosting with leaf-wise tree growth.

use claimguard_core::{n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use tracing::debug;

use crate::builder::{check_width, Tree, TreeNode};
use crate::gradient_boosting::sigmoid;

/// Per-feature bin boundaries: value `v` falls in the first bin whose upper
/// bound is `>= v`, or in the extra last bin above every bound.
#[derive(Debug, Clone)]
struct BinMapper {
    uppers: Vec<Vec<f64>>,
}

impl BinMapper {
    fn fit(x: &Matrix, max_bins: usize) -> ClaimResult<Self> {
        let mut uppers = Vec::with_capacity(x.cols());
        for f in 0..x.cols() {
            let mut values = x.column(f)?;
            values.sort_by(f64::total_cmp);
            let mut distinct = values.clone();
            distinct.dedup();
            let bounds = if distinct.len() <= max_bins {
                distinct.windows(2).map(|w| w[0] / 2.0 + w[1] / 2.0).collect()
            } else {
                let n = values.len();
                let mut cuts: Vec<f64> = (1..max_bins).map(|j| values[j * n / max_bins]).collect();
                cuts.dedup();
                if cuts.last() == distinct.last() {
                    cuts.pop();
                }
                cuts
            };
            uppers.push(bounds);
        }
        Ok(BinMapper { uppers })
    }

    fn n_bins(&self, f: usize) -> usize {
        self.uppers[f].len() + 1
    }

    fn bin(&self, f: usize, v: f64) -> u8 {
        self.uppers[f].partition_point(|&u| u < v) as u8
    }

    /// Column-major bin codes.
    fn transform(&self, x: &Matrix) -> Vec<Vec<u8>> {
        (0..x.cols())
            .map(|f| (0..x.rows()).map(|i| self.bin(f, x.at(i, f))).collect())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitInfo {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct OpenLeaf {
    node: usize,
    rows: Vec<usize>,
    g: f64,
    h: f64,
    depth: usize,
    split: Option<SplitInfo>,
}

/// Gradient boosting on quantile-binned features with leaf-wise growth,
/// in the manner of LightGBM. Binary targets only.
#[derive(Debug, Clone)]
pub struct HistGradientBoostingClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub max_depth: Option<usize>,
    pub max_bins: usize,
    pub min_child_samples: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub min_split_gain: f64,
    mapper: Option<BinMapper>,
    trees: Vec<Tree>,
    initial_log_odds: f64,
}

impl Default for HistGradientBoostingClassifier {
    fn default() -> Self {
        HistGradientBoostingClassifier::new(100, 0.1)
    }
}

impl HistGradientBoostingClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        HistGradientBoostingClassifier {
            n_estimators,
            learning_rate,
            num_leaves: 31,
            max_depth: None,
            max_bins: 255,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            reg_lambda: 0.0,
            min_split_gain: 0.0,
            mapper: None,
            trees: Vec::new(),
            initial_log_odds: 0.0,
        }
    }

    fn validate(&self) -> ClaimResult<()> {
        if self.n_estimators == 0 {
            return Err(ClaimError::param("n_estimators", "must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ClaimError::param("learning_rate", "must be positive"));
        }
        if self.num_leaves < 2 {
            return Err(ClaimError::param("num_leaves", "must be at least 2"));
        }
        if !(2..=255).contains(&self.max_bins) {
            return Err(ClaimError::param("max_bins", "must lie in 2..=255"));
        }
        if self.reg_lambda < 0.0 {
            return Err(ClaimError::param("reg_lambda", "must be non-negative"));
        }
        Ok(())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn decision_function(&self, x: &Matrix) -> ClaimResult<Vec<f64>> {
        let mapper = self.mapper.as_ref().ok_or(ClaimError::NotFitted("decision_function()"))?;
        check_width(x, mapper.uppers.len())?;
        Ok((0..x.rows())
            .map(|i| {
                let row = x.row(i);
                self.initial_log_odds + self.trees.iter().map(|t| t.leaf_value(row)[0]).sum::<f64>()
            })
            .collect())
    }

    fn leaf_output(&self, g: f64, h: f64) -> f64 {
        let den = h + self.reg_lambda;
        if den <= 0.0 {
            0.0
        } else {
            -self.learning_rate * g / den
        }
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let den = h + self.reg_lambda;
        if den <= 0.0 {
            0.0
        } else {
            g * g / den
        }
    }

    fn find_split(&self, mapper: &BinMapper, bins: &[Vec<u8>], grad: &[f64], hess: &[f64], leaf: &OpenLeaf) -> Option<SplitInfo> {
        if self.max_depth.is_some_and(|d| leaf.depth >= d) || leaf.rows.len() < 2 * self.min_child_samples {
            return None;
        }
        let parent = self.score(leaf.g, leaf.h);
        let mut best: Option<SplitInfo> = None;
        for (f, codes) in bins.iter().enumerate() {
            let mut hist = vec![(0.0, 0.0, 0usize); mapper.n_bins(f)];
            for &i in &leaf.rows {
                let cell = &mut hist[codes[i] as usize];
                cell.0 += grad[i];
                cell.1 += hess[i];
                cell.2 += 1;
            }
            let (mut gl, mut hl, mut cl) = (0.0, 0.0, 0usize);
            for (b, &(g, h, c)) in hist.iter().enumerate().take(hist.len() - 1) {
                gl += g;
                hl += h;
                cl += c;
                let (gr, hr, cr) = (leaf.g - gl, leaf.h - hl, leaf.rows.len() - cl);
                if cl < self.min_child_samples || cr < self.min_child_samples {
                    continue;
                }
                if hl < self.min_child_weight || hr < self.min_child_weight {
                    continue;
                }
                let gain = self.score(gl, hl) + self.score(gr, hr) - parent;
                if gain > self.min_split_gain && best.map_or(true, |s| gain > s.gain) {
                    best = Some(SplitInfo { feature: f, bin: b, gain });
                }
            }
        }
        best
    }

    fn grow(&self, mapper: &BinMapper, bins: &[Vec<u8>], grad: &[f64], hess: &[f64]) -> Tree {
        let n = grad.len();
        let mut nodes = vec![TreeNode::Leaf { value: Vec::new() }];
        let mut root = OpenLeaf {
            node: 0,
            rows: (0..n).collect(),
            g: grad.iter().sum(),
            h: hess.iter().sum(),
            depth: 0,
            split: None,
        };
        root.split = self.find_split(mapper, bins, grad, hess, &root);
        let mut open = vec![root];

        while open.len() < self.num_leaves {
            let Some(pick) = open
                .iter()
                .enumerate()
                .filter_map(|(k, l)| l.split.map(|s| (k, s.gain)))
                .fold(None, |acc: Option<(usize, f64)>, (k, gain)| match acc {
                    Some((_, best)) if best >= gain => acc,
                    _ => Some((k, gain)),
                })
                .map(|(k, _)| k)
            else {
                break;
            };
            let leaf = open.remove(pick);
            let Some(split) = leaf.split else { break };
            let codes = &bins[split.feature];
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                leaf.rows.into_iter().partition(|&i| (codes[i] as usize) <= split.bin);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(TreeNode::Leaf { value: Vec::new() });
            nodes.push(TreeNode::Leaf { value: Vec::new() });
            nodes[leaf.node] = TreeNode::Split {
                feature: split.feature,
                threshold: mapper.uppers[split.feature][split.bin],
                left,
                right,
            };
            for (node, rows) in [(left, left_rows), (right, right_rows)] {
                let mut child = OpenLeaf {
                    node,
                    g: rows.iter().map(|&i| grad[i]).sum(),
                    h: rows.iter().map(|&i| hess[i]).sum(),
                    rows,
                    depth: leaf.depth + 1,
                    split: None,
                };
                child.split = self.find_split(mapper, bins, grad, hess, &child);
                open.push(child);
            }
        }

        for leaf in &open {
            nodes[leaf.node] = TreeNode::Leaf {
                value: vec![self.leaf_output(leaf.g, leaf.h)],
            };
        }
        Tree::from_nodes(nodes, mapper.uppers.len())
    }
}

impl Classifier for HistGradientBoostingClassifier {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        self.validate()?;
        let k = n_classes_of(x, y)?;
        if k > 2 {
            return Err(ClaimError::UnsupportedTarget(format!(
                "histogram boosting handles binary targets, got {} classes",
                k
            )));
        }
        let n = x.rows();
        let yf: Vec<f64> = y.iter().map(|&c| c as f64).collect();
        let pos = (yf.iter().sum::<f64>() / n as f64).clamp(f64::EPSILON, 1.0 - f64::EPSILON);
        self.initial_log_odds = (pos / (1.0 - pos)).ln();

        let mapper = BinMapper::fit(x, self.max_bins)?;
        let bins = mapper.transform(x);
        let mut raw = vec![self.initial_log_odds; n];
        self.trees.clear();

        for _ in 0..self.n_estimators {
            let p: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let grad: Vec<f64> = p.iter().zip(&yf).map(|(pi, yi)| pi - yi).collect();
            let hess: Vec<f64> = p.iter().map(|pi| pi * (1.0 - pi)).collect();
            let tree = self.grow(&mapper, &bins, &grad, &hess);
            for (i, r) in raw.iter_mut().enumerate() {
                *r += tree.leaf_value(x.row(i))[0];
            }
            self.trees.push(tree);
        }

        debug!(
            n_estimators = self.n_estimators,
            mean_leaves = self.trees.iter().map(Tree::n_leaves).sum::<usize>() as f64 / self.trees.len() as f64,
            "histogram boosting fitted"
        );
        self.mapper = Some(mapper);
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|r| usize::from(r > 0.0))
            .collect())
    }

    fn predict_proba(&self, x: &Matrix) -> ClaimResult<Matrix> {
        let raw = self.decision_function(x)?;
        let mut data = Vec::with_capacity(raw.len() * 2);
        for r in raw {
            let p = sigmoid(r);
            data.push(1.0 - p);
            data.push(p);
        }
        Matrix::new(data, x.rows(), 2)
    }

    fn n_classes(&self) -> usize {
        2
    }
}
