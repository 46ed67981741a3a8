use claimguard_core::{n_classes_of, ClaimError, ClaimResult, Classifier, Matrix};
use tracing::{debug, warn};

/// Floor for the curvature of a working pair.
const TAU: f64 = 1e-12;

/// Kernel coefficient for the RBF and polynomial kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gamma {
    /// `1 / (n_features * X.var())`, resolved at fit time.
    Scale,
    Value(f64),
}

/// Kernel type for SVM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    Linear,
    Rbf { gamma: Gamma },
    Poly { degree: u32, coef0: f64, gamma: Gamma },
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Rbf { gamma: Gamma::Scale }
    }
}

/// Kernel with gamma resolved against the training data.
#[derive(Debug, Clone, Copy)]
enum FittedKernel {
    Linear,
    Rbf(f64),
    Poly(u32, f64, f64),
}

impl FittedKernel {
    fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            FittedKernel::Linear => dot(a, b),
            FittedKernel::Rbf(gamma) => {
                let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * sq).exp()
            }
            FittedKernel::Poly(degree, coef0, gamma) => (gamma * dot(a, b) + coef0).powi(degree as i32),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn resolve_gamma(gamma: Gamma, x: &Matrix) -> ClaimResult<f64> {
    match gamma {
        Gamma::Value(g) if g > 0.0 => Ok(g),
        Gamma::Value(_) => Err(ClaimError::param("gamma", "must be positive")),
        Gamma::Scale => {
            let var = x.var_all().unwrap_or(0.0);
            Ok(if var > 0.0 { 1.0 / (x.cols() as f64 * var) } else { 1.0 })
        }
    }
}

#[derive(Debug, Clone)]
struct Model {
    kernel: FittedKernel,
    support_vectors: Matrix,
    /// `alpha_i * y_i` per support vector.
    dual_coef: Vec<f64>,
    rho: f64,
}

/// Binary C-Support Vector Classifier.
///
/// Solved with SMO using second-order working set selection. Class 1 maps
/// to `+1`, class 0 to `-1`.
#[derive(Debug, Clone)]
pub struct SVC {
    pub c: f64,
    pub kernel: Kernel,
    pub tol: f64,
    pub max_iter: usize,
    model: Option<Model>,
}

impl Default for SVC {
    fn default() -> Self {
        SVC::new(1.0, Kernel::default())
    }
}

impl SVC {
    pub fn new(c: f64, kernel: Kernel) -> Self {
        SVC {
            c,
            kernel,
            tol: 1e-3,
            max_iter: 100_000,
            model: None,
        }
    }

    pub fn n_support(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.dual_coef.len())
    }

    /// Signed distance to the separating surface; positive means class 1.
    pub fn decision_function(&self, x: &Matrix) -> ClaimResult<Vec<f64>> {
        let model = self.model.as_ref().ok_or(ClaimError::NotFitted("decision_function()"))?;
        if x.cols() != model.support_vectors.cols() {
            return Err(ClaimError::ShapeMismatch {
                expected: vec![model.support_vectors.cols()],
                got: vec![x.cols()],
            });
        }
        Ok((0..x.rows())
            .map(|i| {
                let row = x.row(i);
                model
                    .dual_coef
                    .iter()
                    .enumerate()
                    .map(|(s, coef)| coef * model.kernel.eval(model.support_vectors.row(s), row))
                    .sum::<f64>()
                    - model.rho
            })
            .collect())
    }

    fn fitted_kernel(&self, x: &Matrix) -> ClaimResult<FittedKernel> {
        Ok(match self.kernel {
            Kernel::Linear => FittedKernel::Linear,
            Kernel::Rbf { gamma } => FittedKernel::Rbf(resolve_gamma(gamma, x)?),
            Kernel::Poly { degree, coef0, gamma } => FittedKernel::Poly(degree, coef0, resolve_gamma(gamma, x)?),
        })
    }
}

/// Dual solver state over a precomputed kernel matrix.
struct Smo<'a> {
    k: &'a [f64],
    n: usize,
    y: &'a [f64],
    c: f64,
    alpha: Vec<f64>,
    grad: Vec<f64>,
}

impl<'a> Smo<'a> {
    fn kij(&self, i: usize, j: usize) -> f64 {
        self.k[i * self.n + j]
    }

    fn in_up(&self, t: usize) -> bool {
        (self.y[t] > 0.0 && self.alpha[t] < self.c) || (self.y[t] < 0.0 && self.alpha[t] > 0.0)
    }

    fn in_low(&self, t: usize) -> bool {
        (self.y[t] > 0.0 && self.alpha[t] > 0.0) || (self.y[t] < 0.0 && self.alpha[t] < self.c)
    }

    /// Second-order working set; `None` once the KKT gap is below `eps`.
    fn select(&self, eps: f64) -> Option<(usize, usize)> {
        let mut gmax = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in (0..self.n).filter(|&t| self.in_up(t)) {
            let v = -self.y[t] * self.grad[t];
            if v >= gmax {
                gmax = v;
                i_sel = Some(t);
            }
        }
        let i = i_sel?;

        let mut gmax2 = f64::NEG_INFINITY;
        let mut obj_min = f64::INFINITY;
        let mut j_sel = None;
        for t in (0..self.n).filter(|&t| self.in_low(t)) {
            let yg = self.y[t] * self.grad[t];
            gmax2 = gmax2.max(yg);
            let b = gmax + yg;
            if b > 0.0 {
                let mut a = self.kij(i, i) + self.kij(t, t) - 2.0 * self.kij(i, t);
                if a <= 0.0 {
                    a = TAU;
                }
                let obj = -(b * b) / a;
                if obj <= obj_min {
                    obj_min = obj;
                    j_sel = Some(t);
                }
            }
        }
        if gmax + gmax2 < eps {
            return None;
        }
        j_sel.map(|j| (i, j))
    }

    fn update(&mut self, i: usize, j: usize) {
        let c = self.c;
        let (old_i, old_j) = (self.alpha[i], self.alpha[j]);
        let mut quad = self.kij(i, i) + self.kij(j, j) - 2.0 * self.kij(i, j);
        if quad <= 0.0 {
            quad = TAU;
        }
        let (mut ai, mut aj) = (old_i, old_j);

        if self.y[i] != self.y[j] {
            let delta = (-self.grad[i] - self.grad[j]) / quad;
            let diff = ai - aj;
            ai += delta;
            aj += delta;
            if diff > 0.0 {
                if aj < 0.0 {
                    aj = 0.0;
                    ai = diff;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = -diff;
            }
            if diff > 0.0 {
                if ai > c {
                    ai = c;
                    aj = c - diff;
                }
            } else if aj > c {
                aj = c;
                ai = c + diff;
            }
        } else {
            let delta = (self.grad[i] - self.grad[j]) / quad;
            let sum = ai + aj;
            ai -= delta;
            aj += delta;
            if sum > c {
                if ai > c {
                    ai = c;
                    aj = sum - c;
                }
            } else if aj < 0.0 {
                aj = 0.0;
                ai = sum;
            }
            if sum > c {
                if aj > c {
                    aj = c;
                    ai = sum - c;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = sum;
            }
        }

        self.alpha[i] = ai;
        self.alpha[j] = aj;
        let (di, dj) = (ai - old_i, aj - old_j);
        for t in 0..self.n {
            let qti = self.y[t] * self.y[i] * self.kij(t, i);
            let qtj = self.y[t] * self.y[j] * self.kij(t, j);
            self.grad[t] += qti * di + qtj * dj;
        }
    }

    /// Offset from the free vectors, or the middle of the feasible interval.
    fn rho(&self) -> f64 {
        let (mut ub, mut lb) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut n_free, mut sum_free) = (0usize, 0.0);
        for t in 0..self.n {
            let yg = self.y[t] * self.grad[t];
            if self.alpha[t] >= self.c {
                if self.y[t] < 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else if self.alpha[t] <= 0.0 {
                if self.y[t] > 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                n_free += 1;
                sum_free += yg;
            }
        }
        if n_free > 0 {
            sum_free / n_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }
}

impl Classifier for SVC {
    fn fit(&mut self, x: &Matrix, y: &[usize]) -> ClaimResult<()> {
        if !(self.c > 0.0) {
            return Err(ClaimError::param("c", "must be positive"));
        }
        let k = n_classes_of(x, y)?;
        if k > 2 {
            return Err(ClaimError::UnsupportedTarget(format!(
                "SVC handles binary targets, got {} classes",
                k
            )));
        }
        let n = x.rows();
        let signs: Vec<f64> = y.iter().map(|&c| if c == 1 { 1.0 } else { -1.0 }).collect();
        let kernel = self.fitted_kernel(x)?;

        let mut gram = vec![0.0; n * n];
        for i in 0..n {
            for j in i..n {
                let v = kernel.eval(x.row(i), x.row(j));
                gram[i * n + j] = v;
                gram[j * n + i] = v;
            }
        }

        let mut smo = Smo {
            k: &gram,
            n,
            y: &signs,
            c: self.c,
            alpha: vec![0.0; n],
            grad: vec![-1.0; n],
        };
        let mut iter = 0;
        while iter < self.max_iter {
            match smo.select(self.tol) {
                Some((i, j)) => smo.update(i, j),
                None => break,
            }
            iter += 1;
        }
        if iter == self.max_iter {
            warn!(max_iter = self.max_iter, "SVC solver hit the iteration cap");
        }
        let rho = smo.rho();

        let support: Vec<usize> = (0..n).filter(|&t| smo.alpha[t] > 0.0).collect();
        let dual_coef = support.iter().map(|&t| smo.alpha[t] * signs[t]).collect();
        debug!(iterations = iter, n_support = support.len(), "SVC fitted");
        self.model = Some(Model {
            kernel,
            support_vectors: x.select_rows(&support)?,
            dual_coef,
            rho,
        });
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> ClaimResult<Vec<usize>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|d| usize::from(d > 0.0))
            .collect())
    }

    fn n_classes(&self) -> usize {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn separable() -> (Matrix, Vec<usize>) {
        let x = Matrix::from_rows(&[
            vec![0.0, 0.0], vec![0.5, 0.5], vec![1.0, 1.0],
            vec![5.0, 5.0], vec![5.5, 5.5], vec![6.0, 6.0],
        ])
        .unwrap();
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_svc_linear() {
        let (x, y) = separable();
        let mut svc = SVC::new(1.0, Kernel::Linear);
        svc.fit(&x, &y).unwrap();
        assert_eq!(svc.predict(&x).unwrap(), y);
        assert!(svc.n_support() >= 2);
    }

    #[test]
    fn test_linear_margin_is_symmetric() {
        // two points: the boundary lies halfway, f(x) = w.x - rho with w = 1
        let x = Matrix::from_rows(&[vec![-1.0], vec![1.0]]).unwrap();
        let mut svc = SVC::new(10.0, Kernel::Linear);
        svc.fit(&x, &[0, 1]).unwrap();
        let d = svc.decision_function(&Matrix::from_rows(&[vec![-1.0], vec![0.0], vec![1.0]]).unwrap()).unwrap();
        assert_abs_diff_eq!(d[0], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d[1], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d[2], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rbf_fits_xor() {
        let x = Matrix::from_rows(&[
            vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0],
        ])
        .unwrap();
        let y = [0, 1, 1, 0];
        let mut svc = SVC::new(10.0, Kernel::Rbf { gamma: Gamma::Value(2.0) });
        svc.fit(&x, &y).unwrap();
        assert_eq!(svc.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_default_scale_gamma_and_poly() {
        let (x, y) = separable();
        let mut svc = SVC::default();
        svc.fit(&x, &y).unwrap();
        assert_eq!(svc.predict(&x).unwrap(), y);

        let mut poly = SVC::new(1.0, Kernel::Poly { degree: 2, coef0: 1.0, gamma: Gamma::Scale });
        poly.fit(&x, &y).unwrap();
        assert_eq!(poly.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_svc_errors() {
        let (x, _) = separable();
        assert!(matches!(
            SVC::default().fit(&x, &[0, 1, 2, 0, 1, 2]),
            Err(ClaimError::UnsupportedTarget(_))
        ));
        assert!(SVC::default().predict(&x).is_err());
        assert!(SVC::default().predict_proba(&x).is_err());
        assert!(SVC::new(0.0, Kernel::Linear).fit(&x, &[0, 0, 0, 1, 1, 1]).is_err());
    }
}
