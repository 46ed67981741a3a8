use claimguard_core::{ClaimResult, Classifier, Matrix};

use crate::params::ParamSet;

/// Builds a fresh, unfitted classifier from a parameter set.
pub trait ClassifierFactory: Fn(&ParamSet) -> ClaimResult<Box<dyn Classifier>> + Send + Sync {}

impl<F> ClassifierFactory for F where F: Fn(&ParamSet) -> ClaimResult<Box<dyn Classifier>> + Send + Sync {}

/// Mean held-out accuracy of `factory(params)` over `folds`.
pub fn cross_val_score<F: ClassifierFactory + ?Sized>(
    factory: &F,
    params: &ParamSet,
    x: &Matrix,
    y: &[usize],
    folds: &[(Vec<usize>, Vec<usize>)],
) -> ClaimResult<f64> {
    let mut total = 0.0;
    for (train, test) in folds {
        let mut model = factory(params)?;
        let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();
        let y_test: Vec<usize> = test.iter().map(|&i| y[i]).collect();
        model.fit(&x.select_rows(train)?, &y_train)?;
        let pred = model.predict(&x.select_rows(test)?)?;
        let correct = pred.iter().zip(&y_test).filter(|(p, t)| p == t).count();
        total += correct as f64 / y_test.len() as f64;
    }
    Ok(total / folds.len() as f64)
}
