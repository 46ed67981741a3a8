//! Construction of every configured classifier.

use claimguard_core::{ClaimError, ClaimResult, Classifier};
use claimguard_neighbors::{DistanceMetric, KNNClassifier};
use claimguard_selection::ParamSet;
use claimguard_svm::{Gamma, Kernel, SVC};
use claimguard_tree::{
    AdaBoostAlgorithm, AdaBoostClassifier, DecisionTreeClassifier, ExtraTreesClassifier, GradientBoostingClassifier,
    HistGradientBoostingClassifier, MaxFeatures, RandomForestClassifier,
};

use crate::config::{BoostingConfig, KnnConfig, LgbmConfig, PipelineConfig, SvcConfig};
use crate::error::{PipelineError, PipelineResult};

pub fn svc(cfg: &SvcConfig) -> PipelineResult<SVC> {
    let gamma = cfg.gamma.map_or(Gamma::Scale, Gamma::Value);
    let kernel = match cfg.kernel.to_ascii_lowercase().as_str() {
        "linear" => Kernel::Linear,
        "rbf" => Kernel::Rbf { gamma },
        "poly" => Kernel::Poly {
            degree: cfg.degree,
            coef0: cfg.coef0,
            gamma,
        },
        other => {
            return Err(PipelineError::invalid(
                "models.svc.kernel",
                format!("unknown kernel `{}`", other),
            ))
        }
    };
    Ok(SVC::new(cfg.c, kernel))
}

pub fn knn(cfg: &KnnConfig) -> PipelineResult<KNNClassifier> {
    let metric = match cfg.metric.to_ascii_lowercase().as_str() {
        "euclidean" => DistanceMetric::Euclidean,
        "manhattan" => DistanceMetric::Manhattan,
        other => {
            return Err(PipelineError::invalid(
                "models.knn.metric",
                format!("unknown metric `{}`", other),
            ))
        }
    };
    Ok(KNNClassifier::new(cfg.k, metric))
}

pub fn random_forest(config: &PipelineConfig) -> RandomForestClassifier {
    let cfg = &config.models.random_forest;
    let mut rf = RandomForestClassifier::new(cfg.n_estimators, cfg.max_depth);
    rf.criterion = cfg.criterion;
    rf.max_features = cfg.max_features;
    rf.min_samples_leaf = cfg.min_samples_leaf;
    rf.min_samples_split = cfg.min_samples_split;
    rf.seed = Some(config.split.seed);
    rf
}

pub fn gradient_boosting(cfg: &BoostingConfig, seed: u64) -> GradientBoostingClassifier {
    let mut gb = GradientBoostingClassifier::new(cfg.n_estimators, cfg.learning_rate, cfg.max_depth);
    gb.subsample = cfg.subsample;
    gb.max_features = cfg.max_features.map(MaxFeatures::Fraction);
    gb.seed = Some(seed);
    gb
}

pub fn extra_trees(config: &PipelineConfig) -> ExtraTreesClassifier {
    let mut et = ExtraTreesClassifier::new(config.models.extra_trees.n_estimators);
    et.seed = Some(config.split.seed);
    et
}

pub fn lgbm(cfg: &LgbmConfig) -> HistGradientBoostingClassifier {
    let mut model = HistGradientBoostingClassifier::new(cfg.n_estimators, cfg.learning_rate);
    model.num_leaves = cfg.num_leaves;
    model.min_child_samples = cfg.min_child_samples;
    model.reg_lambda = cfg.reg_lambda;
    model
}

fn reject_unknown(params: &ParamSet, known: &[&str]) -> ClaimResult<()> {
    match params.keys().find(|k| !known.contains(&k.as_str())) {
        Some(k) => Err(ClaimError::param(k, "not a tunable parameter of this model")),
        None => Ok(()),
    }
}

/// Decision tree from grid parameters; absent keys keep their defaults.
pub fn decision_tree_factory(params: &ParamSet) -> ClaimResult<Box<dyn Classifier>> {
    reject_unknown(
        params,
        &["criterion", "max_depth", "min_samples_split", "min_samples_leaf"],
    )?;
    let mut tree = DecisionTreeClassifier::default();
    if let Some(v) = params.get("criterion") {
        tree.criterion = v.as_str()?.parse()?;
    }
    if let Some(v) = params.get("max_depth") {
        tree.max_depth = Some(v.as_usize()?);
    }
    if let Some(v) = params.get("min_samples_split") {
        tree.min_samples_split = v.as_usize()?;
    }
    if let Some(v) = params.get("min_samples_leaf") {
        tree.min_samples_leaf = v.as_usize()?;
    }
    Ok(Box::new(tree))
}

/// AdaBoost from grid parameters; absent keys keep their defaults.
pub fn ada_boost_factory(params: &ParamSet) -> ClaimResult<Box<dyn Classifier>> {
    reject_unknown(params, &["n_estimators", "learning_rate", "algorithm"])?;
    let mut ada = AdaBoostClassifier::default();
    if let Some(v) = params.get("n_estimators") {
        ada.n_estimators = v.as_usize()?;
    }
    if let Some(v) = params.get("learning_rate") {
        ada.learning_rate = v.as_f64()?;
    }
    if let Some(v) = params.get("algorithm") {
        ada.algorithm = v.as_str()?.parse::<AdaBoostAlgorithm>()?;
    }
    Ok(Box::new(ada))
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimguard_selection::ParamValue;

    #[test]
    fn test_factories_apply_params() {
        let mut params = ParamSet::new();
        params.insert("criterion".into(), ParamValue::from("entropy"));
        params.insert("max_depth".into(), ParamValue::Int(3));
        assert!(decision_tree_factory(&params).is_ok());

        params.insert("n_estimators".into(), ParamValue::Int(3));
        assert!(decision_tree_factory(&params).is_err());

        let mut params = ParamSet::new();
        params.insert("algorithm".into(), ParamValue::from("SAMME.R"));
        params.insert("learning_rate".into(), ParamValue::Int(1));
        assert!(ada_boost_factory(&params).is_ok());
        params.insert("algorithm".into(), ParamValue::from("SAMME.X"));
        assert!(ada_boost_factory(&params).is_err());
    }

    #[test]
    fn test_unknown_kernel_and_metric() {
        let cfg = SvcConfig {
            kernel: "sigmoid".to_string(),
            ..SvcConfig::default()
        };
        assert!(svc(&cfg).is_err());
        let cfg = KnnConfig {
            metric: "cosine".to_string(),
            ..KnnConfig::default()
        };
        assert!(knn(&cfg).is_err());
    }
}
