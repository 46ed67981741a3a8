use std::collections::HashMap;
use std::time::Instant;

use claimguard_core::{ClaimError, Classifier};
use claimguard_metrics::{accuracy, confusion_matrix, ClassificationReport};
use claimguard_selection::{ClassifierFactory, GridSearchCV, ParamGrid, ParamSet, VotingClassifier};
use tracing::{info, info_span};

use crate::config::{ModelKind, PipelineConfig};
use crate::data::{self, Inspection, PreparedData};
use crate::error::{PipelineError, PipelineResult};
use crate::models;
use crate::report::{GridSummary, Leaderboard, ModelEvaluation, RunReport};

/// Runs the configured models over one prepared dataset.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn prepare(&self) -> PipelineResult<PreparedData> {
        data::prepare(&self.config)
    }

    pub fn inspect(&self) -> PipelineResult<Inspection> {
        data::inspect(&self.config)
    }

    /// Fit `classifier` on the training split and score it on both splits.
    pub fn evaluate(
        &self,
        name: &str,
        classifier: &mut dyn Classifier,
        data: &PreparedData,
    ) -> PipelineResult<ModelEvaluation> {
        let failed = |source: ClaimError| PipelineError::ModelFailed {
            model: name.to_string(),
            source,
        };
        let started = Instant::now();
        classifier.fit(&data.x_train, &data.y_train).map_err(failed)?;
        let fit_seconds = started.elapsed().as_secs_f64();

        let train_pred = classifier.predict(&data.x_train).map_err(failed)?;
        let test_pred = classifier.predict(&data.x_test).map_err(failed)?;
        let train_accuracy = accuracy(&data.y_train, &train_pred)?;
        let test_accuracy = accuracy(&data.y_test, &test_pred)?;
        let n_classes = data.label_encoder.n_classes();

        let evaluation = ModelEvaluation {
            model: name.to_string(),
            train_accuracy,
            test_accuracy,
            confusion_matrix: confusion_matrix(&data.y_test, &test_pred, n_classes)?,
            report: ClassificationReport::new(&data.y_test, &test_pred, data.class_names())?,
            grid_search: None,
            fit_seconds,
        };
        info!(
            model = name,
            train_accuracy,
            test_accuracy,
            fit_seconds,
            "model evaluated"
        );
        Ok(evaluation)
    }

    fn build(&self, kind: ModelKind, tuned: &HashMap<ModelKind, ParamSet>) -> PipelineResult<Box<dyn Classifier>> {
        let config = &self.config;
        let seed = config.split.seed;
        let tuned_params = |kind: ModelKind| tuned.get(&kind).cloned().unwrap_or_default();
        let model: Box<dyn Classifier> = match kind {
            ModelKind::Svc => Box::new(models::svc(&config.models.svc)?),
            ModelKind::Knn => Box::new(models::knn(&config.models.knn)?),
            ModelKind::DecisionTree => models::decision_tree_factory(&tuned_params(kind))?,
            ModelKind::RandomForest => Box::new(models::random_forest(config)),
            ModelKind::AdaBoost => models::ada_boost_factory(&tuned_params(kind))?,
            ModelKind::GradientBoosting => Box::new(models::gradient_boosting(&config.models.gradient_boosting, seed)),
            ModelKind::Sgb => Box::new(models::gradient_boosting(&config.models.sgb, seed)),
            ModelKind::ExtraTrees => Box::new(models::extra_trees(config)),
            ModelKind::Lgbm => Box::new(models::lgbm(&config.models.lgbm)),
            ModelKind::Voting => {
                let members = config
                    .enabled_models()
                    .into_iter()
                    .filter(|k| *k != ModelKind::Voting)
                    .map(|k| Ok((k.display_name().to_string(), self.build(k, tuned)?)))
                    .collect::<PipelineResult<Vec<_>>>()?;
                if members.is_empty() {
                    return Err(PipelineError::invalid(
                        "models.enabled",
                        "the voting classifier needs at least one other model",
                    ));
                }
                Box::new(VotingClassifier::new(members, config.models.voting.voting))
            }
        };
        Ok(model)
    }

    fn evaluate_grid<F: ClassifierFactory>(
        &self,
        name: &str,
        factory: F,
        grid: &ParamGrid,
        data: &PreparedData,
    ) -> PipelineResult<(ModelEvaluation, ParamSet)> {
        let mut search = GridSearchCV::new(factory, grid.clone(), self.config.selection.cv_folds);
        let mut evaluation = self.evaluate(name, &mut search, data)?;
        let best_params = search.best_params().cloned().unwrap_or_default();
        evaluation.grid_search = Some(GridSummary {
            best_params: best_params.clone(),
            best_score: search.best_score().unwrap_or(f64::NAN),
            n_candidates: search.results().len(),
            n_failed: search.results().iter().filter(|r| r.mean_score.is_nan()).count(),
        });
        Ok((evaluation, best_params))
    }

    /// Evaluate one model; grid-searched models record their winning parameters in `tuned`.
    pub fn run_model(
        &self,
        kind: ModelKind,
        data: &PreparedData,
        tuned: &mut HashMap<ModelKind, ParamSet>,
    ) -> PipelineResult<ModelEvaluation> {
        let name = kind.display_name();
        let _span = info_span!("model", name).entered();
        let grids = &self.config.models;
        let (evaluation, best) = match kind {
            ModelKind::DecisionTree => {
                self.evaluate_grid(name, models::decision_tree_factory, &grids.decision_tree.grid, data)?
            }
            ModelKind::AdaBoost => self.evaluate_grid(name, models::ada_boost_factory, &grids.ada_boost.grid, data)?,
            _ => {
                let mut model = self.build(kind, tuned)?;
                return self.evaluate(name, model.as_mut(), data);
            }
        };
        tuned.insert(kind, best);
        Ok(evaluation)
    }

    /// Prepare the data, then fit and score every enabled model in order.
    pub fn run(&self) -> PipelineResult<RunReport> {
        let data = {
            let _span = info_span!("prepare").entered();
            self.prepare()?
        };
        let mut tuned = HashMap::new();
        let mut evaluations = Vec::new();
        for kind in self.config.enabled_models() {
            evaluations.push(self.run_model(kind, &data, &mut tuned)?);
        }
        let leaderboard = Leaderboard::from_evaluations(&evaluations);
        if let Some(best) = leaderboard.best() {
            info!(model = %best.model, score = best.score, "best model");
        }
        Ok(RunReport {
            dataset: data.summary,
            models: evaluations,
            leaderboard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimguard_core::Matrix;
    use claimguard_preprocessing::{LabelEncoder, StandardScaler};

    fn blobs() -> PreparedData {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let c = i % 2;
            let offset = if c == 0 { 0.0 } else { 4.0 };
            let jitter = (i as f64 * 0.37).sin();
            rows.push(vec![offset + jitter, offset - jitter * 0.5]);
            y.push(c);
        }
        let x = Matrix::from_rows(&rows).unwrap();
        let mut label_encoder = LabelEncoder::new();
        label_encoder.fit(&["N", "Y"]);
        PreparedData {
            x_train: x.select_rows(&(0..30).collect::<Vec<_>>()).unwrap(),
            x_test: x.select_rows(&(30..40).collect::<Vec<_>>()).unwrap(),
            y_train: y[..30].to_vec(),
            y_test: y[30..].to_vec(),
            feature_names: vec!["a".into(), "b".into()],
            label_encoder,
            scaler: StandardScaler::new(),
            summary: Default::default(),
        }
    }

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.selection.cv_folds = 3;
        config.models.knn.k = 3;
        config.models.decision_tree.grid = ParamGrid::new().add("max_depth", vec![1i64, 3]);
        config.models.ada_boost.grid = ParamGrid::new().add("n_estimators", vec![5i64]);
        config.models.random_forest.n_estimators = 10;
        config.models.extra_trees.n_estimators = 10;
        config.models.gradient_boosting.n_estimators = 10;
        config.models.sgb.n_estimators = 10;
        config.models.lgbm.n_estimators = 10;
        config.models.lgbm.min_child_samples = 5;
        config
    }

    #[test]
    fn test_evaluate_separable_blobs() {
        let pipeline = Pipeline::new(small_config());
        let data = blobs();
        let mut knn = models::knn(&pipeline.config().models.knn).unwrap();
        let eval = pipeline.evaluate("KNN", &mut knn, &data).unwrap();
        assert_eq!(eval.test_accuracy, 1.0);
        assert_eq!(eval.confusion_matrix, vec![vec![5, 0], vec![0, 5]]);
        assert_eq!(eval.report.classes[1].name, "Y");
    }

    #[test]
    fn test_every_model_runs() {
        let pipeline = Pipeline::new(small_config());
        let data = blobs();
        let mut tuned = HashMap::new();
        let mut names = Vec::new();
        for kind in pipeline.config().enabled_models() {
            let eval = pipeline.run_model(kind, &data, &mut tuned).unwrap();
            assert!(eval.test_accuracy >= 0.8, "{} scored {}", eval.model, eval.test_accuracy);
            names.push(eval.model);
        }
        assert_eq!(names.len(), 10);
        assert_eq!(names[9], "Voting Classifier");
        assert!(tuned.contains_key(&ModelKind::DecisionTree));
        assert!(tuned.contains_key(&ModelKind::AdaBoost));
    }

    #[test]
    fn test_grid_summary_recorded() {
        let pipeline = Pipeline::new(small_config());
        let mut tuned = HashMap::new();
        let eval = pipeline.run_model(ModelKind::DecisionTree, &blobs(), &mut tuned).unwrap();
        let grid = eval.grid_search.unwrap();
        assert_eq!(grid.n_candidates, 2);
        assert_eq!(grid.n_failed, 0);
        assert!(grid.best_params.contains_key("max_depth"));
    }

    #[test]
    fn test_voting_alone_is_rejected() {
        let mut config = small_config();
        config.models.enabled = vec![ModelKind::Voting];
        let pipeline = Pipeline::new(config);
        let err = pipeline.run_model(ModelKind::Voting, &blobs(), &mut HashMap::new());
        assert!(matches!(err, Err(PipelineError::InvalidConfig { .. })));
    }
}
