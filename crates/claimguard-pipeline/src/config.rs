//! Pipeline configuration: compiled defaults, an optional TOML file, then
//! command-line overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use claimguard_frame::ColumnKind;
use claimguard_selection::{ParamGrid, Voting};
use claimguard_tree::{Criterion, MaxFeatures};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Every model the pipeline knows, in the order it runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Svc,
    Knn,
    DecisionTree,
    RandomForest,
    AdaBoost,
    GradientBoosting,
    Sgb,
    ExtraTrees,
    Lgbm,
    Voting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 10] = [
        ModelKind::Svc,
        ModelKind::Knn,
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::AdaBoost,
        ModelKind::GradientBoosting,
        ModelKind::Sgb,
        ModelKind::ExtraTrees,
        ModelKind::Lgbm,
        ModelKind::Voting,
    ];

    /// Name used in reports and the comparison table.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Svc => "SVC",
            ModelKind::Knn => "KNN",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::AdaBoost => "Ada Boost",
            ModelKind::GradientBoosting => "Gradient Boost",
            ModelKind::Sgb => "SGB",
            ModelKind::ExtraTrees => "Extra Trees",
            ModelKind::Lgbm => "LGBM",
            ModelKind::Voting => "Voting Classifier",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ModelKind::Svc => "svc",
            ModelKind::Knn => "knn",
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
            ModelKind::AdaBoost => "ada_boost",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::Sgb => "sgb",
            ModelKind::ExtraTrees => "extra_trees",
            ModelKind::Lgbm => "lgbm",
            ModelKind::Voting => "voting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ModelKind::ALL
            .into_iter()
            .find(|k| k.key() == wanted)
            .ok_or_else(|| PipelineError::UnknownModel(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub path: Option<PathBuf>,
    /// Cell text meaning "missing".
    pub missing_marker: String,
    pub target: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            path: None,
            missing_marker: "?".to_string(),
            target: "fraud_reported".to_string(),
        }
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningConfig {
    /// Columns whose missing values are replaced by the column mode.
    pub impute_mode: Vec<String>,
    /// Identifiers, dates and high-cardinality columns.
    pub drop: Vec<String>,
    /// Columns removed because they duplicate another feature.
    pub drop_correlated: Vec<String>,
    /// When set, greedily drop one column of every pair at or above it.
    pub correlation_threshold: Option<f64>,
    /// Pairs at or above this are logged.
    pub report_threshold: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        CleaningConfig {
            impute_mode: strings(&[
                "collision_type",
                "property_damage",
                "authorities_contacted",
                "police_report_available",
            ]),
            drop: strings(&[
                "policy_number",
                "policy_bind_date",
                "policy_state",
                "insured_zip",
                "incident_location",
                "incident_date",
                "incident_state",
                "incident_city",
                "insured_hobbies",
                "auto_make",
                "auto_model",
                "auto_year",
                "_c39",
            ]),
            drop_correlated: strings(&["age", "total_claim_amount"]),
            correlation_threshold: None,
            report_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureConfig {
    /// Numeric column kinds kept as features; categoricals are always one-hot encoded.
    pub numeric_kinds: Vec<ColumnKind>,
    /// Columns to standardize; `None` means every numeric feature column.
    pub scale: Option<Vec<String>>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            numeric_kinds: vec![ColumnKind::Integer],
            scale: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    pub test_size: f64,
    /// Seeds the split and every stochastic model.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            test_size: 0.25,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    pub cv_folds: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig { cv_folds: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SvcConfig {
    pub c: f64,
    /// `linear`, `rbf` or `poly`.
    pub kernel: String,
    /// `None` resolves to `1 / (n_features * X.var())`.
    pub gamma: Option<f64>,
    pub degree: u32,
    pub coef0: f64,
}

impl Default for SvcConfig {
    fn default() -> Self {
        SvcConfig {
            c: 1.0,
            kernel: "rbf".to_string(),
            gamma: None,
            degree: 3,
            coef0: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KnnConfig {
    pub k: usize,
    /// `euclidean` or `manhattan`.
    pub metric: String,
}

impl Default for KnnConfig {
    fn default() -> Self {
        KnnConfig {
            k: 30,
            metric: "euclidean".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub grid: ParamGrid,
}

impl GridConfig {
    fn decision_tree() -> Self {
        GridConfig {
            grid: ParamGrid::new()
                .add("criterion", vec!["gini", "entropy"])
                .add("max_depth", vec![3i64, 5, 7, 10])
                .add("min_samples_split", (2i64..10).collect::<Vec<_>>())
                .add("min_samples_leaf", (2i64..10).collect::<Vec<_>>()),
        }
    }

    fn ada_boost() -> Self {
        GridConfig {
            grid: ParamGrid::new()
                .add("n_estimators", vec![50i64, 70, 90, 120, 180, 200])
                .add("learning_rate", vec![0.001, 0.01, 0.1, 1.0, 10.0])
                .add("algorithm", vec!["SAMME", "SAMME.R"]),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig { grid: ParamGrid::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomForestConfig {
    pub n_estimators: usize,
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub max_features: MaxFeatures,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        RandomForestConfig {
            n_estimators: 140,
            criterion: Criterion::Entropy,
            max_depth: Some(10),
            max_features: MaxFeatures::Sqrt,
            min_samples_leaf: 1,
            min_samples_split: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    /// Fraction of features examined per split; `None` means all.
    pub max_features: Option<f64>,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        BoostingConfig {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 1.0,
            max_features: None,
        }
    }
}

impl BoostingConfig {
    fn stochastic() -> Self {
        BoostingConfig {
            subsample: 0.9,
            max_features: Some(0.7),
            ..BoostingConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtraTreesConfig {
    pub n_estimators: usize,
}

impl Default for ExtraTreesConfig {
    fn default() -> Self {
        ExtraTreesConfig { n_estimators: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LgbmConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
}

impl Default for LgbmConfig {
    fn default() -> Self {
        LgbmConfig {
            n_estimators: 100,
            learning_rate: 1.0,
            num_leaves: 31,
            min_child_samples: 20,
            reg_lambda: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VotingConfig {
    pub voting: Voting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    pub enabled: Vec<ModelKind>,
    pub svc: SvcConfig,
    pub knn: KnnConfig,
    pub decision_tree: GridConfig,
    pub random_forest: RandomForestConfig,
    pub ada_boost: GridConfig,
    pub gradient_boosting: BoostingConfig,
    pub sgb: BoostingConfig,
    pub extra_trees: ExtraTreesConfig,
    pub lgbm: LgbmConfig,
    pub voting: VotingConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        ModelsConfig {
            enabled: ModelKind::ALL.to_vec(),
            svc: SvcConfig::default(),
            knn: KnnConfig::default(),
            decision_tree: GridConfig::decision_tree(),
            random_forest: RandomForestConfig::default(),
            ada_boost: GridConfig::ada_boost(),
            gradient_boosting: BoostingConfig::default(),
            sgb: BoostingConfig::stochastic(),
            extra_trees: ExtraTreesConfig::default(),
            lgbm: LgbmConfig::default(),
            voting: VotingConfig::default(),
        }
    }
}

/// Top-level configuration.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. TOML file
/// 3. Compiled defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub cleaning: CleaningConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub selection: SelectionConfig,
    pub models: ModelsConfig,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data: Option<PathBuf>,
    pub seed: Option<u64>,
    pub test_size: Option<f64>,
    pub models: Option<Vec<ModelKind>>,
}

impl PipelineConfig {
    /// Load with layered resolution and validate the result.
    pub fn load(path: Option<&Path>, cli: &CliOverrides) -> PipelineResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_cli_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::ConfigParse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Parse a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> PipelineResult<Self> {
        toml::from_str(toml_str).map_err(|e| PipelineError::ConfigParse {
            path: "<string>".to_string(),
            source: e,
        })
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(path) = &cli.data {
            self.data.path = Some(path.clone());
        }
        if let Some(seed) = cli.seed {
            self.split.seed = seed;
        }
        if let Some(test_size) = cli.test_size {
            self.split.test_size = test_size;
        }
        if let Some(models) = &cli.models {
            self.models.enabled = models.clone();
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.split.test_size > 0.0 && self.split.test_size < 1.0) {
            return Err(PipelineError::invalid("split.test_size", "must lie strictly between 0 and 1"));
        }
        if self.selection.cv_folds < 2 {
            return Err(PipelineError::invalid("selection.cv_folds", "must be at least 2"));
        }
        if self.data.target.is_empty() {
            return Err(PipelineError::invalid("data.target", "must name a column"));
        }
        for (field, value) in [
            ("cleaning.correlation_threshold", self.cleaning.correlation_threshold),
            ("cleaning.report_threshold", Some(self.cleaning.report_threshold)),
        ] {
            if let Some(t) = value {
                if !(0.0..=1.0).contains(&t) {
                    return Err(PipelineError::invalid(field, "must be between 0.0 and 1.0"));
                }
            }
        }
        if self.features.numeric_kinds.contains(&ColumnKind::Categorical) {
            return Err(PipelineError::invalid(
                "features.numeric_kinds",
                "accepts only `integer` and `float`",
            ));
        }
        if self.models.enabled.is_empty() {
            return Err(PipelineError::invalid("models.enabled", "enable at least one model"));
        }
        Ok(())
    }

    /// Enabled models in run order, without duplicates.
    pub fn enabled_models(&self) -> Vec<ModelKind> {
        ModelKind::ALL
            .into_iter()
            .filter(|k| self.models.enabled.contains(k))
            .collect()
    }
}
