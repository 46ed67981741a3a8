use std::fmt;
use std::path::Path;

use claimguard_metrics::ClassificationReport;
use claimguard_selection::{format_params, ParamSet};
use serde::Serialize;

use crate::error::PipelineResult;

/// A pair of numeric columns whose correlation reached the report threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub a: String,
    pub b: String,
    pub r: f64,
}

/// What happened to the raw data before modelling.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub source: Option<String>,
    pub rows: usize,
    pub raw_columns: usize,
    /// Missing cells per column before imputation (only columns with any).
    pub missing_before_imputation: Vec<(String, usize)>,
    /// `(column, fill value)` per imputed column.
    pub imputed: Vec<(String, String)>,
    pub dropped: Vec<String>,
    pub correlated_pairs: Vec<CorrelatedPair>,
    /// `(label, count)` over the full data.
    pub class_balance: Vec<(String, usize)>,
    pub features: Vec<String>,
    pub scaled: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSummary {
    pub best_params: ParamSet,
    pub best_score: f64,
    pub n_candidates: usize,
    pub n_failed: usize,
}

/// Scores of one fitted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEvaluation {
    pub model: String,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub report: ClassificationReport,
    pub grid_search: Option<GridSummary>,
    pub fit_seconds: f64,
}

impl fmt::Display for ModelEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(grid) = &self.grid_search {
            writeln!(f, "Best parameters of {} : {}", self.model, format_params(&grid.best_params))?;
            writeln!(f, "Best cross-validation score of {} : {}", self.model, grid.best_score)?;
        }
        writeln!(f, "Training accuracy of {} is : {}", self.model, self.train_accuracy)?;
        writeln!(f, "Test accuracy of {} is : {}", self.model, self.test_accuracy)?;
        writeln!(f)?;
        writeln!(f, "Confusion Matrix :-")?;
        for row in &self.confusion_matrix {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>4}", c)).collect();
            writeln!(f, "[{} ]", cells.join(""))?;
        }
        writeln!(f)?;
        writeln!(f, "Classification Report :-")?;
        write!(f, "{}", self.report)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub model: String,
    pub score: f64,
}

/// Models sorted by test accuracy, best first; equal scores keep run order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn from_evaluations(models: &[ModelEvaluation]) -> Self {
        let mut entries: Vec<LeaderboardEntry> = models
            .iter()
            .map(|m| LeaderboardEntry {
                model: m.model.clone(),
                score: m.test_accuracy,
            })
            .collect();
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        Leaderboard { entries }
    }

    pub fn best(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }
}

impl fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .entries
            .iter()
            .map(|e| e.model.len())
            .chain(std::iter::once("Model".len()))
            .max()
            .unwrap_or(0);
        writeln!(f, "{:>4}  {:<width$}  {:>8}", "", "Model", "Score")?;
        for (rank, e) in self.entries.iter().enumerate() {
            writeln!(f, "{:>4}  {:<width$}  {:>8.4}", rank + 1, e.model, e.score)?;
        }
        Ok(())
    }
}

/// Everything one run produced; serializes to JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub dataset: DatasetSummary,
    pub models: Vec<ModelEvaluation>,
    pub leaderboard: Leaderboard,
}

impl RunReport {
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> PipelineResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(model: &str, test_accuracy: f64) -> ModelEvaluation {
        ModelEvaluation {
            model: model.to_string(),
            train_accuracy: 1.0,
            test_accuracy,
            confusion_matrix: vec![vec![1, 0], vec![0, 1]],
            report: ClassificationReport::new(&[0, 1], &[0, 1], &["N", "Y"]).unwrap(),
            grid_search: None,
            fit_seconds: 0.0,
        }
    }

    #[test]
    fn test_leaderboard_sort_is_stable() {
        let models = vec![evaluation("SVC", 0.7), evaluation("KNN", 0.8), evaluation("LGBM", 0.7)];
        let board = Leaderboard::from_evaluations(&models);
        let names: Vec<&str> = board.entries.iter().map(|e| e.model.as_str()).collect();
        assert_eq!(names, vec!["KNN", "SVC", "LGBM"]);
        assert_eq!(board.best().unwrap().model, "KNN");
        assert!(board.to_string().lines().nth(1).unwrap().contains("KNN"));
    }

    #[test]
    fn test_run_report_json() {
        let models = vec![evaluation("SVC", 0.75)];
        let report = RunReport {
            dataset: DatasetSummary {
                rows: 4,
                ..DatasetSummary::default()
            },
            leaderboard: Leaderboard::from_evaluations(&models),
            models,
        };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["dataset"]["rows"], 4);
        assert_eq!(json["leaderboard"][0]["model"], "SVC");
        assert_eq!(json["models"][0]["confusion_matrix"][1][1], 1);
    }
}
