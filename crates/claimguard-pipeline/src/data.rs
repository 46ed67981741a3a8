//! Load, clean, encode, split and scale the claims table.

use std::fmt;

use claimguard_core::Matrix;
use claimguard_frame::{ColumnKind, ColumnSummary, CsvOptions, Frame, FrameError};
use claimguard_preprocessing::{get_dummies, train_test_split, LabelEncoder, StandardScaler};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::report::{CorrelatedPair, DatasetSummary};

/// Model-ready train and test data.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x_train: Matrix,
    pub x_test: Matrix,
    pub y_train: Vec<usize>,
    pub y_test: Vec<usize>,
    pub feature_names: Vec<String>,
    pub label_encoder: LabelEncoder,
    pub scaler: StandardScaler,
    pub summary: DatasetSummary,
}

impl PreparedData {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Class names in encoded order.
    pub fn class_names(&self) -> &[String] {
        &self.label_encoder.classes
    }
}

fn csv_options(config: &PipelineConfig) -> CsvOptions {
    CsvOptions {
        missing_marker: config.data.missing_marker.clone(),
        ..CsvOptions::default()
    }
}

fn load(config: &PipelineConfig) -> PipelineResult<Frame> {
    let path = config.data.path.as_ref().ok_or(PipelineError::MissingDataPath)?;
    let frame = Frame::read_csv(path, &csv_options(config))?;
    info!(path = %path.display(), rows = frame.n_rows(), columns = frame.n_cols(), "loaded claims");
    Ok(frame)
}

/// Keep the names present in `frame`, warning about the rest.
fn present(frame: &Frame, names: &[String], step: &str) -> Vec<String> {
    names
        .iter()
        .filter(|n| {
            let found = frame.has_column(n);
            if !found {
                warn!(column = %n, step, "column not in data; skipped");
            }
            found
        })
        .cloned()
        .collect()
}

fn correlated_pairs(frame: &Frame, threshold: f64) -> PipelineResult<Vec<CorrelatedPair>> {
    Ok(frame
        .correlation()?
        .pairs_above(threshold)
        .into_iter()
        .map(|(a, b, r)| CorrelatedPair { a, b, r })
        .collect())
}

/// Run every preparation step on a loaded frame.
pub fn prepare_frame(mut frame: Frame, config: &PipelineConfig) -> PipelineResult<PreparedData> {
    let cleaning = &config.cleaning;
    let mut summary = DatasetSummary {
        source: config.data.path.as_ref().map(|p| p.display().to_string()),
        rows: frame.n_rows(),
        raw_columns: frame.n_cols(),
        ..DatasetSummary::default()
    };
    summary.missing_before_imputation = frame
        .missing_counts()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect();
    for (name, count) in &summary.missing_before_imputation {
        debug!(column = %name, count, "missing values");
    }

    let impute = present(&frame, &cleaning.impute_mode, "impute");
    summary.imputed = frame.fill_mode_all(&impute)?;
    for (name, fill) in &summary.imputed {
        debug!(column = %name, fill = %fill, "imputed with mode");
    }

    let mut dropped = present(&frame, &cleaning.drop, "drop");
    frame.drop(&dropped)?;

    summary.correlated_pairs = correlated_pairs(&frame, cleaning.report_threshold)?;
    for pair in &summary.correlated_pairs {
        info!(a = %pair.a, b = %pair.b, r = pair.r, "highly correlated pair");
    }
    let mut correlated = present(&frame, &cleaning.drop_correlated, "drop_correlated");
    if let Some(threshold) = cleaning.correlation_threshold {
        for name in frame.correlation()?.prune_candidates(threshold) {
            if name != config.data.target && !correlated.contains(&name) {
                correlated.push(name);
            }
        }
    }
    frame.drop(&correlated)?;
    dropped.extend(correlated);
    summary.dropped = dropped;

    let target = match frame.take(&config.data.target) {
        Ok(col) => col,
        Err(FrameError::UnknownColumn(name)) => return Err(PipelineError::MissingTarget(name)),
        Err(e) => return Err(e.into()),
    };
    let labels: Vec<String> = match target.as_categorical() {
        Some(values) => values.iter().map(|v| v.clone().unwrap_or_default()).collect(),
        None => target
            .as_numeric()
            .unwrap_or_default()
            .iter()
            .map(|v| v.map(|x| x.to_string()).unwrap_or_default())
            .collect(),
    };
    if target.missing_count() > 0 {
        return Err(FrameError::MissingValues {
            column: target.name.clone(),
            count: target.missing_count(),
        }
        .into());
    }
    let mut label_encoder = LabelEncoder::new();
    let y = label_encoder.fit_transform(&labels)?;
    summary.class_balance = label_encoder
        .classes
        .iter()
        .enumerate()
        .map(|(c, name)| (name.clone(), y.iter().filter(|&&v| v == c).count()))
        .collect();

    let numeric = frame.select_kinds(&config.features.numeric_kinds);
    let numeric_names = numeric.column_names();
    let dummies = get_dummies(&frame.select_kinds(&[ColumnKind::Categorical]), true)?;
    let features = numeric.concat(dummies)?;
    let feature_names = features.column_names();
    if feature_names.is_empty() {
        return Err(PipelineError::invalid("features", "no feature columns remain after cleaning"));
    }
    let x = features.to_matrix()?;
    info!(rows = x.rows(), features = x.cols(), numeric = numeric_names.len(), "encoded features");

    let (x_train, x_test, y_train, y_test) =
        train_test_split(&x, &y, config.split.test_size, Some(config.split.seed))?;

    let scaled = match &config.features.scale {
        Some(names) => present(&features, names, "scale"),
        None => numeric_names,
    };
    let scale_idx: Vec<usize> = scaled
        .iter()
        .filter_map(|n| feature_names.iter().position(|f| f == n))
        .collect();
    let mut scaler = StandardScaler::with_columns(scale_idx);
    let x_train = scaler.fit_transform(&x_train)?;
    let x_test = scaler.transform(&x_test)?;

    summary.features = feature_names.clone();
    summary.scaled = scaled;
    summary.n_train = x_train.rows();
    summary.n_test = x_test.rows();

    Ok(PreparedData {
        x_train,
        x_test,
        y_train,
        y_test,
        feature_names,
        label_encoder,
        scaler,
        summary,
    })
}

/// Load the configured CSV and prepare it.
pub fn prepare(config: &PipelineConfig) -> PipelineResult<PreparedData> {
    prepare_frame(load(config)?, config)
}

/// Exploratory view of the raw claims table.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub rows: usize,
    pub kinds: Vec<(String, ColumnKind)>,
    pub missing: Vec<(String, usize)>,
    pub unique: Vec<(String, usize)>,
    pub describe: Vec<ColumnSummary>,
    pub categories: Vec<(String, Vec<String>)>,
    pub correlated_pairs: Vec<CorrelatedPair>,
}

pub fn inspect_frame(frame: &Frame, config: &PipelineConfig) -> PipelineResult<Inspection> {
    let mut categories = Vec::new();
    for (name, kind) in frame.kinds() {
        if kind == ColumnKind::Categorical {
            let values = frame.unique_values(&name)?;
            categories.push((name, values));
        }
    }
    Ok(Inspection {
        rows: frame.n_rows(),
        kinds: frame.kinds(),
        missing: frame.missing_counts(),
        unique: frame.n_unique(),
        describe: frame.describe(),
        categories,
        correlated_pairs: correlated_pairs(frame, config.cleaning.report_threshold)?,
    })
}

pub fn inspect(config: &PipelineConfig) -> PipelineResult<Inspection> {
    inspect_frame(&load(config)?, config)
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Shape: ({}, {})", self.rows, self.kinds.len())?;
        let width = self.kinds.iter().map(|(n, _)| n.len()).max().unwrap_or(0);

        writeln!(f, "\n{:<width$}  {:<12} {:>8} {:>8}", "Column", "Kind", "Missing", "Unique")?;
        for (((name, kind), (_, missing)), (_, unique)) in
            self.kinds.iter().zip(&self.missing).zip(&self.unique)
        {
            writeln!(f, "{:<width$}  {:<12} {:>8} {:>8}", name, kind.to_string(), missing, unique)?;
        }

        writeln!(
            f,
            "\n{:<width$}  {:>6} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for s in &self.describe {
            writeln!(
                f,
                "{:<width$}  {:>6} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                s.name, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
            )?;
        }

        for (name, values) in &self.categories {
            writeln!(f, "\n{}: {}", name, values.join(", "))?;
        }

        if !self.correlated_pairs.is_empty() {
            writeln!(f, "\nHighly correlated pairs:")?;
            for p in &self.correlated_pairs {
                writeln!(f, "  {} ~ {}: {:.3}", p.a, p.b, p.r)?;
            }
        }
        Ok(())
    }
}
