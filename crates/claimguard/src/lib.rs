//! # ClaimGuard
//!
//! Fraud detection on auto-insurance claims: load and clean a claims table,
//! encode it, then fit and compare a range of classifiers.
//!
//! ## Modules
//!
//! - **core**: dense `Matrix`, the `Classifier` trait, shared errors
//! - **frame**: typed CSV table with missing values, cleaning and statistics
//! - **preprocessing**: LabelEncoder, one-hot dummies, train/test split, StandardScaler, stratified k-fold
//! - **tree**: Decision Tree, Random Forest, Extra Trees, AdaBoost, Gradient Boosting, histogram boosting
//! - **svm**: kernel SVC
//! - **neighbors**: KNN classifier
//! - **metrics**: accuracy, confusion matrix, classification report
//! - **selection**: parameter grids, cross-validated grid search, voting ensemble
//! - **pipeline**: configuration, data preparation, model runs and the comparison report

/// Matrix and classifier trait.
pub use claimguard_core as core;

/// Claims table loading and cleaning.
pub use claimguard_frame as frame;

/// Encoding, splitting and scaling.
pub use claimguard_preprocessing as preprocessing;

/// Tree-based models.
pub use claimguard_tree as tree;

/// Support vector machines.
pub use claimguard_svm as svm;

/// Nearest neighbors.
pub use claimguard_neighbors as neighbors;

/// Evaluation metrics.
pub use claimguard_metrics as metrics;

/// Hyper-parameter search and ensembles.
pub use claimguard_selection as selection;

/// End-to-end pipeline.
pub use claimguard_pipeline as pipeline;
