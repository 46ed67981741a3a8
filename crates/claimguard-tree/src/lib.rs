mod builder;
pub mod decision_tree;
pub mod random_forest;
pub mod extra_trees;
pub mod adaboost;
pub mod gradient_boosting;
pub mod hist_gradient_boosting;

#[cfg(test)]
pub(crate) mod testing;

pub use decision_tree::*;
pub use random_forest::*;
pub use extra_trees::*;
pub use adaboost::*;
pub use gradient_boosting::*;
pub use hist_gradient_boosting::*;
