pub mod matrix;
pub mod error;
pub mod classifier;

pub use matrix::Matrix;
pub use error::{ClaimError, ClaimResult};
pub use classifier::{argmax, n_classes_of, Classifier};
