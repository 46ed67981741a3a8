pub mod params;
pub mod validation;
pub mod grid_search;
pub mod voting;

pub use params::*;
pub use validation::*;
pub use grid_search::*;
pub use voting::*;
