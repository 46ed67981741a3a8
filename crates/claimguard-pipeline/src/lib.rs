pub mod error;
pub mod config;
pub mod models;
pub mod data;
pub mod report;
pub mod pipeline;

pub use error::{PipelineError, PipelineResult};
pub use config::*;
pub use data::{inspect, prepare, Inspection, PreparedData};
pub use report::*;
pub use pipeline::Pipeline;
