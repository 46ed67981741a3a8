pub mod error;
pub mod column;
pub mod frame;
pub mod stats;

pub use error::{FrameError, FrameResult};
pub use column::{Column, ColumnData, ColumnKind};
pub use frame::{CsvOptions, Frame};
pub use stats::{ColumnSummary, CorrelationMatrix};
