pub mod batches;
pub mod error;

pub use batches::*;
pub use error::{PlanError, Result};
