pub mod error;
pub mod pattern;
pub mod resolver;

pub use error::*;
pub use pattern::*;
pub use resolver::*;
