pub mod profiles;

pub use crate::config::ConfigError;
pub use profiles::*;
