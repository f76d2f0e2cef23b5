pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod etherscan;

pub use backend::*;
pub use dispatcher::*;
pub use error::*;
pub use etherscan::{EtherscanBackend, EtherscanFactory};
