pub mod artifacts;
pub mod error;
pub mod executor;
pub mod solc;
pub mod toolchain;

pub use artifacts::ArtifactWriter;
pub use error::{CompilationError, ToolchainError};
pub use executor::*;
pub use solc::SolcToolchain;
pub use toolchain::*;
