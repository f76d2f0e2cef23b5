use super::{CompilationError, ToolchainError};
use crate::planner::CompilationBatch;
use crate::types::{CompiledArtifact, CompilerProfile};
use async_trait::async_trait;

/// What one toolchain invocation produced for a batch.
#[derive(Debug, Clone, Default)]
pub struct ToolchainOutput {
    pub contracts: Vec<CompiledArtifact>,
    /// Error-severity diagnostics. Non-empty means the batch failed.
    pub diagnostics: Vec<CompilationError>,
}

impl ToolchainOutput {
    pub fn succeeded(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// External compiler, invoked once per batch with the profile's settings.
/// Output is expected for the batch artifacts only; its dependencies are
/// read-only context.
///
/// Source-level problems belong in [`ToolchainOutput::diagnostics`]; an `Err`
/// means the toolchain itself could not be run and aborts the whole build.
#[async_trait]
pub trait CompilerToolchain: Send + Sync {
    async fn compile(
        &self,
        profile: &CompilerProfile,
        batch: &CompilationBatch,
    ) -> Result<ToolchainOutput, ToolchainError>;

    fn name(&self) -> &'static str;
}
