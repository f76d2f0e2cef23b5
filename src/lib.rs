//! Contract Deploy - versioned compiler routing and deployment orchestration
//!
//! Routes every Solidity source to one of several compiler versions, compiles
//! the resulting batches in parallel, deploys new or changed contracts to each
//! configured network exactly once, and submits them for source verification.
//!
//! Data flows `registry` → `routing` → `planner` → `compilation` → `deploy` →
//! `verify`; `pipeline` wires one run together.

pub mod cli;
pub mod compilation;
pub mod config;
pub mod deploy;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod retry;
pub mod routing;
pub mod scanner;
pub mod types;
pub mod verify;

pub use pipeline::{CancellationSignal, Pipeline, PipelineError, RunSummary};
pub use registry::ProfileRegistry;
pub use types::*;
