pub mod artifact;
pub mod deployment;
pub mod profile;

pub use artifact::*;
pub use deployment::*;
pub use profile::*;
