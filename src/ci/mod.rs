//! Generators for the GitHub Actions workflows that compile the library
//! examples with the Arduino CLI and PlatformIO.
//!
//! Every generator writes plain bash scripts into
//! `continuous_integration_artifacts/` so later jobs only have to run them.

pub mod boards;
pub mod install;
pub mod matrix;
pub mod workspace;

pub use workspace::Workspace;
