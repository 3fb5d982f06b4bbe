//! # doxprep - documentation and CI helpers for Arduino libraries
//!
//! doxprep prepares the Markdown sources of an embedded library for Doxygen
//! and generates the scripts its GitHub Actions workflows run.
//!
//! ## Quick Start
//!
//! ```bash
//! # Use as a Doxygen INPUT_FILTER
//! doxprep filter docs/ReadMe.md --repo ModularSensors
//!
//! # Build scripts for every example and board
//! doxprep matrix
//! ```
//!
//! ## Module Organization
//!
//! - [`docs`] - Markdown pre-filter, name codec, example pages, HTML cleanup
//! - [`ci`] - job matrices and install scripts
//! - [`config`] - Configuration parsing (`doxprep.toml`)
//! - [`error`] - Error types

/// CI script and job matrix generators.
pub mod ci;

/// Configuration file parsing (`doxprep.toml`).
pub mod config;

/// Documentation tooling around Doxygen.
pub mod docs;

pub mod error;

pub use error::{DoxprepError, Result};
