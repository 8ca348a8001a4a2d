//! # casa common library
//!
//! Shared code for the casa services:
//! - Error type used by configuration and data loading
//! - Configuration loading (TOML file, environment, OS defaults)

pub mod config;
pub mod error;

pub use error::{Error, Result};
