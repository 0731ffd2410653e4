//! Parsing and validation of `kiln.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ProjectConfig`], then resolves each module into its production and test
//! [`ResolvedTarget`]s with absolute roots, output directories, and dependency
//! edges.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_targets, ResolvedDependency, ResolvedRoot, ResolvedTarget};
pub use types::*;
