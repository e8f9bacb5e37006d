//! Core building blocks shared by every stage
//!
//! - **config**: project configuration (railyard.toml) parsing and validation
//! - **context**: the run handle owning config, catalog and skips for one run
//! - **error**: detailed errors, configuration errors and exit codes
//! - **exec**: external command execution with captured output and deadlines
//! - **tmpl**: `{key}` name templates

pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod tmpl;
