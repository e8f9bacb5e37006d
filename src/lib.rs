//! railyard: release orchestration
//!
//! Stages build, package, sign and publish release artifacts. They share one
//! concurrent [`artifact::Catalog`] owned by the run [`core::context::Context`]
//! and fan out their work through the [`group`] family.

pub mod artifact;
pub mod checks;
pub mod commands;
pub mod core;
pub mod group;
pub mod pipe;
pub mod pipeline;
pub mod skips;
pub mod stages;
pub mod ui;
