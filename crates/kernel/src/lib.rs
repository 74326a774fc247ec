//! Verso CMS Kernel Library
//!
//! The extensibility core of the Verso content system: the feature runtime,
//! the plugin package manager, and the section/element rendering pipeline.
//! The `verso` binary wires these behind a thin HTTP layer.

pub mod config;
pub mod error;
pub mod feature;
pub mod host;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod repo;
pub mod routes;
pub mod state;
pub mod theme;
