//! Plugin packaging, installation, and lifecycle.

pub mod error;
pub mod info;
pub mod manager;
pub mod package;

pub use error::{PluginError, PluginResult};
pub use info::PluginInfo;
pub use manager::{PluginManager, PluginRecord};
pub use package::{LocalPluginFiles, PluginFileManager, read_manifest};
