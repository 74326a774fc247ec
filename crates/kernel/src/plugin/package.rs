//! Plugin archive handling.
//!
//! Plugins ship as gzip-compressed tarballs. Manifest discovery reads the
//! archive in memory; extraction unpacks it under the plugin file root while
//! guarding against path traversal, unsafe entry types, oversized archives,
//! and excessive entry counts.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use super::error::{PluginError, PluginResult};
use super::info::PluginInfo;

/// Maximum number of entries allowed in a plugin archive.
const MAX_ENTRY_COUNT: usize = 4_096;

/// Maximum total extracted size (100 MB), gzip bomb protection.
const MAX_EXTRACTED_SIZE: u64 = 100_000_000;

/// Maximum manifest file size.
const MAX_MANIFEST_SIZE: u64 = 64 * 1024;

/// Locate and parse the single `<slug>.info.toml` manifest in an archive.
///
/// Archives with zero or multiple manifests are rejected, as are manifests
/// whose filename does not agree with the slug they declare.
pub fn read_manifest(data: &[u8]) -> PluginResult<PluginInfo> {
    let decoder = GzDecoder::new(data);
    let mut archive = Archive::new(decoder);

    let mut manifest: Option<(String, String)> = None;
    let entries = archive.entries().map_err(|e| PluginError::InvalidPackage {
        details: format!("failed to read archive: {e}"),
    })?;

    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| PluginError::InvalidPackage {
            details: format!("failed to read archive entry: {e}"),
        })?;

        let path = entry
            .path()
            .map_err(|e| PluginError::InvalidPackage {
                details: format!("failed to read entry path: {e}"),
            })?
            .into_owned();

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.ends_with(".info.toml") {
            continue;
        }

        if manifest.is_some() {
            return Err(PluginError::InvalidPackage {
                details: "archive contains more than one .info.toml manifest".into(),
            });
        }

        let size = entry.header().size().unwrap_or(0);
        if size > MAX_MANIFEST_SIZE {
            return Err(PluginError::InvalidPackage {
                details: format!("manifest exceeds {MAX_MANIFEST_SIZE} bytes"),
            });
        }

        let mut source = String::new();
        entry
            .read_to_string(&mut source)
            .map_err(|e| PluginError::InvalidPackage {
                details: format!("manifest is not valid UTF-8: {e}"),
            })?;
        manifest = Some((file_name.to_string(), source));
    }

    let (file_name, source) = manifest.ok_or_else(|| PluginError::InvalidPackage {
        details: "archive contains no .info.toml manifest".into(),
    })?;

    let info = PluginInfo::parse(&source)?;
    let expected = format!("{}.info.toml", info.slug);
    if file_name != expected {
        return Err(PluginError::InvalidPackage {
            details: format!(
                "manifest filename '{file_name}' does not match declared slug '{}'",
                info.slug
            ),
        });
    }
    Ok(info)
}

/// On-disk storage for extracted plugin archives.
pub trait PluginFileManager: Send + Sync {
    /// Unpack an archive under this plugin's directory, returning its root.
    fn extract(&self, data: &[u8], slug: &str) -> PluginResult<PathBuf>;

    /// Remove this plugin's extracted files.
    fn remove(&self, slug: &str) -> PluginResult<()>;
}

/// File manager rooted at a local plugins directory, one subdirectory per
/// plugin slug.
pub struct LocalPluginFiles {
    root: PathBuf,
}

impl LocalPluginFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PluginFileManager for LocalPluginFiles {
    fn extract(&self, data: &[u8], slug: &str) -> PluginResult<PathBuf> {
        let dest = self.root.join(slug);
        std::fs::create_dir_all(&dest).map_err(|e| PluginError::Storage {
            message: format!("failed to create {}: {e}", dest.display()),
        })?;
        let dest = dest.canonicalize().map_err(|e| PluginError::Storage {
            message: format!("failed to canonicalize {}: {e}", dest.display()),
        })?;

        let decoder = GzDecoder::new(data);
        let mut archive = Archive::new(decoder);

        let mut entry_count = 0usize;
        let mut total_size: u64 = 0;

        let entries = archive.entries().map_err(|e| PluginError::InvalidPackage {
            details: format!("failed to read archive: {e}"),
        })?;

        for entry_result in entries {
            let mut entry = entry_result.map_err(|e| PluginError::InvalidPackage {
                details: format!("failed to read archive entry: {e}"),
            })?;

            entry_count = entry_count.saturating_add(1);
            if entry_count > MAX_ENTRY_COUNT {
                return Err(PluginError::InvalidPackage {
                    details: format!("archive exceeds maximum entry count ({MAX_ENTRY_COUNT})"),
                });
            }

            let entry_type = entry.header().entry_type();
            if !is_safe_entry_type(entry_type) {
                return Err(PluginError::InvalidPackage {
                    details: format!("unsafe archive entry type {entry_type:?}"),
                });
            }

            let entry_size = entry.header().size().unwrap_or(0);
            total_size = total_size.saturating_add(entry_size);
            if total_size > MAX_EXTRACTED_SIZE {
                return Err(PluginError::InvalidPackage {
                    details: format!(
                        "archive exceeds maximum extracted size ({MAX_EXTRACTED_SIZE} bytes)"
                    ),
                });
            }

            let entry_path = entry
                .path()
                .map_err(|e| PluginError::InvalidPackage {
                    details: format!("failed to read entry path: {e}"),
                })?
                .into_owned();

            validate_entry_path(&entry_path)?;

            let target = dest.join(&entry_path);

            // Component-level checks above are the primary defense; this
            // catches symlink-based escapes they cannot see.
            if let Some(canonical_parent) = target.parent().and_then(|p| p.canonicalize().ok()) {
                let canonical_target =
                    canonical_parent.join(target.file_name().unwrap_or_default());
                if !canonical_target.starts_with(&dest) {
                    return Err(PluginError::InvalidPackage {
                        details: format!("path traversal in entry {}", entry_path.display()),
                    });
                }
            }

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PluginError::Storage {
                    message: format!("failed to create {}: {e}", parent.display()),
                })?;
            }

            entry.unpack(&target).map_err(|e| PluginError::Storage {
                message: format!("failed to unpack {}: {e}", entry_path.display()),
            })?;
        }

        if entry_count == 0 {
            return Err(PluginError::InvalidPackage {
                details: "archive is empty".into(),
            });
        }

        Ok(dest)
    }

    fn remove(&self, slug: &str) -> PluginResult<()> {
        let dir = self.root.join(slug);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| PluginError::Storage {
                message: format!("failed to remove {}: {e}", dir.display()),
            })?;
        }
        Ok(())
    }
}

fn is_safe_entry_type(entry_type: tar::EntryType) -> bool {
    matches!(
        entry_type,
        tar::EntryType::Regular
            | tar::EntryType::Directory
            | tar::EntryType::GNULongName
            | tar::EntryType::XHeader
            | tar::EntryType::XGlobalHeader
    )
}

fn validate_entry_path(path: &Path) -> PluginResult<()> {
    if path.is_absolute() {
        return Err(PluginError::InvalidPackage {
            details: format!("absolute path in entry {}", path.display()),
        });
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::Prefix(_) | Component::RootDir
        ) {
            return Err(PluginError::InvalidPackage {
                details: format!("path traversal in entry {}", path.display()),
            });
        }
    }
    Ok(())
}
