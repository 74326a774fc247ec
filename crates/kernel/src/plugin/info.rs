//! Plugin manifest parsing.
//!
//! Every plugin archive carries exactly one `<slug>.info.toml` manifest
//! describing the plugin. The manifest is the authority on identity: the
//! record stored after installation is built from it, never from the
//! uploaded filename.

use std::collections::HashMap;

use serde::Deserialize;

use super::error::{PluginError, PluginResult};

/// Parsed contents of a `<slug>.info.toml` manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginInfo {
    pub slug: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    /// Free-form key/value pairs the plugin exposes to the host.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PluginInfo {
    /// Parse and validate a manifest from TOML source.
    pub fn parse(source: &str) -> PluginResult<Self> {
        let info: PluginInfo =
            toml::from_str(source).map_err(|e| PluginError::InvalidPackage {
                details: format!("manifest is not valid TOML: {e}"),
            })?;
        info.validate()?;
        Ok(info)
    }

    /// Slugs are path segments and registry keys; keep them boring.
    fn validate(&self) -> PluginResult<()> {
        if self.slug.is_empty() {
            return Err(PluginError::InvalidPackage {
                details: "manifest slug is empty".into(),
            });
        }
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(PluginError::InvalidPackage {
                details: format!(
                    "manifest slug '{}' contains characters outside [a-z0-9_-]",
                    self.slug
                ),
            });
        }
        if self.version.is_empty() {
            return Err(PluginError::InvalidPackage {
                details: "manifest version is empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let info = PluginInfo::parse(
            r#"
            slug = "seo-tools"
            name = "SEO Tools"
            version = "1.2.0"
            description = "Meta tags and sitemaps"
            author = "Verso"

            [metadata]
            category = "seo"
            "#,
        )
        .unwrap();

        assert_eq!(info.slug, "seo-tools");
        assert_eq!(info.version, "1.2.0");
        assert_eq!(info.metadata.get("category").map(String::as_str), Some("seo"));
    }

    #[test]
    fn optional_fields_default_to_none() {
        let info = PluginInfo::parse(
            r#"
            slug = "minimal"
            name = "Minimal"
            version = "0.1.0"
            "#,
        )
        .unwrap();

        assert!(info.description.is_none());
        assert!(info.metadata.is_empty());
    }

    #[test]
    fn rejects_slug_with_rogue_characters() {
        let err = PluginInfo::parse(
            r#"
            slug = "../escape"
            name = "Escape"
            version = "0.1.0"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, PluginError::InvalidPackage { .. }));
    }

    #[test]
    fn rejects_empty_version() {
        let err = PluginInfo::parse(
            r#"
            slug = "noversion"
            name = "No Version"
            version = ""
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, PluginError::InvalidPackage { .. }));
    }

    #[test]
    fn rejects_non_toml() {
        let err = PluginInfo::parse("{ not toml }").unwrap_err();
        assert!(matches!(err, PluginError::InvalidPackage { .. }));
    }
}
