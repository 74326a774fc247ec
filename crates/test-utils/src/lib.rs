//! Verso test utilities.
//!
//! Helpers for integration testing: section/element JSON fixtures,
//! plugin archive builders, theme scaffolding, and assertion utilities.
//!
//! This crate deliberately has no dependency on the kernel; fixtures are
//! plain JSON and bytes, built in the same shapes the kernel deserializes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;

use serde_json::Value as JsonValue;
use serde_json::json;
use uuid::Uuid;

/// Create a test section with default values.
pub fn test_section(section_type: &str) -> TestSection {
    TestSection {
        id: Uuid::now_v7().to_string(),
        section_type: section_type.to_string(),
        title: None,
        settings: json!({}),
        elements: vec![],
        order: 0,
    }
}

/// A section fixture builder producing the JSON shape the renderer accepts.
#[derive(Debug, Clone)]
pub struct TestSection {
    pub id: String,
    pub section_type: String,
    pub title: Option<String>,
    pub settings: JsonValue,
    pub elements: Vec<JsonValue>,
    pub order: i32,
}

impl TestSection {
    /// Set a custom ID.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Set the ordering weight.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Set the whole settings object.
    pub fn with_settings(mut self, settings: JsonValue) -> Self {
        self.settings = settings;
        self
    }

    /// Add a single settings key.
    pub fn with_setting(mut self, name: &str, value: JsonValue) -> Self {
        if let Some(obj) = self.settings.as_object_mut() {
            obj.insert(name.to_string(), value);
        }
        self
    }

    /// Append an element.
    pub fn with_element(mut self, element: JsonValue) -> Self {
        self.elements.push(element);
        self
    }

    /// Render to the JSON the `/render` endpoint and registry accept.
    pub fn build(self) -> JsonValue {
        let mut section = json!({
            "id": self.id,
            "type": self.section_type,
            "settings": self.settings,
            "elements": self.elements,
            "order": self.order,
        });
        if let Some(title) = self.title {
            section["title"] = json!(title);
        }
        section
    }
}

/// Create a paragraph element fixture.
pub fn paragraph_element(text: &str) -> JsonValue {
    json!({
        "id": Uuid::now_v7().to_string(),
        "type": "paragraph",
        "content": { "text": text },
    })
}

/// Create an image element fixture.
pub fn image_element(url: &str, alt: &str) -> JsonValue {
    json!({
        "id": Uuid::now_v7().to_string(),
        "type": "image",
        "content": { "url": url, "alt": alt },
    })
}

/// Create a list element fixture.
pub fn list_element(items: &[&str], ordered: bool) -> JsonValue {
    json!({
        "id": Uuid::now_v7().to_string(),
        "type": "list",
        "content": { "items": items, "ordered": ordered },
    })
}

/// Plugin archive builders.
///
/// Archives are gzip-compressed tarballs carrying a `<slug>.info.toml`
/// manifest, matching what the plugin manager installs.
mod archives {
    use super::*;

    /// A well-formed plugin archive for `slug` at `version`.
    pub fn plugin_archive(slug: &str, version: &str) -> Vec<u8> {
        let manifest = format!(
            "slug = \"{slug}\"\nname = \"{}\"\nversion = \"{version}\"\n",
            slug.replace(['-', '_'], " ")
        );
        let manifest_path = format!("{slug}/{slug}.info.toml");
        let readme_path = format!("{slug}/assets/readme.md");
        archive_with_entries(&[
            (manifest_path.as_str(), manifest.as_bytes()),
            (readme_path.as_str(), b"# plugin assets".as_slice()),
        ])
    }

    /// A gzipped tarball with exactly the given entries.
    pub fn archive_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for &(path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, data).unwrap();
        }
        gzip(&builder.into_inner().unwrap())
    }

    /// Bytes that are not a gzip stream at all.
    pub fn garbage_archive() -> Vec<u8> {
        b"this is not a tarball".to_vec()
    }

    /// A gzipped tarball with raw path bytes in the header, bypassing the
    /// tar crate's own path validation. Used to exercise traversal guards.
    pub fn malicious_archive(path_bytes: &[u8], data: &[u8]) -> Vec<u8> {
        let mut header = [0u8; 512];

        let len = path_bytes.len().min(100);
        header[..len].copy_from_slice(&path_bytes[..len]);
        header[100..108].copy_from_slice(b"0000644\0");
        let size_str = format!("{:011o}\0", data.len());
        header[124..136].copy_from_slice(size_str.as_bytes());
        header[156] = b'0';

        // Checksum is computed with the checksum field set to spaces.
        header[148..156].copy_from_slice(b"        ");
        let cksum: u32 = header.iter().map(|&b| u32::from(b)).sum();
        let cksum_str = format!("{cksum:06o}\0 ");
        header[148..156].copy_from_slice(cksum_str.as_bytes());

        let mut tar_data = Vec::new();
        tar_data.extend_from_slice(&header);
        tar_data.extend_from_slice(data);
        let padding = (512 - (data.len() % 512)) % 512;
        tar_data.extend(std::iter::repeat(0u8).take(padding));
        // End-of-archive marker: two zero blocks.
        tar_data.extend(std::iter::repeat(0u8).take(1024));

        gzip(&tar_data)
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }
}

pub use archives::{archive_with_entries, garbage_archive, malicious_archive, plugin_archive};

/// Theme scaffolding on disk.
pub mod themes {
    use std::path::Path;

    /// Write a minimal theme under `themes_dir/slug` with the given
    /// `page.html` template body.
    pub fn write_theme(themes_dir: &Path, slug: &str, page_template: &str) {
        let dir = themes_dir.join(slug);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("theme.info.toml"),
            format!("name = \"{slug}\"\nversion = \"1.0.0\"\n"),
        )
        .unwrap();
        std::fs::write(dir.join("page.html"), page_template).unwrap();
    }
}

/// Assertion helpers for rendered HTML and JSON.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{}', got: {}",
            key,
            value
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }
}
