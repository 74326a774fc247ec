//! Section/element rendering registry.
//!
//! User-authored pages are composed of sections, each holding ordered
//! elements. Rendering dispatches on the type tag through a registry of
//! renderer functions, so features and plugins can add content shapes
//! without the kernel hardcoding a type list.
//!
//! Policy: fail soft. An unregistered type renders as an empty fragment
//! with a warning; a panicking renderer registered through a `*_safe`
//! variant degrades to an empty fragment for that one item. One malformed
//! content block must never take down an entire page. Renderers are pure
//! functions over in-memory data and must not perform I/O.

mod builtin;

pub use builtin::register_builtins;

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::host::Sanitizer;

/// A block of a post/page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub section_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Free-form settings, used by types like "hero" that carry no
    /// elements. Accepts `content` as an alias for authoring convenience.
    #[serde(default, alias = "content")]
    pub settings: serde_json::Map<String, Value>,
    #[serde(default)]
    pub order: i32,
}

/// A single element inside a section. Owned by its parent; no independent
/// lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub order: i32,
    /// Opaque payload; the shape depends on the element type.
    #[serde(default)]
    pub content: Value,
}

/// A non-fatal problem encountered while rendering one item.
#[derive(Debug, Clone, Serialize)]
pub struct RenderWarning {
    pub item_id: String,
    pub message: String,
}

/// The HTML fragment and warnings produced by a render pass.
#[derive(Debug, Default)]
pub struct RenderOutput {
    pub html: String,
    pub warnings: Vec<RenderWarning>,
}

impl RenderOutput {
    /// A fragment with no warnings.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            warnings: Vec::new(),
        }
    }

    /// An empty fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An empty fragment carrying one warning.
    pub fn warning(item_id: &str, message: impl Into<String>) -> Self {
        Self {
            html: String::new(),
            warnings: vec![RenderWarning {
                item_id: item_id.to_string(),
                message: message.into(),
            }],
        }
    }

    fn absorb(&mut self, other: RenderOutput) {
        self.html.push_str(&other.html);
        self.warnings.extend(other.warnings);
    }
}

/// Machine-readable description of a section type's fields.
///
/// Consumed only by admin/introspection tooling to build forms without a
/// hardcoded type list. It is documentation, not validation, and must never
/// affect the rendering path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionMetadata {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

/// One field in a [`SectionMetadata`] schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(field_type: &str, required: bool) -> Self {
        Self {
            field_type: field_type.to_string(),
            required,
            default: None,
        }
    }
}

/// Service references the feature controller exposes to renderers.
///
/// Features bind their services here during activation and unbind on
/// deactivation; renderers read them through the context. Values are opaque
/// like registry entries.
#[derive(Default)]
pub struct ServiceBindings {
    services: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind or replace a service reference.
    pub fn bind<T: Send + Sync + 'static>(&self, name: &str, service: Arc<T>) {
        self.services.write().insert(name.to_string(), service);
    }

    /// Remove a service reference. Returns true if one was bound.
    pub fn unbind(&self, name: &str) -> bool {
        self.services.write().remove(name).is_some()
    }

    /// Fetch a bound service, downcast to its concrete type.
    pub fn get_as<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.services
            .read()
            .get(name)
            .cloned()
            .and_then(|svc| svc.downcast::<T>().ok())
    }

    /// Names of currently bound services, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Everything a renderer may reach during a render pass.
pub struct RenderContext<'a> {
    pub sanitizer: &'a Sanitizer,
    pub services: &'a ServiceBindings,
    pub registry: &'a RenderRegistry,
}

type SectionRenderer = Arc<dyn Fn(&RenderContext<'_>, &Section) -> RenderOutput + Send + Sync>;
type ElementRenderer = Arc<dyn Fn(&RenderContext<'_>, &Element) -> RenderOutput + Send + Sync>;

/// Registry mapping type tags to renderer functions.
#[derive(Default)]
pub struct RenderRegistry {
    sections: RwLock<HashMap<String, SectionRenderer>>,
    elements: RwLock<HashMap<String, ElementRenderer>>,
    metadata: RwLock<BTreeMap<String, SectionMetadata>>,
}

impl RenderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in renderers installed.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        register_builtins(&registry);
        registry
    }

    /// Associate a section type with a renderer.
    pub fn register<F>(&self, section_type: &str, renderer: F)
    where
        F: Fn(&RenderContext<'_>, &Section) -> RenderOutput + Send + Sync + 'static,
    {
        self.sections
            .write()
            .insert(section_type.to_string(), Arc::new(renderer));
    }

    /// Like [`register`](Self::register), but a panicking renderer is
    /// caught, logged, and degrades to an empty fragment for that section.
    pub fn register_safe<F>(&self, section_type: &str, renderer: F)
    where
        F: Fn(&RenderContext<'_>, &Section) -> RenderOutput + Send + Sync + 'static,
    {
        let tag = section_type.to_string();
        self.register(section_type, move |ctx, section| {
            match catch_unwind(AssertUnwindSafe(|| renderer(ctx, section))) {
                Ok(output) => output,
                Err(_) => {
                    error!(section_type = %tag, section_id = %section.id, "section renderer panicked");
                    RenderOutput::warning(&section.id, format!("renderer for '{tag}' failed"))
                }
            }
        });
    }

    /// Register a section renderer together with its field schema. The
    /// renderer gets the panic isolation of [`register_safe`](Self::register_safe).
    pub fn register_with_metadata<F>(&self, section_type: &str, metadata: SectionMetadata, renderer: F)
    where
        F: Fn(&RenderContext<'_>, &Section) -> RenderOutput + Send + Sync + 'static,
    {
        self.metadata
            .write()
            .insert(section_type.to_string(), metadata);
        self.register_safe(section_type, renderer);
    }

    /// Associate an element type with a renderer.
    pub fn register_element<F>(&self, element_type: &str, renderer: F)
    where
        F: Fn(&RenderContext<'_>, &Element) -> RenderOutput + Send + Sync + 'static,
    {
        self.elements
            .write()
            .insert(element_type.to_string(), Arc::new(renderer));
    }

    /// Panic-isolated variant of [`register_element`](Self::register_element).
    pub fn register_element_safe<F>(&self, element_type: &str, renderer: F)
    where
        F: Fn(&RenderContext<'_>, &Element) -> RenderOutput + Send + Sync + 'static,
    {
        let tag = element_type.to_string();
        self.register_element(element_type, move |ctx, element| {
            match catch_unwind(AssertUnwindSafe(|| renderer(ctx, element))) {
                Ok(output) => output,
                Err(_) => {
                    error!(element_type = %tag, element_id = %element.id, "element renderer panicked");
                    RenderOutput::warning(&element.id, format!("renderer for '{tag}' failed"))
                }
            }
        });
    }

    /// Field schema for a registered section type, if declared.
    pub fn metadata(&self, section_type: &str) -> Option<SectionMetadata> {
        self.metadata.read().get(section_type).cloned()
    }

    /// All declared section schemas, keyed by type tag.
    pub fn metadata_all(&self) -> BTreeMap<String, SectionMetadata> {
        self.metadata.read().clone()
    }

    /// Registered section type tags, sorted.
    pub fn section_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.sections.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Render one section.
    ///
    /// The fragment is wrapped in a `<section>` carrying the shared anchor
    /// id, so the table of contents and the rendered page can never drift.
    /// Unknown types render as empty output.
    pub fn render_section(&self, ctx: &RenderContext<'_>, section: &Section) -> RenderOutput {
        let renderer = self.sections.read().get(&section.section_type).cloned();
        let Some(renderer) = renderer else {
            return RenderOutput::warning(
                &section.id,
                format!("no renderer registered for section type '{}'", section.section_type),
            );
        };

        let mut output = renderer(ctx, section);
        if output.html.is_empty() {
            return output;
        }

        output.html = format!(
            "<section id=\"{}\" class=\"section section--{}\">{}</section>",
            section_anchor(&section.id),
            html_escape(&section.section_type),
            output.html
        );
        output
    }

    /// Render one element. Unknown types render as empty output.
    pub fn render_element(&self, ctx: &RenderContext<'_>, element: &Element) -> RenderOutput {
        let renderer = self.elements.read().get(&element.element_type).cloned();
        match renderer {
            Some(renderer) => renderer(ctx, element),
            None => RenderOutput::warning(
                &element.id,
                format!("no renderer registered for element type '{}'", element.element_type),
            ),
        }
    }

    /// Render a section's elements in ascending order.
    pub fn render_elements(&self, ctx: &RenderContext<'_>, elements: &[Element]) -> RenderOutput {
        let mut sorted: Vec<&Element> = elements.iter().collect();
        sorted.sort_by_key(|el| el.order);

        let mut output = RenderOutput::empty();
        for element in sorted {
            output.absorb(self.render_element(ctx, element));
        }
        output
    }

    /// Render a full page: sections in ascending order, concatenated.
    pub fn render_page(&self, ctx: &RenderContext<'_>, sections: &[Section]) -> RenderOutput {
        let mut sorted: Vec<&Section> = sections.iter().collect();
        sorted.sort_by_key(|s| s.order);

        let mut output = RenderOutput::empty();
        for section in sorted {
            output.absorb(self.render_section(ctx, section));
        }
        output
    }
}

impl std::fmt::Debug for RenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRegistry")
            .field("section_types", &self.sections.read().len())
            .field("element_types", &self.elements.read().len())
            .finish()
    }
}

/// Derive the anchor id for a section.
///
/// The section wrapper and the table of contents both go through this one
/// function; deriving the id twice would invite silent drift.
pub fn section_anchor(section_id: &str) -> String {
    format!("section-{section_id}")
}

/// Render a table of contents for the given sections.
///
/// Walks the same order the page renderer uses and links to
/// [`section_anchor`] ids. Untitled sections are skipped. Returns an empty
/// string when nothing is linkable.
pub fn render_toc(sections: &[Section]) -> String {
    let mut sorted: Vec<&Section> = sections.iter().collect();
    sorted.sort_by_key(|s| s.order);

    let mut entries = String::new();
    for section in sorted {
        let Some(title) = section.title.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        entries.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>",
            section_anchor(&section.id),
            html_escape(title)
        ));
    }

    if entries.is_empty() {
        return String::new();
    }
    format!("<nav class=\"toc\"><ul>{entries}</ul></nav>")
}

/// Escape text for embedding in HTML attribute or text position.
pub fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
