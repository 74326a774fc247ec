//! Built-in section and element renderers.
//!
//! All free text passes through the host sanitizer; all attribute values
//! are HTML-escaped; image and link URLs must be http(s).

use serde_json::Value;

use super::{
    FieldSpec, RenderContext, RenderOutput, RenderRegistry, SectionMetadata, html_escape,
};

/// Validate that a URL uses a safe scheme (http or https).
fn is_safe_url(url: &str) -> bool {
    let trimmed = url.trim();
    trimmed.starts_with("https://") || trimmed.starts_with("http://")
}

fn text_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn setting<'a>(section: &'a super::Section, key: &str) -> &'a str {
    section.settings.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Install the built-in renderers into a registry.
pub fn register_builtins(registry: &RenderRegistry) {
    register_hero(registry);
    register_paragraph_section(registry);
    register_content_section(registry);

    registry.register_element_safe("paragraph", render_paragraph_element);
    registry.register_element_safe("image", render_image_element);
    registry.register_element_safe("image_group", render_image_group_element);
    registry.register_element_safe("list", render_list_element);
    registry.register_element_safe("quote", render_quote_element);
}

/// Hero banner, driven entirely by the settings map.
fn register_hero(registry: &RenderRegistry) {
    let mut metadata = SectionMetadata::default();
    metadata
        .fields
        .insert("heading".to_string(), FieldSpec::new("string", true));
    metadata
        .fields
        .insert("subheading".to_string(), FieldSpec::new("string", false));
    metadata
        .fields
        .insert("image".to_string(), FieldSpec::new("string", false));

    registry.register_with_metadata("hero", metadata, |ctx, section| {
        let heading = ctx.sanitizer.sanitize(setting(section, "heading"));
        let subheading = ctx.sanitizer.sanitize(setting(section, "subheading"));
        let image = setting(section, "image");

        if heading.is_empty() && subheading.is_empty() && image.is_empty() {
            return RenderOutput::empty();
        }

        let mut html = String::from("<div class=\"hero\">");
        if is_safe_url(image) {
            html.push_str(&format!(
                "<img class=\"hero-image\" src=\"{}\" alt=\"\">",
                html_escape(image)
            ));
        }
        if !heading.is_empty() {
            html.push_str(&format!("<h1>{heading}</h1>"));
        }
        if !subheading.is_empty() {
            html.push_str(&format!("<p class=\"hero-subheading\">{subheading}</p>"));
        }
        html.push_str("</div>");
        RenderOutput::html(html)
    });
}

/// A single sanitized paragraph read from `settings.text`.
fn register_paragraph_section(registry: &RenderRegistry) {
    let mut metadata = SectionMetadata::default();
    metadata
        .fields
        .insert("text".to_string(), FieldSpec::new("string", true));

    registry.register_with_metadata("paragraph", metadata, |ctx, section| {
        let text = ctx.sanitizer.sanitize(setting(section, "text"));
        if text.is_empty() {
            return RenderOutput::empty();
        }
        RenderOutput::html(format!("<p>{text}</p>"))
    });
}

/// A generic section that renders its elements in order, preceded by an
/// optional title heading.
fn register_content_section(registry: &RenderRegistry) {
    registry.register_with_metadata("content", SectionMetadata::default(), |ctx, section| {
        let mut output = RenderOutput::empty();
        if let Some(title) = section.title.as_deref().filter(|t| !t.is_empty()) {
            output.html.push_str(&format!("<h2>{}</h2>", html_escape(title)));
        }

        let elements = ctx.registry.render_elements(ctx, &section.elements);
        output.html.push_str(&elements.html);
        output.warnings.extend(elements.warnings);
        output
    });
}

/// Element: `{ "text": "..." }`
fn render_paragraph_element(ctx: &RenderContext<'_>, element: &super::Element) -> RenderOutput {
    let text = ctx.sanitizer.sanitize(text_field(&element.content, "text"));
    if text.is_empty() {
        return RenderOutput::empty();
    }
    RenderOutput::html(format!("<p>{text}</p>"))
}

/// Element: `{ "url": "...", "alt": "...", "caption": "..." }`
fn render_image_element(_ctx: &RenderContext<'_>, element: &super::Element) -> RenderOutput {
    match figure_html(&element.content) {
        Some(html) => RenderOutput::html(html),
        None => RenderOutput::warning(&element.id, "image element has no usable url"),
    }
}

/// Element: `{ "images": [ { "url", "alt", "caption" }, ... ] }`
fn render_image_group_element(_ctx: &RenderContext<'_>, element: &super::Element) -> RenderOutput {
    let Some(images) = element.content.get("images").and_then(|v| v.as_array()) else {
        return RenderOutput::warning(&element.id, "image_group element has no images array");
    };

    let mut output = RenderOutput::empty();
    let mut figures = String::new();
    for image in images {
        match figure_html(image) {
            Some(html) => figures.push_str(&html),
            None => output.warnings.push(super::RenderWarning {
                item_id: element.id.clone(),
                message: "image in group has no usable url".to_string(),
            }),
        }
    }

    if !figures.is_empty() {
        output.html = format!("<div class=\"image-group\">{figures}</div>");
    }
    output
}

/// Element: `{ "style": "ordered"|"unordered", "items": ["...", ...] }`
fn render_list_element(ctx: &RenderContext<'_>, element: &super::Element) -> RenderOutput {
    let style = text_field(&element.content, "style");
    let tag = if style == "ordered" { "ol" } else { "ul" };

    let items = element.content.get("items").and_then(|v| v.as_array());
    let mut html = format!("<{tag}>");
    if let Some(items) = items {
        for item in items {
            // Items can be plain strings or objects with a "content" field
            let content = item
                .as_str()
                .or_else(|| item.get("content").and_then(|v| v.as_str()))
                .unwrap_or("");
            html.push_str(&format!("<li>{}</li>", ctx.sanitizer.sanitize(content)));
        }
    }
    html.push_str(&format!("</{tag}>"));
    RenderOutput::html(html)
}

/// Element: `{ "text": "...", "caption": "..." }`
fn render_quote_element(ctx: &RenderContext<'_>, element: &super::Element) -> RenderOutput {
    let text = ctx.sanitizer.sanitize(text_field(&element.content, "text"));
    let caption = ctx.sanitizer.sanitize(text_field(&element.content, "caption"));

    if text.is_empty() {
        return RenderOutput::empty();
    }
    if caption.is_empty() {
        RenderOutput::html(format!("<blockquote><p>{text}</p></blockquote>"))
    } else {
        RenderOutput::html(format!(
            "<blockquote><p>{text}</p><cite>{caption}</cite></blockquote>"
        ))
    }
}

/// Build a figure/figcaption fragment from an image tuple.
///
/// Returns None when the url is missing or uses an unsafe scheme
/// (e.g. `javascript:`).
fn figure_html(image: &Value) -> Option<String> {
    let url = text_field(image, "url");
    if url.is_empty() || !is_safe_url(url) {
        return None;
    }

    let alt = text_field(image, "alt");
    let caption = text_field(image, "caption");
    let escaped_url = html_escape(url);
    let escaped_alt = html_escape(if alt.is_empty() { caption } else { alt });

    let mut html = format!("<figure><img src=\"{escaped_url}\" alt=\"{escaped_alt}\">");
    if !caption.is_empty() {
        html.push_str(&format!("<figcaption>{}</figcaption>", html_escape(caption)));
    }
    html.push_str("</figure>");
    Some(html)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::super::{Element, RenderContext, RenderRegistry, Section, ServiceBindings};
    use crate::host::Sanitizer;
    use serde_json::json;

    struct Fixture {
        registry: RenderRegistry,
        sanitizer: Sanitizer,
        services: ServiceBindings,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: RenderRegistry::with_builtins(),
                sanitizer: Sanitizer::new(),
                services: ServiceBindings::new(),
            }
        }

        fn ctx(&self) -> RenderContext<'_> {
            RenderContext {
                sanitizer: &self.sanitizer,
                services: &self.services,
                registry: &self.registry,
            }
        }
    }

    fn element(element_type: &str, content: serde_json::Value) -> Element {
        Element {
            id: "e1".to_string(),
            element_type: element_type.to_string(),
            order: 0,
            content,
        }
    }

    fn section(section_type: &str, value: serde_json::Value) -> Section {
        let mut merged = json!({ "id": "s1", "type": section_type });
        if let (Some(base), Some(extra)) = (merged.as_object_mut(), value.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(merged).unwrap()
    }

    #[test]
    fn paragraph_element_preserves_inline_html() {
        let fx = Fixture::new();
        let el = element("paragraph", json!({ "text": "This is <b>bold</b>." }));
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert_eq!(out.html, "<p>This is <b>bold</b>.</p>");
    }

    #[test]
    fn paragraph_element_strips_script() {
        let fx = Fixture::new();
        let el = element("paragraph", json!({ "text": "a<script>x</script>b" }));
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(!out.html.contains("<script>"));
        assert!(out.html.contains('a') && out.html.contains('b'));
    }

    #[test]
    fn image_element_renders_figure() {
        let fx = Fixture::new();
        let el = element(
            "image",
            json!({ "url": "https://example.com/a.jpg", "alt": "A photo", "caption": "Caption" }),
        );
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(out.html.contains("<figure>"));
        assert!(out.html.contains("src=\"https://example.com/a.jpg\""));
        assert!(out.html.contains("alt=\"A photo\""));
        assert!(out.html.contains("<figcaption>Caption</figcaption>"));
    }

    #[test]
    fn image_element_escapes_url_and_caption() {
        let fx = Fixture::new();
        let el = element(
            "image",
            json!({ "url": "https://example.com/a.jpg?x=1&y=2", "caption": "A <b>bold</b> cap" }),
        );
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(out.html.contains("&amp;y=2"));
        assert!(out.html.contains("&lt;b&gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn image_element_rejects_javascript_url() {
        let fx = Fixture::new();
        let el = element("image", json!({ "url": "javascript:alert(1)" }));
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(out.html.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn image_group_renders_all_safe_images() {
        let fx = Fixture::new();
        let el = element(
            "image_group",
            json!({ "images": [
                { "url": "https://example.com/1.jpg", "caption": "one" },
                { "url": "javascript:bad()" },
                { "url": "https://example.com/2.jpg", "caption": "two" }
            ]}),
        );
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(out.html.contains("image-group"));
        assert!(out.html.contains("1.jpg"));
        assert!(out.html.contains("2.jpg"));
        assert!(!out.html.contains("javascript"));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn list_element_ordered_and_unordered() {
        let fx = Fixture::new();

        let el = element("list", json!({ "style": "ordered", "items": ["a", "b"] }));
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(out.html.starts_with("<ol>"));
        assert!(out.html.contains("<li>a</li>"));

        let el = element("list", json!({ "items": ["x"] }));
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(out.html.starts_with("<ul>"));
    }

    #[test]
    fn quote_element_with_and_without_caption() {
        let fx = Fixture::new();

        let el = element("quote", json!({ "text": "To be.", "caption": "Shakespeare" }));
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(out.html.contains("<cite>Shakespeare</cite>"));

        let el = element("quote", json!({ "text": "Just a quote." }));
        let out = fx.registry.render_element(&fx.ctx(), &el);
        assert!(!out.html.contains("<cite>"));
        assert!(out.html.contains("<blockquote><p>Just a quote.</p></blockquote>"));
    }

    #[test]
    fn hero_section_uses_settings_not_elements() {
        let fx = Fixture::new();
        let s = section(
            "hero",
            json!({ "settings": {
                "heading": "Welcome",
                "subheading": "To the site",
                "image": "https://example.com/banner.jpg"
            }}),
        );
        let out = fx.registry.render_section(&fx.ctx(), &s);
        assert!(out.html.contains("<h1>Welcome</h1>"));
        assert!(out.html.contains("hero-subheading"));
        assert!(out.html.contains("banner.jpg"));
        assert!(out.html.contains("id=\"section-s1\""));
    }

    #[test]
    fn hero_with_nothing_usable_renders_empty() {
        let fx = Fixture::new();
        let s = section("hero", json!({ "settings": {} }));
        let out = fx.registry.render_section(&fx.ctx(), &s);
        assert!(out.html.is_empty());
    }

    #[test]
    fn content_section_renders_title_and_elements() {
        let fx = Fixture::new();
        let s = section(
            "content",
            json!({
                "title": "About",
                "elements": [
                    { "id": "e1", "type": "paragraph", "order": 0, "content": { "text": "Body." } }
                ]
            }),
        );
        let out = fx.registry.render_section(&fx.ctx(), &s);
        assert!(out.html.contains("<h2>About</h2>"));
        assert!(out.html.contains("<p>Body.</p>"));
    }

    #[test]
    fn unknown_element_inside_content_warns_but_renders_rest() {
        let fx = Fixture::new();
        let s = section(
            "content",
            json!({
                "elements": [
                    { "id": "e1", "type": "widget_3000", "order": 0, "content": {} },
                    { "id": "e2", "type": "paragraph", "order": 1, "content": { "text": "kept" } }
                ]
            }),
        );
        let out = fx.registry.render_section(&fx.ctx(), &s);
        assert!(out.html.contains("kept"));
        assert_eq!(out.warnings.len(), 1);
    }
}
