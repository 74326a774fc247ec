//! HTML sanitizer capability.
//!
//! Ammonia-backed sanitization with a fixed allow-list: the standard UGC
//! tag set, `class` and `id` on any allowed tag, and `style` only on
//! `span`, `div`, and `p`. Every renderer must pass free text through this
//! before embedding it in a fragment.

use ammonia::Builder;

/// Sanitizer capability handed to renderers through the host.
pub struct Sanitizer {
    builder: Builder<'static>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    /// Build the sanitizer with the fixed allow-list.
    pub fn new() -> Self {
        let mut builder = Builder::default();
        builder.add_generic_attributes(&["class", "id"]);
        builder.add_tag_attributes("span", &["style"]);
        builder.add_tag_attributes("div", &["style"]);
        builder.add_tag_attributes("p", &["style"]);
        Self { builder }
    }

    /// Strip disallowed tags and attributes from user-provided rich text.
    pub fn sanitize(&self, input: &str) -> String {
        self.builder.clean(input).to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let sanitizer = Sanitizer::new();
        let out = sanitizer.sanitize("<script>alert('x')</script>hello");
        assert!(!out.contains("<script>"), "script must be stripped: {out}");
        assert!(out.contains("hello"));
    }

    #[test]
    fn preserves_basic_formatting() {
        let sanitizer = Sanitizer::new();
        let out = sanitizer.sanitize("This is <b>bold</b> and <i>italic</i>.");
        assert_eq!(out, "This is <b>bold</b> and <i>italic</i>.");
    }

    #[test]
    fn class_and_id_allowed_globally() {
        let sanitizer = Sanitizer::new();
        let out = sanitizer.sanitize(r#"<p class="lede" id="intro">hi</p>"#);
        assert!(out.contains(r#"class="lede""#));
        assert!(out.contains(r#"id="intro""#));
    }

    #[test]
    fn style_allowed_only_on_span_div_p() {
        let sanitizer = Sanitizer::new();

        let out = sanitizer.sanitize(r#"<span style="color:red">x</span>"#);
        assert!(out.contains("style="), "span keeps style: {out}");

        let out = sanitizer.sanitize(r#"<p style="color:red">x</p>"#);
        assert!(out.contains("style="), "p keeps style: {out}");

        let out = sanitizer.sanitize(r#"<b style="color:red">x</b>"#);
        assert!(!out.contains("style="), "b must drop style: {out}");
    }

    #[test]
    fn event_handlers_are_dropped() {
        let sanitizer = Sanitizer::new();
        let out = sanitizer.sanitize(r#"<p onclick="evil()">click</p>"#);
        assert!(!out.contains("onclick"));
        assert!(out.contains("click"));
    }
}
