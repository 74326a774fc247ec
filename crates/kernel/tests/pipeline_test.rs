#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end pipeline tests: state boot, feature dispatch, plugin
//! lifecycle, and themed section rendering against one wired kernel.

use uuid::Uuid;

use verso_kernel::config::Config;
use verso_kernel::error::AppError;
use verso_kernel::feature::{FeatureError, FeatureState};
use verso_kernel::render::{RenderContext, Section};
use verso_kernel::repo::Post;
use verso_kernel::state::AppState;
use verso_test_utils::{assert, paragraph_element, plugin_archive, test_section, themes};

fn booted_state(tmp: &tempfile::TempDir) -> AppState {
    themes::write_theme(
        tmp.path(),
        "default",
        "<main data-theme=\"default\">{{ content | safe }}</main>",
    );

    let config = Config {
        themes_dir: tmp.path().to_path_buf(),
        plugins_dir: tmp.path().join("plugins"),
        ..Config::default()
    };
    AppState::new(config).unwrap()
}

fn post(title: &str, published: i64) -> Post {
    Post {
        id: Uuid::now_v7(),
        title: title.to_string(),
        body: String::new(),
        published,
    }
}

#[tokio::test]
async fn boot_activates_all_builtin_features() {
    let tmp = tempfile::tempdir().unwrap();
    let state = booted_state(&tmp);

    for (name, feature_state) in state.features().list() {
        assert_eq!(feature_state, FeatureState::Active, "feature {name}");
    }
}

#[tokio::test]
async fn blog_dispatch_serves_seeded_posts() {
    let tmp = tempfile::tempdir().unwrap();
    let state = booted_state(&tmp);

    let posts = state.host().post_repository().unwrap();
    posts.create(post("Launch day", 200)).await.unwrap();
    posts.create(post("Unpublished draft", 0)).await.unwrap();

    let html = state.features().dispatch("blog").await.unwrap();
    assert::contains(&html, "Launch day");
    assert::not_contains(&html, "Unpublished draft");
}

#[tokio::test]
async fn deactivated_feature_answers_unavailable_until_reactivated() {
    let tmp = tempfile::tempdir().unwrap();
    let state = booted_state(&tmp);

    state.features().deactivate("blog").unwrap();
    let err = state.features().dispatch("blog").await.unwrap_err();
    assert!(matches!(err, FeatureError::ServiceUnavailable { .. }));
    // The HTTP layer reports this as 503-class, not 404-class.
    assert!(matches!(AppError::from(err), AppError::Unavailable(_)));

    state.features().activate("blog").unwrap();
    assert!(state.features().dispatch("blog").await.is_ok());
}

#[tokio::test]
async fn plugin_lifecycle_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let state = booted_state(&tmp);

    let record = state
        .plugins()
        .install(&plugin_archive("seo-tools", "1.0.0"))
        .await
        .unwrap();
    assert!(!record.active);

    let record = state.plugins().activate("seo-tools").await.unwrap();
    assert!(record.active);

    state.plugins().delete("seo-tools").await.unwrap();
    assert!(state.plugins().list().await.unwrap().is_empty());
    assert!(!tmp.path().join("plugins").join("seo-tools").exists());
}

#[tokio::test]
async fn sections_render_through_the_active_theme() {
    let tmp = tempfile::tempdir().unwrap();
    let state = booted_state(&tmp);

    let sections: Vec<Section> = vec![
        serde_json::from_value(
            test_section("hero")
                .with_id("welcome")
                .with_setting("heading", serde_json::json!("Hello <Verso>"))
                .with_order(1)
                .build(),
        )
        .unwrap(),
        serde_json::from_value(
            test_section("content")
                .with_id("body")
                .with_title("The body")
                .with_order(2)
                .with_element(paragraph_element("Safe text <script>alert(1)</script>"))
                .build(),
        )
        .unwrap(),
    ];

    let host = state.host();
    let ctx = RenderContext {
        sanitizer: host.sanitizer(),
        services: host.render_services().as_ref(),
        registry: state.renderer(),
    };
    let output = state.renderer().render_page(&ctx, &sections);

    let page = host.themes().render_page("Home", &output.html).unwrap();
    assert::contains(&page, "data-theme=\"default\"");
    assert::contains(&page, "section-welcome");
    assert::contains(&page, "Safe text");
    assert::not_contains(&page, "<script>");
}
