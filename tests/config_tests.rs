//! Tests for the type-safe configuration builder pattern

use std::time::Duration;

use kodegen_tools_linkharvest::HarvestConfig;
use kodegen_tools_linkharvest::harvest::SessionRequest;
use tempfile::TempDir;

#[tokio::test]
async fn test_builder_requires_store_path() {
    // This should not compile if uncommented - store_path is required
    // let config = HarvestConfig::builder().build();

    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("links.db");
    let config = HarvestConfig::builder().store_path(&db).build().unwrap();

    assert_eq!(config.store_path(), db.as_path());
}

#[tokio::test]
async fn test_builder_optional_fields_have_defaults() {
    let config = HarvestConfig::builder()
        .store_path("links.db")
        .build()
        .unwrap();

    assert_eq!(config.table(), "links");
    assert_eq!(config.target_base_url(), "https://www.redgifs.com/niches/");
    assert_eq!(config.category(), None);
    assert_eq!(config.link_prefix(), None);
    assert_eq!(config.batch_size().get(), 400);
    assert_eq!(config.cycle_delay(), Duration::from_millis(50));
    assert_eq!(config.idle_delay(), Duration::from_millis(50));
    assert_eq!(config.recycle_every(), 100);
    assert_eq!(config.max_session_duration(), Some(Duration::from_secs(30)));
    assert_eq!(config.viewport(), (1200, 800));
    assert_eq!(config.scroll_step_px(), 100);
    assert_eq!(config.scroll_interval(), Duration::from_millis(100));
    assert!(config.headless());
    assert!(config.seed().is_none());
}

#[tokio::test]
async fn test_builder_with_all_optional_fields() {
    let seed = SessionRequest::new("watch-it-for-the-plot", "top", ".previewFeed");
    let config = HarvestConfig::builder()
        .table("waitforplot2")
        .category("waitforplot2")
        .link_prefix("https://files.redgifs.com")
        .store_path("plots.db")
        .target_base_url("https://example.com/niches/")
        .batch_size(25)
        .cycle_delay(Duration::from_secs(5))
        .idle_delay(Duration::from_secs(1))
        .recycle_every(10)
        .launch_timeout(Duration::from_secs(5))
        .navigation_timeout(Duration::from_secs(10))
        .selector_timeout(Duration::from_secs(3))
        .evaluate_timeout(Duration::from_secs(20))
        .teardown_timeout(Duration::from_secs(2))
        .max_session_duration(None)
        .viewport(800, 600)
        .scroll(250, Duration::from_millis(20))
        .seed(seed.clone())
        .build()
        .unwrap();

    assert_eq!(config.table(), "waitforplot2");
    assert_eq!(config.category(), Some("waitforplot2"));
    assert_eq!(config.batch_size().get(), 25);
    assert_eq!(config.recycle_every(), 10);
    assert_eq!(config.launch_timeout(), Duration::from_secs(5));
    assert_eq!(config.max_session_duration(), None);
    assert_eq!(config.viewport(), (800, 600));
    assert_eq!(config.scroll_step_px(), 250);
    assert_eq!(config.seed(), Some(&seed));
}

#[test]
fn test_link_prefix_filter() {
    let open = HarvestConfig::builder()
        .store_path("links.db")
        .build()
        .unwrap();
    assert!(open.accepts_link("https://anything.example.com/x.jpg"));

    let filtered = HarvestConfig::builder()
        .store_path("links.db")
        .link_prefix("https://files.redgifs.com")
        .build()
        .unwrap();
    assert!(filtered.accepts_link("https://files.redgifs.com/a.jpg"));
    assert!(!filtered.accepts_link("https://thumbs.redgifs.com/a.jpg"));
    assert!(!filtered.accepts_link(" https://files.redgifs.com/a.jpg"));
    assert!(!filtered.accepts_link(
        "https://proxy.example.com/?u=https://files.redgifs.com/a.jpg"
    ));
}
