//! Needs a local Chrome/Chromium and network access:
//! `cargo test --test browser_smoke -- --ignored`

use std::time::Duration;

use quiz_runner::browser::{ChromeRenderer, PageRenderer, find_chrome_executable};
use quiz_runner::scraper;
use tokio::time::Instant;

#[tokio::test]
#[ignore]
async fn renders_a_live_page() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();

    let Some(exe) = find_chrome_executable() else {
        println!("no browser installed, skipping");
        return;
    };

    let renderer = ChromeRenderer::new(
        Some(exe),
        Duration::from_secs(30),
        Duration::from_millis(500),
    );
    let deadline = Instant::now() + Duration::from_secs(60);

    let page = renderer
        .render("https://example.com/", deadline)
        .await
        .expect("render example.com");
    assert!(page.html.contains("Example Domain"));

    let quiz = scraper::inspect(&page.url, &page.html);
    assert_eq!(quiz.submit_url, None);
}
