//! Headless page rendering through `chromiumoxide`.
//!
//! Each render launches its own browser process on a throwaway profile and
//! shuts it down before returning, whatever the outcome.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Quiet period that counts as network idle.
const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);
const NETWORK_IDLE_POLL: Duration = Duration::from_millis(250);
/// Consecutive failed checks after which the page is considered dead.
const NETWORK_IDLE_MAX_ERRORS: u32 = 3;
/// Time a graceful close gets before the process is killed.
const CLOSE_GRACE: Duration = Duration::from_secs(3);
/// Headroom so CDP requests outlive the navigation timeout that wraps them.
const CDP_REQUEST_MARGIN: Duration = Duration::from_secs(5);

const BROWSER_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[cfg(target_os = "linux")]
const INSTALL_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/snap/bin/chromium",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const INSTALL_PATHS: &[&str] = &[];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{0}")]
    NavigationTimeout(String),

    #[error("Deadline exceeded while rendering {0}")]
    DeadlineExceeded(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Loads `url` and returns its rendered HTML, giving up at `deadline`.
    async fn render(&self, url: &str, deadline: Instant) -> Result<RenderedPage, RenderError>;
}

/// The two ways of ending a browser process.
#[async_trait]
pub trait BrowserProcess: Send {
    async fn close(&mut self) -> Result<(), String>;

    async fn kill(&mut self);
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn close(&mut self) -> Result<(), String> {
        Browser::close(self).await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn kill(&mut self) {
        if let Some(Err(e)) = Browser::kill(self).await {
            warn!("Browser kill error: {}", e);
        }
    }
}

/// Closes gracefully within `grace`, otherwise kills. Returns whether the
/// graceful close went through.
pub async fn shut_down<P: BrowserProcess>(process: &mut P, grace: Duration) -> bool {
    match tokio::time::timeout(grace, process.close()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Browser close error, killing: {}", e);
            process.kill().await;
            false
        }
        Err(_) => {
            warn!("Browser did not close within {}ms, killing", grace.as_millis());
            process.kill().await;
            false
        }
    }
}

/// Per-render `--user-data-dir`, so sessions share neither cookies nor
/// Chromium's profile lock.
#[derive(Debug)]
pub struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    pub fn new() -> Self {
        ProfileDir {
            path: std::env::temp_dir().join(format!("quiz-runner-{}", Uuid::new_v4())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove profile: {}", e),
        }
    }
}

impl Default for ProfileDir {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChromeRenderer {
    executable: Option<String>,
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl ChromeRenderer {
    pub fn new(
        executable: Option<String>,
        navigation_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        ChromeRenderer {
            executable,
            navigation_timeout,
            settle_delay,
        }
    }

    async fn load(&self, browser: &mut Browser, url: &str) -> Result<RenderedPage, RenderError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Browser(format!("Failed to open page: {}", e)))?;

        let navigation = async {
            page.goto(url)
                .await
                .map_err(|e| navigation_error(url, self.navigation_timeout, e))?;
            wait_for_network_idle(&page)
                .await
                .map_err(|e| navigation_error(url, self.navigation_timeout, e))
        };

        match tokio::time::timeout(self.navigation_timeout, navigation).await {
            Ok(result) => result?,
            Err(_) => return Err(timed_out(url, self.navigation_timeout)),
        }

        tokio::time::sleep(self.settle_delay).await;

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::Browser(format!("Failed to get page content: {}", e)))?;

        Ok(RenderedPage {
            url: url.to_string(),
            html,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str, deadline: Instant) -> Result<RenderedPage, RenderError> {
        let exe = self
            .executable
            .clone()
            .or_else(find_chrome_executable)
            .ok_or_else(|| {
                RenderError::Launch(
                    "No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE."
                        .to_string(),
                )
            })?;

        let profile = ProfileDir::new();
        info!(url, browser = %exe, profile = %profile.path().display(), "launching headless browser");
        let config = build_headless_config(&exe, profile.path(), self.navigation_timeout)?;

        let (mut browser, mut handler) = match Browser::launch(config).await {
            Ok(launched) => launched,
            Err(e) => {
                profile.remove().await;
                return Err(RenderError::Launch(format!("{} ({})", e, exe)));
            }
        };

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        let result = match tokio::time::timeout_at(deadline, self.load(&mut browser, url)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::DeadlineExceeded(url.to_string())),
        };

        shut_down(&mut browser, CLOSE_GRACE).await;
        handle.abort();
        profile.remove().await;

        if let Ok(page) = &result {
            debug!(url, chars = page.html.len(), "page rendered");
        }
        result
    }
}

/// Headless, sandbox disabled, no extensions or background traffic, on its
/// own profile directory.
pub fn build_headless_config(
    exe: &str,
    profile: &Path,
    navigation_timeout: Duration,
) -> Result<BrowserConfig, RenderError> {
    BrowserConfig::builder()
        .chrome_executable(exe)
        .user_data_dir(profile)
        .request_timeout(cdp_request_timeout(navigation_timeout))
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .build()
        .map_err(RenderError::Launch)
}

/// CDP's own per-request timeout must not fire before the navigation timeout.
pub fn cdp_request_timeout(navigation_timeout: Duration) -> Duration {
    navigation_timeout + CDP_REQUEST_MARGIN
}

/// A CDP request timing out during navigation is still a navigation timeout.
pub fn navigation_error(url: &str, navigation_timeout: Duration, err: CdpError) -> RenderError {
    match err {
        CdpError::Timeout => timed_out(url, navigation_timeout),
        other => RenderError::Browser(format!("Failed to navigate: {}", other)),
    }
}

fn timed_out(url: &str, navigation_timeout: Duration) -> RenderError {
    RenderError::NavigationTimeout(format!(
        "Timeout {}ms exceeded navigating to {}",
        navigation_timeout.as_millis(),
        url
    ))
}

/// Locates a Chromium-family executable: `CHROME_EXECUTABLE` first, then
/// [`BROWSER_NAMES`] on `PATH`, then the platform's install locations.
pub fn find_chrome_executable() -> Option<String> {
    let explicit = std::env::var_os("CHROME_EXECUTABLE").map(PathBuf::from);

    let on_path: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths)
                .flat_map(|dir| BROWSER_NAMES.iter().map(move |name| dir.join(name)))
                .collect()
        })
        .unwrap_or_default();

    let candidates = explicit
        .into_iter()
        .chain(on_path)
        .chain(INSTALL_PATHS.iter().map(PathBuf::from));

    first_existing(candidates)
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<String> {
    candidates
        .into_iter()
        .find(|path| path.is_file())
        .map(|path| path.to_string_lossy().into_owned())
}

/// Waits until the document is complete and no new resource entries have
/// appeared for [`NETWORK_IDLE_QUIET`]. Callers bound this with a timeout.
async fn wait_for_network_idle(page: &Page) -> Result<(), CdpError> {
    let mut last_count: u64 = 0;
    let mut stable_since = std::time::Instant::now();
    let mut errors = 0;

    loop {
        let sample = async {
            let count = page
                .evaluate("performance.getEntriesByType('resource').length")
                .await?
                .into_value::<u64>()?;
            let ready_state = page
                .evaluate("document.readyState")
                .await?
                .into_value::<String>()?;
            Ok::<_, CdpError>((count, ready_state == "complete"))
        };

        match sample.await {
            Ok((count, ready_complete)) => {
                errors = 0;
                if !ready_complete || count != last_count {
                    last_count = count;
                    stable_since = std::time::Instant::now();
                } else if stable_since.elapsed() >= NETWORK_IDLE_QUIET {
                    debug!(resources = count, "network idle");
                    return Ok(());
                }
            }
            // A navigation in flight can briefly tear down the execution context
            Err(e) => {
                errors += 1;
                debug!(attempt = errors, "network idle check failed: {}", e);
                if errors >= NETWORK_IDLE_MAX_ERRORS {
                    return Err(e);
                }
            }
        }

        tokio::time::sleep(NETWORK_IDLE_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeProcess {
        close_delay: Duration,
        close_fails: bool,
        killed: Arc<AtomicBool>,
    }

    impl FakeProcess {
        fn new(close_delay: Duration, close_fails: bool) -> Self {
            FakeProcess {
                close_delay,
                close_fails,
                killed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl BrowserProcess for FakeProcess {
        async fn close(&mut self) -> Result<(), String> {
            tokio::time::sleep(self.close_delay).await;
            if self.close_fails {
                Err("connection closed".into())
            } else {
                Ok(())
            }
        }

        async fn kill(&mut self) {
            self.killed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn cdp_timeout_during_navigation_is_a_navigation_timeout() {
        let err = navigation_error(
            "https://example.com/slow",
            Duration::from_secs(60),
            CdpError::Timeout,
        );
        assert!(matches!(err, RenderError::NavigationTimeout(_)));
        assert!(err.to_string().contains("https://example.com/slow"));
    }

    #[test]
    fn other_navigation_failures_stay_browser_errors() {
        let err = navigation_error(
            "https://example.com/quiz",
            Duration::from_secs(60),
            CdpError::ChromeMessage("net::ERR_NAME_NOT_RESOLVED".into()),
        );
        assert!(matches!(err, RenderError::Browser(_)));
    }

    #[test]
    fn cdp_requests_outlive_the_navigation_timeout() {
        let navigation = Duration::from_secs(60);
        assert!(cdp_request_timeout(navigation) > navigation);
    }

    #[test]
    fn every_session_gets_its_own_profile() {
        let first = ProfileDir::new();
        let second = ProfileDir::new();
        assert_ne!(first.path(), second.path());

        let config =
            build_headless_config("/bin/true", first.path(), Duration::from_secs(60)).unwrap();
        assert_eq!(config.user_data_dir.as_deref(), Some(first.path()));
    }

    #[tokio::test]
    async fn profile_directory_is_removed() {
        let profile = ProfileDir::new();
        let path = profile.path().to_path_buf();
        tokio::fs::create_dir_all(path.join("Default")).await.unwrap();

        profile.remove().await;
        assert!(!path.exists());

        // Removing a profile Chromium never created is fine
        ProfileDir::new().remove().await;
    }

    #[tokio::test]
    async fn prompt_close_does_not_kill() {
        let mut process = FakeProcess::new(Duration::ZERO, false);
        assert!(shut_down(&mut process, Duration::from_secs(1)).await);
        assert!(!process.killed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wedged_close_is_killed_after_grace() {
        let mut process = FakeProcess::new(Duration::from_secs(30), false);
        let started = std::time::Instant::now();
        assert!(!shut_down(&mut process, Duration::from_millis(50)).await);
        assert!(process.killed.load(Ordering::SeqCst));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn failed_close_is_killed() {
        let mut process = FakeProcess::new(Duration::ZERO, true);
        assert!(!shut_down(&mut process, Duration::from_secs(1)).await);
        assert!(process.killed.load(Ordering::SeqCst));
    }

    #[test]
    fn first_existing_skips_missing_candidates() {
        let exe = std::env::current_exe().unwrap();
        let found = first_existing([PathBuf::from("/definitely/not/a/browser"), exe.clone()]);
        assert_eq!(found, Some(exe.to_string_lossy().into_owned()));
        assert_eq!(first_existing(Vec::<PathBuf>::new()), None);
    }
}
