// ABOUTME: Headless browser rendering for JavaScript-built directory pages.
// ABOUTME: Launcher/Renderer traits, the chromiumoxide implementation, and the lazily acquired BrowserSlot.

//! Headless rendering.
//!
//! The browser is a batch-scoped resource: [`BrowserSlot`] launches it on
//! the first render request and closes it on [`BrowserSlot::release`].
//! Renderers also tear their process down on drop, so an early return
//! never leaks a browser.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::HarvestError;

pub mod chrome;

pub use chrome::ChromeLauncher;

/// Starts browser sessions.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Renderer>, HarvestError>;
}

/// A live browser session.
#[async_trait]
pub trait Renderer: Send {
    /// Navigate to `url`, let scripts run, and return the serialized DOM.
    async fn render(&mut self, url: &str) -> Result<String, HarvestError>;

    /// Shut the browser down.
    async fn close(&mut self) -> Result<(), HarvestError>;
}

/// Settings shared by the default launcher.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub user_agent: String,
    pub settle_delay: Duration,
    pub chrome_executable: Option<PathBuf>,
}

/// Holds at most one browser session, launched on demand.
pub struct BrowserSlot {
    launcher: Arc<dyn Launcher>,
    active: Option<Box<dyn Renderer>>,
    launch_failure: Option<String>,
    render_timeout: Duration,
    launches: usize,
}

impl BrowserSlot {
    pub fn new(launcher: Arc<dyn Launcher>, render_timeout: Duration) -> Self {
        Self {
            launcher,
            active: None,
            launch_failure: None,
            render_timeout,
            launches: 0,
        }
    }

    /// Whether a browser is currently running.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Number of browser launches so far.
    pub fn launches(&self) -> usize {
        self.launches
    }

    /// Render `url`, launching the browser first if needed.
    ///
    /// A failed launch is remembered: later calls fail fast with
    /// `BrowserUnavailable` instead of trying again. A render that exceeds
    /// the timeout fails with `RenderTimeout` and the session is closed.
    pub async fn render(&mut self, url: &str) -> Result<String, HarvestError> {
        if self.active.is_none() {
            if let Some(reason) = &self.launch_failure {
                return Err(HarvestError::browser_unavailable(
                    url,
                    "Render",
                    Some(anyhow::anyhow!("{}", reason)),
                ));
            }
            info!("launching headless browser");
            match self.launcher.launch().await {
                Ok(renderer) => {
                    self.launches += 1;
                    self.active = Some(renderer);
                }
                Err(err) => {
                    warn!(error = %err, "headless browser unavailable");
                    let reason = err
                        .source
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| err.code.to_string());
                    self.launch_failure = Some(reason.clone());
                    return Err(HarvestError::browser_unavailable(
                        url,
                        "Render",
                        Some(anyhow::anyhow!("{}", reason)),
                    ));
                }
            }
        }

        let Some(renderer) = self.active.as_mut() else {
            return Err(HarvestError::browser_unavailable(url, "Render", None));
        };

        let outcome = tokio::time::timeout(self.render_timeout, renderer.render(url)).await;
        match outcome {
            Ok(result) => result.map_err(|e| e.for_url(url)),
            Err(_) => {
                warn!(url, timeout_ms = self.render_timeout.as_millis() as u64, "render timed out");
                self.release().await;
                Err(HarvestError::render_timeout(
                    url,
                    "Render",
                    Some(anyhow::anyhow!(
                        "page did not settle within {}ms",
                        self.render_timeout.as_millis()
                    )),
                ))
            }
        }
    }

    /// Close the running browser, if any. Close errors are logged, not returned.
    pub async fn release(&mut self) {
        if let Some(mut renderer) = self.active.take() {
            debug!("closing headless browser");
            if let Err(err) = renderer.close().await {
                warn!(error = %err, "browser did not close cleanly");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeLauncher;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn launches_lazily_and_reuses_session() {
        let launcher = FakeLauncher::default()
            .with_page("https://a.edu/staff", "<dl></dl>")
            .with_page("https://b.edu/staff", "<table></table>");
        let launches = Arc::clone(&launcher.launches);
        let mut slot = BrowserSlot::new(Arc::new(launcher), Duration::from_secs(5));

        assert!(!slot.is_active());
        assert_eq!(launches.load(Ordering::SeqCst), 0);

        assert_eq!(slot.render("https://a.edu/staff").await.unwrap(), "<dl></dl>");
        assert_eq!(
            slot.render("https://b.edu/staff").await.unwrap(),
            "<table></table>"
        );
        assert_eq!(launches.load(Ordering::SeqCst), 1);
        assert!(slot.is_active());
    }

    #[tokio::test]
    async fn release_closes_session() {
        let launcher = FakeLauncher::default().with_page("https://a.edu/staff", "<dl></dl>");
        let closes = Arc::clone(&launcher.closes);
        let mut slot = BrowserSlot::new(Arc::new(launcher), Duration::from_secs(5));

        slot.render("https://a.edu/staff").await.unwrap();
        slot.release().await;
        slot.release().await;

        assert!(!slot.is_active());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn render_timeout_tears_down_session() {
        let launcher = FakeLauncher {
            delay: Some(Duration::from_secs(2)),
            ..FakeLauncher::default()
        }
        .with_page("https://slow.edu/staff", "<dl></dl>");
        let closes = Arc::clone(&launcher.closes);
        let mut slot = BrowserSlot::new(Arc::new(launcher), Duration::from_millis(50));

        let err = slot
            .render("https://slow.edu/staff")
            .await
            .expect_err("render should time out");
        assert!(err.is_render_timeout());
        assert_eq!(err.url, "https://slow.edu/staff");
        assert!(!slot.is_active());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn launch_failure_is_remembered() {
        let launcher = FakeLauncher {
            fail_launch: true,
            ..FakeLauncher::default()
        };
        let mut slot = BrowserSlot::new(Arc::new(launcher), Duration::from_secs(5));

        let first = slot.render("https://a.edu/staff").await.unwrap_err();
        let second = slot.render("https://b.edu/staff").await.unwrap_err();
        assert!(first.is_browser_unavailable());
        assert!(second.is_browser_unavailable());
        assert_eq!(second.url, "https://b.edu/staff");
        assert!(second.message().contains("no chrome binary found"));
        assert_eq!(slot.launches(), 0);
    }
}
