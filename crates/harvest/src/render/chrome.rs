// ABOUTME: chromiumoxide-backed Launcher and Renderer.
// ABOUTME: Spawns headless Chrome and drives its CDP handler on a tokio task; tabs and the process are closed on every exit path.

use async_trait::async_trait;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{Launcher, RenderOptions, Renderer};
use crate::error::HarvestError;

/// Launches a local headless Chrome/Chromium.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    opts: RenderOptions,
}

impl ChromeLauncher {
    pub fn new(opts: RenderOptions) -> Self {
        Self { opts }
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn Renderer>, HarvestError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.opts.user_agent));
        if let Some(path) = &self.opts.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(|e| {
            HarvestError::browser_unavailable("", "Launch", Some(anyhow::anyhow!("{}", e)))
        })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            HarvestError::browser_unavailable("", "Launch", Some(anyhow::Error::new(e)))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    trace!(error = %err, "cdp handler event error");
                }
            }
        });

        Ok(Box::new(ChromeRenderer {
            browser,
            handler_task,
            opts: self.opts.clone(),
        }))
    }
}

/// One running Chrome process.
pub struct ChromeRenderer {
    browser: Browser,
    handler_task: JoinHandle<()>,
    opts: RenderOptions,
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&mut self, url: &str) -> Result<String, HarvestError> {
        let page = self.browser.new_page(url).await.map_err(|e| {
            HarvestError::render(url, "Render", Some(anyhow::anyhow!("navigation failed: {}", e)))
        })?;

        let tab = TabGuard::new(page);
        let result = read_rendered(tab.page(), url, self.opts.settle_delay).await;
        tab.close().await;

        let html = result?;
        debug!(url, bytes = html.len(), "headless render complete");
        Ok(html)
    }

    async fn close(&mut self) -> Result<(), HarvestError> {
        self.browser.close().await.map_err(|e| {
            HarvestError::render("", "Close", Some(anyhow::Error::new(e)))
        })?;
        if let Err(err) = self.browser.wait().await {
            trace!(error = %err, "waiting for browser exit failed");
        }
        self.handler_task.abort();
        Ok(())
    }
}

async fn read_rendered(page: &Page, url: &str, settle: Duration) -> Result<String, HarvestError> {
    page.wait_for_navigation().await.map_err(|e| {
        HarvestError::render(url, "Render", Some(anyhow::anyhow!("page failed to load: {}", e)))
    })?;

    // Scripts keep filling the directory after the load event.
    tokio::time::sleep(settle).await;

    page.content().await.map_err(|e| {
        HarvestError::render(
            url,
            "Render",
            Some(anyhow::anyhow!("failed to read page content: {}", e)),
        )
    })
}

/// A browser tab that can be shut.
#[async_trait]
trait Tab: Clone + Send + Sync + 'static {
    async fn close_tab(self) -> Result<(), String>;
}

#[async_trait]
impl Tab for Page {
    async fn close_tab(self) -> Result<(), String> {
        self.close().await.map_err(|e| e.to_string())
    }
}

/// Closes its tab when the render finishes, fails, or is cancelled by the render timeout.
struct TabGuard<T: Tab> {
    tab: T,
    armed: bool,
}

impl<T: Tab> TabGuard<T> {
    fn new(tab: T) -> Self {
        Self { tab, armed: true }
    }

    fn page(&self) -> &T {
        &self.tab
    }

    async fn close(mut self) {
        self.armed = false;
        if let Err(err) = self.tab.clone().close_tab().await {
            trace!(error = %err, "tab close failed");
        }
    }
}

impl<T: Tab> Drop for TabGuard<T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let tab = self.tab.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(err) = tab.close_tab().await {
                    trace!(error = %err, "tab close failed");
                }
            });
        }
    }
}

impl Drop for ChromeRenderer {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process if close() never ran.
        self.handler_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct CountingTab {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tab for CountingTab {
        async fn close_tab(self) -> Result<(), String> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn failing_read(_tab: &CountingTab) -> Result<String, HarvestError> {
        Err(HarvestError::render(
            "https://valid.edu/staff",
            "Render",
            Some(anyhow::anyhow!("page failed to load")),
        ))
    }

    #[tokio::test]
    async fn tab_is_closed_when_reading_fails() {
        let closes = Arc::new(AtomicUsize::new(0));
        let tab = TabGuard::new(CountingTab {
            closes: Arc::clone(&closes),
        });

        let result = failing_read(tab.page()).await;
        tab.close().await;

        assert!(result.is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tab_is_closed_when_render_is_cancelled() {
        let closes = Arc::new(AtomicUsize::new(0));
        let tab = TabGuard::new(CountingTab {
            closes: Arc::clone(&closes),
        });

        let slow = async move {
            let _tab = tab;
            tokio::time::sleep(Duration::from_secs(60)).await;
        };
        assert!(tokio::time::timeout(Duration::from_millis(10), slow)
            .await
            .is_err());

        for _ in 0..10 {
            if closes.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
