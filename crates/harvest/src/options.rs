// ABOUTME: Configuration options for the harvester including render policy, browser scope, and HarvesterBuilder.
// ABOUTME: HarvesterBuilder provides a fluent API for constructing Harvester instances with custom settings.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::Harvester;
use crate::error::HarvestError;
use crate::render::Launcher;

/// Browser User-Agent sent by both the HTTP client and the headless browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// When to use the headless browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPolicy {
    /// Static fetch first, headless when the static result is unusable.
    #[default]
    Auto,
    /// Never launch a browser.
    StaticOnly,
    /// Always render through the browser.
    HeadlessOnly,
}

impl fmt::Display for RenderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenderPolicy::Auto => "auto",
            RenderPolicy::StaticOnly => "static",
            RenderPolicy::HeadlessOnly => "headless",
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for RenderPolicy {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "static" | "static-only" => RenderPolicy::StaticOnly,
            "headless" | "headless-only" | "browser" => RenderPolicy::HeadlessOnly,
            _ => RenderPolicy::Auto,
        }
    }
}

/// How long a launched browser lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserScope {
    /// Launched on first need, closed when the batch ends.
    #[default]
    PerBatch,
    /// Closed after every URL that used it.
    PerUrl,
}

impl From<&str> for BrowserScope {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "url" | "per-url" => BrowserScope::PerUrl,
            _ => BrowserScope::PerBatch,
        }
    }
}

/// Configuration options for the harvester.
#[derive(Clone)]
pub struct Options {
    pub timeout: Duration,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    pub http_client: Option<reqwest::Client>,
    pub render_policy: RenderPolicy,
    pub browser_scope: BrowserScope,
    pub render_timeout: Duration,
    pub settle_delay: Duration,
    pub chrome_executable: Option<PathBuf>,
    pub launcher: Option<Arc<dyn Launcher>>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("headers", &self.headers)
            .field("render_policy", &self.render_policy)
            .field("browser_scope", &self.browser_scope)
            .field("render_timeout", &self.render_timeout)
            .field("settle_delay", &self.settle_delay)
            .field("chrome_executable", &self.chrome_executable)
            .field("launcher", &self.launcher.is_some())
            .finish()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: HashMap::new(),
            http_client: None,
            render_policy: RenderPolicy::Auto,
            browser_scope: BrowserScope::PerBatch,
            render_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(2),
            chrome_executable: None,
            launcher: None,
        }
    }
}

/// Builder for constructing Harvester instances with custom configuration.
#[derive(Debug, Clone)]
pub struct HarvesterBuilder {
    opts: Options,
}

impl HarvesterBuilder {
    /// Create a new HarvesterBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the HTTP request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Add a custom header to all static requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Choose when the headless browser is used.
    pub fn render_policy(mut self, policy: RenderPolicy) -> Self {
        self.opts.render_policy = policy;
        self
    }

    /// Choose how long a launched browser lives.
    pub fn browser_scope(mut self, scope: BrowserScope) -> Self {
        self.opts.browser_scope = scope;
        self
    }

    /// Upper bound for one headless render.
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.opts.render_timeout = timeout;
        self
    }

    /// Pause after navigation so page scripts can populate the DOM.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.opts.settle_delay = delay;
        self
    }

    /// Path to a Chrome/Chromium binary (auto-detected otherwise).
    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.opts.chrome_executable = Some(path.into());
        self
    }

    /// Replace the browser launcher.
    pub fn launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.opts.launcher = Some(launcher);
        self
    }

    /// Build the Harvester with the configured options.
    pub fn build(self) -> Result<Harvester, HarvestError> {
        Harvester::new(self.opts)
    }
}

impl Default for HarvesterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
