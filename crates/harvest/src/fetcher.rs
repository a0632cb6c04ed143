// ABOUTME: Fetcher that returns page markup for a URL, choosing between a static GET and a headless render.
// ABOUTME: The static-vs-headless choice is a pure decision function over the render policy and the static probe.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::HarvestError;
use crate::options::{Options, RenderPolicy};
use crate::record::{FetchResult, RenderMode};
use crate::render::{BrowserSlot, ChromeLauncher, Launcher, RenderOptions};
use crate::resource::{self, FetchOptions};

static STAFF_MARKERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)<td[\s>]|<dd[\s>]|href\s*=\s*["']?\s*(?:mailto|tel):|data-cfemail|s-table-body__row"#,
    )
    .unwrap()
});

static EMAIL_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.([a-z]{2,})\b").unwrap()
});

/// File suffixes that show up in `name@2x.png` style asset paths.
const ASSET_SUFFIXES: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "bmp", "css", "js", "mjs", "json",
    "woff", "woff2", "ttf", "map",
];

/// What the static GET produced.
#[derive(Debug, Clone, Copy)]
pub enum StaticProbe<'a> {
    /// The request failed at the transport level.
    Unreachable,
    /// The server answered 2xx with this markup.
    Markup(&'a str),
}

/// Decide how a page's content should be obtained.
pub fn choose_render_mode(policy: RenderPolicy, probe: &StaticProbe<'_>) -> RenderMode {
    match policy {
        RenderPolicy::StaticOnly => RenderMode::Static,
        RenderPolicy::HeadlessOnly => RenderMode::Headless,
        RenderPolicy::Auto => match probe {
            StaticProbe::Markup(html) if has_staff_markers(html) => RenderMode::Static,
            _ => RenderMode::Headless,
        },
    }
}

/// Whether markup already contains the structures a staff directory is built from.
pub fn has_staff_markers(html: &str) -> bool {
    STAFF_MARKERS_RE.is_match(html)
        || EMAIL_SHAPE_RE.captures_iter(html).any(|caps| {
            let suffix = caps[1].to_ascii_lowercase();
            !ASSET_SUFFIXES.contains(&suffix.as_str())
        })
}

/// Fetches pages for one batch; owns the HTTP client and the browser slot.
pub struct Fetcher {
    client: reqwest::Client,
    fetch_opts: FetchOptions,
    policy: RenderPolicy,
    slot: BrowserSlot,
}

impl Fetcher {
    pub fn new(opts: &Options) -> Result<Self, HarvestError> {
        let client = match &opts.http_client {
            Some(client) => client.clone(),
            None => reqwest::Client::builder()
                .user_agent(&opts.user_agent)
                .timeout(opts.timeout)
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .map_err(|e| {
                    HarvestError::fetch(
                        "",
                        "Client",
                        Some(anyhow::anyhow!("failed to build HTTP client: {}", e)),
                    )
                })?,
        };

        let launcher: Arc<dyn Launcher> = match &opts.launcher {
            Some(launcher) => Arc::clone(launcher),
            None => Arc::new(ChromeLauncher::new(RenderOptions {
                user_agent: opts.user_agent.clone(),
                settle_delay: opts.settle_delay,
                chrome_executable: opts.chrome_executable.clone(),
            })),
        };

        Ok(Self {
            client,
            fetch_opts: FetchOptions {
                headers: opts.headers.clone(),
            },
            policy: opts.render_policy,
            slot: BrowserSlot::new(launcher, opts.render_timeout),
        })
    }

    /// Number of browser launches so far.
    pub fn browser_launches(&self) -> usize {
        self.slot.launches()
    }

    /// Whether a browser session is currently open.
    pub fn browser_active(&self) -> bool {
        self.slot.is_active()
    }

    /// Close the browser session, if one is open.
    pub async fn release_browser(&mut self) {
        self.slot.release().await;
    }

    /// Obtain the markup for `url`.
    ///
    /// A non-2xx answer is final. A transport failure, or markup without
    /// staff structure, is retried through the headless browser under
    /// [`RenderPolicy::Auto`]. When the browser cannot be launched the
    /// static markup, if any, is returned as-is.
    pub async fn fetch(&mut self, url: &str) -> Result<FetchResult, HarvestError> {
        resource::validate_url(url, "Fetch")?;

        if self.policy == RenderPolicy::HeadlessOnly {
            return self.render(url).await;
        }

        let page = match resource::fetch(&self.client, url, &self.fetch_opts).await {
            Ok(page) => page,
            Err(err) if err.is_http_status() || self.policy == RenderPolicy::StaticOnly => {
                return Err(err)
            }
            Err(static_err) => {
                debug!(url, error = %static_err, "static fetch failed");
                let mode = choose_render_mode(self.policy, &StaticProbe::Unreachable);
                if mode == RenderMode::Static {
                    return Err(static_err);
                }
                return self.render(url).await.map_err(|mut render_err| {
                    let detail = format!(
                        "{}; static fetch also failed: {}",
                        render_err
                            .source
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| render_err.code.to_string()),
                        static_err.message()
                    );
                    render_err.source = Some(anyhow::anyhow!(detail));
                    render_err
                });
            }
        };

        let html = page.text_utf8();
        match choose_render_mode(self.policy, &StaticProbe::Markup(&html)) {
            RenderMode::Static => Ok(FetchResult {
                url: url.to_string(),
                final_url: page.final_url,
                raw_html: html,
                render_mode: RenderMode::Static,
            }),
            RenderMode::Headless => {
                info!(url, "static markup has no staff structure; rendering");
                match self.render(url).await {
                    Ok(result) => Ok(result),
                    Err(err) if err.is_browser_unavailable() => {
                        warn!(url, "browser unavailable; using static markup");
                        Ok(FetchResult {
                            url: url.to_string(),
                            final_url: page.final_url,
                            raw_html: html,
                            render_mode: RenderMode::Static,
                        })
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    async fn render(&mut self, url: &str) -> Result<FetchResult, HarvestError> {
        let html = self.slot.render(url).await?;
        Ok(FetchResult {
            url: url.to_string(),
            final_url: url.to_string(),
            raw_html: html,
            render_mode: RenderMode::Headless,
        })
    }
}
