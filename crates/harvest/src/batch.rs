// ABOUTME: Harvester drives one batch: fetch, cascade, and aggregate for each URL in order.
// ABOUTME: Aggregator keeps append-only record and error collections plus per-batch statistics.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::HarvestError;
use crate::extractors::Cascade;
use crate::fetcher::Fetcher;
use crate::options::{BrowserScope, HarvesterBuilder, Options};
use crate::record::{ErrorEntry, ExtractionOutcome, RenderMode, StaffRecord, StrategyKind};

/// Records harvested from one page.
#[derive(Debug, Clone)]
pub struct PageHarvest {
    pub url: String,
    pub render_mode: RenderMode,
    pub outcome: ExtractionOutcome,
}

/// Counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub urls: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub records: usize,
    pub headless_renders: usize,
    pub by_strategy: HashMap<StrategyKind, usize>,
}

impl BatchStats {
    /// Pages extracted by the given strategy.
    pub fn strategy_count(&self, kind: StrategyKind) -> usize {
        self.by_strategy.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} URLs, {} succeeded, {} failed, {} records, {} headless renders",
            self.urls, self.succeeded, self.failed, self.records, self.headless_renders
        )?;
        for kind in StrategyKind::ALL {
            let count = self.strategy_count(kind);
            if count > 0 {
                write!(f, ", {} {}", count, kind)?;
            }
        }
        Ok(())
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub records: Vec<StaffRecord>,
    pub errors: Vec<ErrorEntry>,
    pub stats: BatchStats,
}

/// Append-only accumulation of records and errors across a batch.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Vec<StaffRecord>,
    errors: Vec<ErrorEntry>,
    stats: BatchStats,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&mut self, page: PageHarvest) {
        self.stats.urls += 1;
        self.stats.succeeded += 1;
        self.stats.records += page.outcome.records.len();
        if page.render_mode == RenderMode::Headless {
            self.stats.headless_renders += 1;
        }
        *self
            .stats
            .by_strategy
            .entry(page.outcome.strategy_used)
            .or_insert(0) += 1;
        self.records.extend(page.outcome.records);
    }

    pub fn add_error(&mut self, entry: ErrorEntry) {
        self.stats.urls += 1;
        self.stats.failed += 1;
        self.errors.push(entry);
    }

    pub fn finish(self) -> BatchReport {
        BatchReport {
            records: self.records,
            errors: self.errors,
            stats: self.stats,
        }
    }
}

/// Fetches and extracts staff directory pages.
pub struct Harvester {
    opts: Options,
    fetcher: Fetcher,
    cascade: Cascade,
}

impl Harvester {
    /// Create a new HarvesterBuilder.
    pub fn builder() -> HarvesterBuilder {
        HarvesterBuilder::new()
    }

    /// Create a Harvester with the given options.
    pub fn new(opts: Options) -> Result<Self, HarvestError> {
        let fetcher = Fetcher::new(&opts)?;
        Ok(Self {
            opts,
            fetcher,
            cascade: Cascade::default(),
        })
    }

    /// Number of headless browser launches so far.
    pub fn browser_launches(&self) -> usize {
        self.fetcher.browser_launches()
    }

    /// Fetch one URL and run the strategy cascade over it.
    pub async fn harvest(&mut self, url: &str) -> Result<PageHarvest, HarvestError> {
        let page = self.fetcher.fetch(url).await?;
        if page.final_url != page.url {
            debug!(final_url = %page.final_url, "followed redirect");
        }
        let outcome = self.harvest_html(&page.raw_html, url)?;
        Ok(PageHarvest {
            url: url.to_string(),
            render_mode: page.render_mode,
            outcome,
        })
    }

    /// Run the strategy cascade over markup already in hand.
    ///
    /// Records carry `url` as their source.
    pub fn harvest_html(&self, html: &str, url: &str) -> Result<ExtractionOutcome, HarvestError> {
        self.cascade.run_html(html, url)
    }

    /// Process every URL in order and collect the results.
    ///
    /// No failure aborts the batch: each one becomes an [`ErrorEntry`].
    /// The browser is released when the batch ends, or after each URL
    /// under [`BrowserScope::PerUrl`].
    pub async fn run_batch<I, S>(&mut self, urls: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut aggregator = Aggregator::new();

        for url in urls {
            let url = url.as_ref().trim();
            let span = info_span!("harvest", url = %url);
            async {
                match self.harvest(url).await {
                    Ok(page) => aggregator.add_page(page),
                    Err(err) => {
                        warn!(stage = %err.stage(), error = %err.message(), "url failed");
                        aggregator.add_error(ErrorEntry::from(err.for_url(url)));
                    }
                }
                if self.opts.browser_scope == BrowserScope::PerUrl {
                    self.fetcher.release_browser().await;
                }
            }
            .instrument(span)
            .await;
        }

        self.fetcher.release_browser().await;
        let report = aggregator.finish();
        info!(stats = %report.stats, "batch complete");
        report
    }

    /// Close the headless browser if one is running.
    pub async fn shutdown(&mut self) {
        self.fetcher.release_browser().await;
    }
}
