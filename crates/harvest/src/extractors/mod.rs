// ABOUTME: Strategy cascade for staff directory pages plus the per-field extractors.
// ABOUTME: Strategies run in fixed priority order; the first one that yields a plausible record wins.

//! Extraction.
//!
//! Submodules:
//! - `table`, `deflist`, `blocks`: the three page-level strategies.
//! - `email`, `phone`, `fields`: per-entry field extractors.
//! - `compiled`: cached CSS selectors shared by all of the above.

pub mod blocks;
pub mod compiled;
pub mod deflist;
pub mod email;
pub mod fields;
pub mod phone;
pub mod table;

use scraper::Html;
use tracing::{debug, info};

use crate::error::HarvestError;
use crate::record::{ExtractionOutcome, StrategyKind};

impl StrategyKind {
    /// Every strategy in priority order.
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::StructuredTable,
        StrategyKind::DefinitionList,
        StrategyKind::RepeatedBlock,
    ];

    /// Run this strategy over a parsed document.
    pub fn attempt(self, doc: &Html, url: &str) -> ExtractionOutcome {
        match self {
            StrategyKind::StructuredTable => table::extract(doc, url),
            StrategyKind::DefinitionList => deflist::extract(doc, url),
            StrategyKind::RepeatedBlock => blocks::extract(doc, url),
        }
    }
}

/// An ordered list of strategies; the first success wins.
#[derive(Debug, Clone)]
pub struct Cascade {
    strategies: Vec<StrategyKind>,
}

impl Default for Cascade {
    fn default() -> Self {
        Self {
            strategies: StrategyKind::ALL.to_vec(),
        }
    }
}

impl Cascade {
    /// A cascade over a custom strategy order.
    pub fn new(strategies: Vec<StrategyKind>) -> Self {
        Self { strategies }
    }

    /// Parse `html` and run the cascade.
    pub fn run_html(&self, html: &str, url: &str) -> Result<ExtractionOutcome, HarvestError> {
        let doc = Html::parse_document(html);
        self.run(&doc, url)
    }

    /// Try each strategy in order and return the first outcome with a
    /// plausible record. Outcomes are never merged across strategies.
    pub fn run(&self, doc: &Html, url: &str) -> Result<ExtractionOutcome, HarvestError> {
        for strategy in &self.strategies {
            let outcome = strategy.attempt(doc, url);
            if outcome.is_success() {
                info!(
                    url,
                    strategy = %strategy,
                    records = outcome.records.len(),
                    confidence = %outcome.confidence,
                    "extracted staff records"
                );
                return Ok(outcome);
            }
            debug!(url, strategy = %strategy, "strategy found nothing");
        }

        let tried = self
            .strategies
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(HarvestError::no_structure(
            url,
            "Extract",
            Some(anyhow::anyhow!("tried {}", tried)),
        ))
    }
}
