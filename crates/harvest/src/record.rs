// ABOUTME: Data model for harvested staff contacts, fetch results, extraction outcomes, and error entries.
// ABOUTME: StaffRecord serializes to the directory CSV columns; ErrorEntry renders one error-log line.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One contact extracted from a staff directory page.
///
/// Only `source_url` is guaranteed; every other field is best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRecord {
    #[serde(rename = "Name")]
    pub full_name: Option<String>,
    #[serde(rename = "Email")]
    pub email: Option<String>,
    #[serde(rename = "Position/Title")]
    pub title: Option<String>,
    #[serde(rename = "Phone")]
    pub phone: Option<String>,
    #[serde(rename = "Sport/Department")]
    pub department: Option<String>,
    #[serde(rename = "Source URL")]
    pub source_url: String,
}

impl StaffRecord {
    /// Create an empty record for the given page.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            full_name: None,
            email: None,
            title: None,
            phone: None,
            department: None,
            source_url: source_url.into(),
        }
    }

    /// A record counts toward a strategy's success when it has a name or an email.
    pub fn is_plausible(&self) -> bool {
        has_text(&self.full_name) || has_text(&self.email)
    }

    /// True when the record carries an email or a phone number.
    pub fn has_contact(&self) -> bool {
        has_text(&self.email) || has_text(&self.phone)
    }
}

fn has_text(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// How the page content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Static,
    Headless,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Static => write!(f, "static"),
            RenderMode::Headless => write!(f, "headless"),
        }
    }
}

/// Raw page content for one URL.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub final_url: String,
    pub raw_html: String,
    pub render_mode: RenderMode,
}

/// The extraction strategies, in cascade priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    StructuredTable,
    DefinitionList,
    RepeatedBlock,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::StructuredTable => "structured-table",
            StrategyKind::DefinitionList => "definition-list",
            StrategyKind::RepeatedBlock => "repeated-block",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// One level lower, saturating at Low.
    pub fn downgrade(self) -> Self {
        match self {
            Confidence::High => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// Records produced by one strategy for one page.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub records: Vec<StaffRecord>,
    pub strategy_used: StrategyKind,
    pub confidence: Confidence,
}

impl ExtractionOutcome {
    /// Build an outcome, keeping only plausible records and grading confidence.
    ///
    /// The base confidence drops one level when fewer than half of the
    /// records carry an email or phone number.
    pub fn graded(records: Vec<StaffRecord>, strategy: StrategyKind, base: Confidence) -> Self {
        let records: Vec<StaffRecord> = records.into_iter().filter(|r| r.is_plausible()).collect();
        let with_contact = records.iter().filter(|r| r.has_contact()).count();
        let confidence = if with_contact * 2 < records.len() {
            base.downgrade()
        } else {
            base
        };
        Self {
            records,
            strategy_used: strategy,
            confidence,
        }
    }

    /// A strategy succeeded when it produced at least one plausible record.
    pub fn is_success(&self) -> bool {
        self.records.iter().any(StaffRecord::is_plausible)
    }
}

/// The pipeline stage at which a URL failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Parse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Parse => write!(f, "parse"),
        }
    }
}

/// One failed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub url: String,
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for ErrorEntry {
    /// A single error-log line; embedded newlines are flattened.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message.split_whitespace().collect::<Vec<_>>().join(" ");
        write!(f, "[{}] {} - {}", self.stage, self.url, message)
    }
}

impl From<crate::error::HarvestError> for ErrorEntry {
    fn from(err: crate::error::HarvestError) -> Self {
        Self {
            stage: err.stage(),
            message: err.message(),
            url: err.url,
        }
    }
}
