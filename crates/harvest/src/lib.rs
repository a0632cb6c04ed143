// ABOUTME: Main library entry point for the staff directory harvester.
// ABOUTME: Re-exports the public API: Harvester, HarvesterBuilder, records, errors, writers, and the URL-list reader.

//! staffdir-harvest - extracts staff contact records from college athletics
//! directory pages.
//!
//! Each URL is fetched statically, or through a headless browser when the
//! page builds its directory with JavaScript, then run through a cascade of
//! extraction strategies (structured table, definition list, repeated
//! block). Failures never stop a batch; they become error-log entries.
//!
//! # Example
//!
//! ```no_run
//! use staffdir_harvest::{write_report, Harvester, HarvestError, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), HarvestError> {
//!     let mut harvester = Harvester::builder().build()?;
//!     let report = harvester.run_batch(["https://example.edu/staff-directory"]).await;
//!     write_report(&report, "staff_directory.csv", "scrape_errors.txt", OutputFormat::Csv)
//!         .expect("write outputs");
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod error;
pub mod extractors;
pub mod fetcher;
pub mod input;
pub mod options;
pub mod output;
pub mod record;
pub mod render;
pub mod resource;

pub use crate::batch::{Aggregator, BatchReport, BatchStats, Harvester, PageHarvest};
pub use crate::error::{ErrorCode, HarvestError};
pub use crate::extractors::Cascade;
pub use crate::fetcher::{choose_render_mode, Fetcher, StaticProbe};
pub use crate::input::{parse_url_list, read_url_list};
pub use crate::options::{BrowserScope, HarvesterBuilder, Options, RenderPolicy};
pub use crate::output::{write_error_log, write_records, write_report, OutputFormat};
pub use crate::record::{
    Confidence, ErrorEntry, ExtractionOutcome, FetchResult, RenderMode, Stage, StaffRecord,
    StrategyKind,
};
pub use crate::render::{ChromeLauncher, Launcher, RenderOptions, Renderer};
