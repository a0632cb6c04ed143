// ABOUTME: CLI for harvesting staff contacts from college athletics directory pages.
// ABOUTME: Reads a URL list, runs one batch, and writes the records file and the error log.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use staffdir_harvest::{
    read_url_list, write_report, Aggregator, BrowserScope, ErrorEntry, Harvester, OutputFormat,
    PageHarvest, RenderMode, RenderPolicy,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "staffdir")]
#[command(about = "Harvest staff contacts from athletics directory pages")]
struct Args {
    /// Newline-delimited list of directory URLs
    #[arg(short = 'i', long = "input", default_value = "target_urls.csv")]
    input: PathBuf,

    /// Records file
    #[arg(short = 'o', long = "output", default_value = "staff_directory.csv")]
    output: PathBuf,

    /// Error log file
    #[arg(short = 'e', long = "errors", default_value = "scrape_errors.txt")]
    errors: PathBuf,

    /// Records format: csv (default) or json
    #[arg(
        short = 'f',
        long = "format",
        default_value = "csv",
        value_parser = ["csv", "json"],
        ignore_case = true
    )]
    format: String,

    /// When to use the headless browser: auto, static, headless
    #[arg(
        long = "render",
        default_value = "auto",
        value_parser = ["auto", "static", "headless"],
        ignore_case = true
    )]
    render: String,

    /// Browser lifetime: batch (default) or url
    #[arg(
        long = "browser-scope",
        default_value = "batch",
        value_parser = ["batch", "url"],
        ignore_case = true
    )]
    browser_scope: String,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout", default_value_t = 15)]
    timeout: u64,

    /// Headless render timeout in seconds
    #[arg(long = "render-timeout", default_value_t = 15)]
    render_timeout: u64,

    /// Wait after page load before reading the rendered DOM, in milliseconds
    #[arg(long = "settle-ms", default_value_t = 2000)]
    settle_ms: u64,

    /// User-Agent for HTTP requests and the browser
    #[arg(long = "user-agent")]
    user_agent: Option<String>,

    /// Path to a Chrome/Chromium executable
    #[arg(long = "chrome")]
    chrome: Option<PathBuf>,

    /// Extra request header as KEY:VALUE (repeatable)
    #[arg(long = "header")]
    headers: Vec<String>,

    /// Extract from a saved HTML file instead of fetching (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// Source URL recorded for --html extraction
    #[arg(long = "url")]
    url: Option<String>,
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once(':') else {
        bail!("header must be KEY:VALUE, got {:?}", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("header name is empty in {:?}", raw);
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn build_harvester(args: &Args) -> Result<Harvester> {
    let mut builder = Harvester::builder()
        .timeout(Duration::from_secs(args.timeout))
        .render_policy(RenderPolicy::from(args.render.as_str()))
        .browser_scope(BrowserScope::from(args.browser_scope.as_str()))
        .render_timeout(Duration::from_secs(args.render_timeout))
        .settle_delay(Duration::from_millis(args.settle_ms));

    if let Some(user_agent) = &args.user_agent {
        builder = builder.user_agent(user_agent);
    }
    if let Some(chrome) = &args.chrome {
        builder = builder.chrome_executable(chrome);
    }
    for raw in &args.headers {
        let (key, value) = parse_header(raw)?;
        builder = builder.header(key, value);
    }

    builder.build().context("failed to set up harvester")
}

async fn run(args: Args) -> Result<()> {
    let format = OutputFormat::from(args.format.as_str());
    let mut harvester = build_harvester(&args)?;

    let report = match (&args.html, &args.url) {
        (Some(html_path), Some(url)) => {
            let html = std::fs::read_to_string(html_path)
                .with_context(|| format!("failed to read {}", html_path.display()))?;
            let mut aggregator = Aggregator::new();
            match harvester.harvest_html(&html, url) {
                Ok(outcome) => aggregator.add_page(PageHarvest {
                    url: url.clone(),
                    render_mode: RenderMode::Static,
                    outcome,
                }),
                Err(err) => aggregator.add_error(ErrorEntry::from(err)),
            }
            aggregator.finish()
        }
        (Some(_), None) => bail!("--url is required when using --html"),
        _ => {
            let urls = read_url_list(&args.input)
                .with_context(|| format!("failed to read URL list {}", args.input.display()))?;
            info!(count = urls.len(), input = %args.input.display(), "loaded URL list");
            harvester.run_batch(&urls).await
        }
    };

    write_outputs(&report, &args.output, &args.errors, format)?;
    info!(
        records = report.records.len(),
        errors = report.errors.len(),
        output = %args.output.display(),
        error_log = %args.errors.display(),
        "outputs written"
    );
    Ok(())
}

fn write_outputs(
    report: &staffdir_harvest::BatchReport,
    output: &Path,
    errors: &Path,
    format: OutputFormat,
) -> Result<()> {
    write_report(report, output, errors, format).with_context(|| {
        format!(
            "failed to write {} or {}",
            output.display(),
            errors.display()
        )
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let start = Instant::now();

    match run(args).await {
        Ok(()) => {
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(1)
        }
    }
}
