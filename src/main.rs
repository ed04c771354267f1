//! Site-Audit main entry point
//!
//! This is the command-line interface for the Site-Audit SEO auditor.

use anyhow::Context;
use clap::Parser;
use site_audit::config::{load_options_builder, options_fingerprint, AuditOptions};
use site_audit::output::{write_reports, OutputError, SCREENSHOT_DIR};
use site_audit::url::{resolve, TargetGuard};
use site_audit::{run_with_cancellation, AuditResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Site-Audit: a bounded-crawl SEO auditor
///
/// Site-Audit crawls one site breadth-first within a page budget, runs
/// technical, content, on-page, schema, performance, image and AI-readiness
/// checks, and writes a full report, an action plan and a JSON summary.
#[derive(Parser, Debug)]
#[command(name = "site-audit")]
#[command(version)]
#[command(about = "A bounded-crawl SEO auditor", long_about = None)]
struct Cli {
    /// Start URL of the site to audit
    #[arg(value_name = "URL")]
    url: String,

    /// Directory the reports are written to
    #[arg(short, long, value_name = "DIR", default_value = "seo-audit")]
    output: PathBuf,

    /// Path to TOML options file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Page budget (values above 500 are clamped)
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "S")]
    timeout: Option<u64>,

    /// Concurrent fetch slots
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Delay between requests of one slot, in seconds
    #[arg(long, value_name = "S")]
    delay: Option<f64>,

    /// Maximum link distance from the start URL
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Take headless-browser screenshots
    #[arg(long)]
    visual: bool,

    /// Treat subdomains of the start host as part of the site
    #[arg(long)]
    include_subdomains: bool,

    /// PageSpeed Insights API key for performance scoring
    #[arg(long, value_name = "KEY", env = "PAGESPEED_API_KEY", hide_env_values = true)]
    pagespeed_key: Option<String>,

    /// Validate options and the target URL without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            exit_code(&e)
        }
    }
}

/// Report write failures exit with 1, everything else that stops a run with 2
fn exit_code(err: &anyhow::Error) -> ExitCode {
    if err.downcast_ref::<OutputError>().is_some() {
        ExitCode::from(1)
    } else {
        ExitCode::from(2)
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_audit=info,warn"),
            1 => EnvFilter::new("site_audit=debug,info"),
            2 => EnvFilter::new("site_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = build_options(&cli)?;
    tracing::info!("Options fingerprint: {}", options_fingerprint(&options));

    if cli.dry_run {
        return handle_dry_run(&cli, &options).await;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight requests");
            on_interrupt.cancel();
        }
    });

    let result = run_with_cancellation(&cli.url, &options, cancel)
        .await
        .with_context(|| format!("Audit of {} failed", cli.url))?;

    write_reports(&result, &cli.output)
        .with_context(|| format!("Failed to write reports to {}", cli.output.display()))?;
    print_summary(&result, &cli.output);
    Ok(())
}

/// Layers the options file (if any) and command-line flags, then validates
fn build_options(cli: &Cli) -> anyhow::Result<AuditOptions> {
    let mut builder = match &cli.config {
        Some(path) => {
            tracing::info!("Loading options from: {}", path.display());
            load_options_builder(path)
                .with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => AuditOptions::builder(),
    };

    if let Some(v) = cli.max_pages {
        builder = builder.max_pages(v);
    }
    if let Some(v) = cli.timeout {
        builder = builder.timeout_seconds(v);
    }
    if let Some(v) = cli.concurrency {
        builder = builder.concurrency(v);
    }
    if let Some(v) = cli.delay {
        builder = builder.request_delay_seconds(v);
    }
    if let Some(v) = cli.max_depth {
        builder = builder.max_depth(v);
    }
    if cli.visual {
        builder = builder.include_visual(true);
    }
    if cli.include_subdomains {
        builder = builder.include_subdomains(true);
    }
    if cli.pagespeed_key.is_some() {
        builder = builder.pagespeed_api_key(cli.pagespeed_key.clone());
    }

    let mut options = builder.build().context("Invalid options")?;
    if options.include_visual && options.screenshot_dir.is_none() {
        options.screenshot_dir = Some(cli.output.join(SCREENSHOT_DIR));
    }
    Ok(options)
}

/// Handles the --dry-run mode: validates the target and shows the options
async fn handle_dry_run(cli: &Cli, options: &AuditOptions) -> anyhow::Result<()> {
    let guard = TargetGuard::new(options.allow_private_targets);
    let scope = resolve(&cli.url, &guard, options.include_subdomains)
        .await
        .with_context(|| format!("Invalid target {}", cli.url))?;

    println!("=== Site-Audit Dry Run ===\n");

    println!("Target:");
    println!("  Start URL: {}", scope.start());
    println!("  Domain: {}", scope.canonical_domain());
    println!("  Subdomains included: {}", scope.includes_subdomains());

    println!("\nCrawl:");
    println!("  Max pages: {}", options.max_pages);
    println!("  Max depth: {}", options.max_depth);
    println!("  Concurrency: {}", options.concurrency);
    println!("  Request delay: {}s", options.request_delay_seconds);
    println!("  Timeout: {}s", options.timeout_seconds);
    println!("  Max redirects: {}", options.max_redirects);
    println!("  Failure threshold: {}", options.failure_threshold);
    println!("  Retry attempts: {}", options.retry_attempts);
    println!("  User agent: {}", options.user_agent.header_value());

    println!("\nChecks:");
    println!(
        "  Performance: {}",
        if options.pagespeed_api_key.is_some() {
            "PageSpeed Insights"
        } else {
            "not measured (no API key)"
        }
    );
    match (options.include_visual, &options.screenshot_dir) {
        (true, Some(dir)) => println!("  Visual: screenshots to {}", dir.display()),
        _ => println!("  Visual: off"),
    }

    println!("\nOutput: {}", cli.output.display());
    println!("\n✓ Options are valid");
    println!("✓ Would audit {} within {} pages", scope.start(), options.max_pages);

    Ok(())
}

fn print_summary(result: &AuditResult, output: &Path) {
    let card = &result.scorecard;
    println!("\n=== Site-Audit: {} ===\n", result.target);
    println!(
        "Overall score: {:.1}/100 ({}, grade {})",
        card.overall, card.band, card.grade
    );
    for entry in &card.categories {
        match entry.score.value() {
            Some(score) => println!("  {:<26} {:>5.1}", entry.category.label(), score),
            None => println!("  {:<26} Not Measured", entry.category.label()),
        }
    }
    println!(
        "\nPages: {} visited, {} failed ({})",
        result.stats.pages_visited, result.stats.pages_failed, result.stats.state
    );
    println!("Findings: {}", result.findings.len());
    println!("Reports: {}", output.display());
}
