//! `pagesnap capture` — expand and snapshot one or more URLs.

use super::output;
use crate::audit::RunLogger;
use crate::expand::{ExpandTuning, ExpansionRule};
use crate::extract;
use crate::pipeline::archive::SnapshotArchive;
use crate::pipeline::{self, filename, BatchReport, CaptureOptions, SnapshotOutcome, Target};
use crate::progress::{ProgressEventKind, ProgressSender};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NavWait, SessionProfile};
use crate::setup;
use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Args)]
pub struct CaptureArgs {
    /// URLs to capture
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Read additional URLs from a free-text file (pasted notes, chat logs)
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output path (default: <name>.pdf for one URL, pagesnap_<timestamp>.zip for a batch)
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Expansion rules file (JSON: keywords, bare_symbols, max_affordance_len)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Maximum scroll cycles per page
    #[arg(long, default_value = "20")]
    pub max_iterations: u32,

    /// Settle wait after each scroll, in milliseconds
    #[arg(long, default_value = "2500")]
    pub settle_ms: u64,

    /// Extra wait before a confirming height read, in milliseconds
    #[arg(long, default_value = "2000")]
    pub confirm_ms: u64,

    /// Consecutive equal height readings required to declare convergence
    #[arg(long, default_value = "2")]
    pub confirmations: u32,

    /// Hard navigation timeout per target, in milliseconds
    #[arg(long, default_value = "60000")]
    pub nav_timeout_ms: u64,

    /// Wait for the full load event instead of returning at initial navigation
    #[arg(long)]
    pub full_load: bool,

    /// Override the user-agent string presented to target sites
    #[arg(long)]
    pub user_agent: Option<String>,
}

/// Run the capture command.
pub async fn run(args: CaptureArgs) -> Result<()> {
    let addresses = collect_addresses(&args)?;
    if addresses.is_empty() {
        bail!("no URLs to capture (pass URLs as arguments or via --input FILE)");
    }

    setup::ensure_ready()?;
    let options = build_options(&args)?;
    let targets = Target::enumerate(&addresses);
    let total = targets.len();

    // The only fatal failure: the engine cannot be instantiated at all.
    let renderer = ChromiumRenderer::new()
        .await
        .context("failed to start the browser engine")?;

    let progress = ProgressSender::new();
    let bar_task = spawn_progress_bar(&progress, total);

    let (report, archive_path) = if total == 1 {
        let report = pipeline::run(&renderer, targets, &options, None, &progress).await?;
        (report, None)
    } else {
        let path = args
            .out
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_archive_name()));
        let mut archive = SnapshotArchive::create(&path)?;
        let report =
            pipeline::run(&renderer, targets, &options, Some(&mut archive), &progress).await?;
        (report, Some(archive.finish()?))
    };
    let _ = bar_task.await;
    log_run(progress.run_id(), &report);

    match archive_path {
        Some(path) => finish_batch(&report, &path),
        None => finish_single(&args, &report),
    }
}

/// Merge positional URLs and `--input` extractions, order-preserving and
/// de-duplicated. Positional URLs must parse; extracted ones are already
/// filtered.
fn collect_addresses(args: &CaptureArgs) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut addresses = Vec::new();

    for u in &args.urls {
        url::Url::parse(u).with_context(|| format!("invalid URL: {u}"))?;
        if seen.insert(u.clone()) {
            addresses.push(u.clone());
        }
    }

    if let Some(path) = &args.input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for u in extract::extract_urls(&text) {
            if seen.insert(u.clone()) {
                addresses.push(u);
            }
        }
    }

    Ok(addresses)
}

fn build_options(args: &CaptureArgs) -> Result<CaptureOptions> {
    let rule = match &args.rules {
        Some(path) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read rules file {}", path.display()))?;
            serde_json::from_str::<ExpansionRule>(&body)
                .with_context(|| format!("invalid rules file {}", path.display()))?
        }
        None => ExpansionRule::default(),
    };

    let mut profile = SessionProfile::default();
    if let Some(ua) = &args.user_agent {
        profile.user_agent = ua.clone();
    }
    if args.full_load {
        profile.nav_wait = NavWait::FullLoad;
    }

    Ok(CaptureOptions {
        profile,
        rule,
        tuning: ExpandTuning {
            max_iterations: args.max_iterations,
            settle_delay: Duration::from_millis(args.settle_ms),
            confirm_delay: Duration::from_millis(args.confirm_ms),
            no_change_threshold: args.confirmations,
        },
        nav_timeout_ms: args.nav_timeout_ms,
    })
}

/// Single-target mode: the one payload goes straight to a file; failure
/// surfaces directly and produces no output.
fn finish_single(args: &CaptureArgs, report: &BatchReport) -> Result<()> {
    let outcome = report
        .outcomes
        .first()
        .context("pipeline returned an empty report")?;
    match outcome {
        SnapshotOutcome::Success { target, payload } => {
            let out = args
                .out
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{}.pdf", filename::sanitize(&target.address))));
            std::fs::write(&out, payload)
                .with_context(|| format!("failed to write {}", out.display()))?;
            if !output::is_quiet() {
                println!("  Captured {} -> {}", target.address, out.display());
            }
            Ok(())
        }
        SnapshotOutcome::Failure { target, reason } => {
            bail!("capture of {} failed: {reason}", target.address)
        }
    }
}

/// Batch mode always completes with a summary, even under partial failure.
fn finish_batch(report: &BatchReport, archive_path: &std::path::Path) -> Result<()> {
    if !output::is_quiet() {
        println!();
        for outcome in &report.outcomes {
            match outcome {
                SnapshotOutcome::Success { target, .. } => {
                    println!("  [OK] {:02} {}", target.ordinal, target.address);
                }
                SnapshotOutcome::Failure { target, reason } => {
                    println!("  [!!] {:02} {}: {reason}", target.ordinal, target.address);
                }
            }
        }
        println!();
        println!(
            "  {} captured, {} failed",
            report.success_count(),
            report.failure_count()
        );
        println!("  Archive: {}", archive_path.display());
    }
    Ok(())
}

fn default_archive_name() -> String {
    format!(
        "pagesnap_{}.zip",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

fn spawn_progress_bar(progress: &ProgressSender, total: usize) -> tokio::task::JoinHandle<()> {
    let mut rx = progress.subscribe();
    let bar = if output::is_quiet() {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("  [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar
    };
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.event {
                ProgressEventKind::TargetStarted { url, .. } => bar.set_message(url),
                ProgressEventKind::TargetFinished { .. } => bar.inc(1),
                ProgressEventKind::RunFinished { .. } => {
                    bar.finish_and_clear();
                    break;
                }
                _ => {}
            }
        }
    })
}

/// Append every outcome to the JSONL run log; log failures are non-fatal.
fn log_run(run_id: &str, report: &BatchReport) {
    let mut logger = match RunLogger::default_logger() {
        Ok(l) => l,
        Err(e) => {
            warn!("run log unavailable: {e:#}");
            return;
        }
    };
    for outcome in &report.outcomes {
        let result = match outcome {
            SnapshotOutcome::Success { target, payload } => logger.log_outcome(
                run_id,
                &target.address,
                target.ordinal,
                "success",
                None,
                Some(payload.len()),
            ),
            SnapshotOutcome::Failure { target, reason } => {
                let reason = reason.to_string();
                logger.log_outcome(
                    run_id,
                    &target.address,
                    target.ordinal,
                    "failure",
                    Some(reason.as_str()),
                    None,
                )
            }
        };
        if let Err(e) = result {
            warn!("failed to append run log record: {e:#}");
        }
    }
}
