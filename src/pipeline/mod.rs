//! Batch snapshot pipeline.
//!
//! Sequences targets strictly in input order, gives each one a fresh
//! browser context, contains every per-target failure, and aggregates an
//! order-preserving [`BatchReport`]. The defining guarantee: no single
//! target's failure can prevent any other target from being attempted or
//! abort the run. Only engine instantiation (before the first target) is
//! fatal.

pub mod archive;
pub mod filename;

use crate::expand::{self, ExpandTuning, ExpansionRule};
use crate::pipeline::archive::SnapshotArchive;
use crate::progress::{ProgressEventKind, ProgressSender};
use crate::renderer::{RenderContext, Renderer, SessionProfile};
use anyhow::Result;
use std::time::Instant;
use tracing::{info, warn};

/// One URL to capture, with its 1-based position in the batch.
///
/// Immutable once enqueued; the input list is assumed address-unique
/// (order-preserving de-duplication happens upstream in `extract`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: String,
    pub ordinal: usize,
}

impl Target {
    /// Number the addresses in input order, starting at 1.
    pub fn enumerate(addresses: &[String]) -> Vec<Target> {
        addresses
            .iter()
            .enumerate()
            .map(|(i, address)| Target {
                address: address.clone(),
                ordinal: i + 1,
            })
            .collect()
    }
}

/// Why a single target failed. Everything here is recoverable at the batch
/// level; the run continues past it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FailureReason {
    #[error("session setup failed: {0}")]
    Session(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("content expansion failed: {0}")]
    Expansion(String),
    #[error("rendering failed: {0}")]
    Render(String),
    #[error("archive write failed: {0}")]
    Archive(String),
}

/// The result of one target, created exactly once by the pipeline.
#[derive(Debug, Clone)]
pub enum SnapshotOutcome {
    Success { target: Target, payload: Vec<u8> },
    Failure { target: Target, reason: FailureReason },
}

impl SnapshotOutcome {
    pub fn target(&self) -> &Target {
        match self {
            SnapshotOutcome::Success { target, .. } => target,
            SnapshotOutcome::Failure { target, .. } => target,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SnapshotOutcome::Success { .. })
    }
}

/// Order-preserving record of every target's outcome for one run.
///
/// Counts are derived from `outcomes` on demand so they can never desync.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SnapshotOutcome>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Tuning for one capture run.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub profile: SessionProfile,
    pub rule: ExpansionRule,
    pub tuning: ExpandTuning,
    /// Hard per-target navigation timeout; expiry becomes a `Failure`
    /// outcome, never a fatal error.
    pub nav_timeout_ms: u64,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            profile: SessionProfile::default(),
            rule: ExpansionRule::default(),
            tuning: ExpandTuning::default(),
            nav_timeout_ms: 60_000,
        }
    }
}

/// Process `targets` in order against one shared engine instance.
///
/// In batch mode (`archive` is `Some`) every successful payload is also
/// appended to the archive under its deterministic entry name; callers
/// finalize the archive after inspecting the report. Single-target mode is
/// the N=1 case with no archive.
pub async fn run(
    renderer: &dyn Renderer,
    targets: Vec<Target>,
    options: &CaptureOptions,
    mut archive: Option<&mut SnapshotArchive>,
    progress: &ProgressSender,
) -> Result<BatchReport> {
    let total = targets.len();
    let run_started = Instant::now();
    progress.emit(ProgressEventKind::RunStarted { total });

    let mut report = BatchReport::default();
    for target in targets {
        progress.emit(ProgressEventKind::TargetStarted {
            ordinal: target.ordinal,
            total,
            url: target.address.clone(),
        });
        let started = Instant::now();

        let outcome = match capture_one(renderer, &target, options).await {
            Ok(payload) => {
                let archived = match archive.as_deref_mut() {
                    Some(archive) => {
                        let name = filename::entry_name(&target.address, target.ordinal);
                        archive
                            .add_entry(&name, &payload)
                            .map_err(|e| FailureReason::Archive(format!("{e:#}")))
                    }
                    None => Ok(()),
                };
                match archived {
                    Ok(()) => SnapshotOutcome::Success { target, payload },
                    Err(reason) => SnapshotOutcome::Failure { target, reason },
                }
            }
            Err(reason) => SnapshotOutcome::Failure { target, reason },
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            SnapshotOutcome::Success { target, payload } => {
                info!(
                    ordinal = target.ordinal,
                    url = %target.address,
                    bytes = payload.len(),
                    elapsed_ms,
                    "target captured"
                );
            }
            SnapshotOutcome::Failure { target, reason } => {
                warn!(
                    ordinal = target.ordinal,
                    url = %target.address,
                    elapsed_ms,
                    "target failed: {reason}"
                );
            }
        }
        progress.emit(ProgressEventKind::TargetFinished {
            ordinal: outcome.target().ordinal,
            total,
            url: outcome.target().address.clone(),
            success: outcome.is_success(),
            reason: match &outcome {
                SnapshotOutcome::Failure { reason, .. } => Some(reason.to_string()),
                SnapshotOutcome::Success { .. } => None,
            },
            elapsed_ms,
        });
        report.outcomes.push(outcome);
    }

    progress.emit(ProgressEventKind::RunFinished {
        succeeded: report.success_count(),
        failed: report.failure_count(),
        elapsed_ms: run_started.elapsed().as_millis() as u64,
    });

    // Every target has its outcome by now; a shutdown failure is not
    // allowed to take the report down with it.
    if let Err(e) = renderer.shutdown().await {
        warn!("engine shutdown failed: {e:#}");
    }
    Ok(report)
}

/// Capture one target in a fresh context. The context is closed on every
/// exit path, so a failed target cannot leak page state into the next one.
async fn capture_one(
    renderer: &dyn Renderer,
    target: &Target,
    options: &CaptureOptions,
) -> Result<Vec<u8>, FailureReason> {
    let mut ctx = renderer
        .new_context(&options.profile)
        .await
        .map_err(|e| FailureReason::Session(format!("{e:#}")))?;

    let result = drive(ctx.as_mut(), target, options).await;

    if let Err(e) = ctx.close().await {
        warn!(url = %target.address, "failed to close context: {e:#}");
    }
    result
}

async fn drive(
    ctx: &mut dyn RenderContext,
    target: &Target,
    options: &CaptureOptions,
) -> Result<Vec<u8>, FailureReason> {
    let nav = ctx
        .navigate(&target.address, options.nav_timeout_ms)
        .await
        .map_err(|e| FailureReason::Navigation(format!("{e:#}")))?;
    info!(
        url = %target.address,
        final_url = %nav.final_url,
        load_time_ms = nav.load_time_ms,
        "navigated"
    );

    ctx.emulate_media("print")
        .await
        .map_err(|e| FailureReason::Render(format!("{e:#}")))?;

    let stats = expand::expand(&*ctx, &options.rule, &options.tuning)
        .await
        .map_err(|e| FailureReason::Expansion(format!("{e:#}")))?;
    info!(
        url = %target.address,
        iterations = stats.iterations,
        clicks = stats.clicks,
        converged = stats.converged,
        "expansion finished"
    );

    ctx.print_to_pdf()
        .await
        .map_err(|e| FailureReason::Render(format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(address: &str, ordinal: usize) -> Target {
        Target {
            address: address.to_string(),
            ordinal,
        }
    }

    #[test]
    fn enumerate_assigns_one_based_ordinals() {
        let targets = Target::enumerate(&[
            "https://a.test".to_string(),
            "https://b.test".to_string(),
        ]);
        assert_eq!(targets[0].ordinal, 1);
        assert_eq!(targets[1].ordinal, 2);
    }

    #[test]
    fn report_counts_are_derived() {
        let mut report = BatchReport::default();
        report.outcomes.push(SnapshotOutcome::Success {
            target: target("https://a.test", 1),
            payload: vec![1],
        });
        report.outcomes.push(SnapshotOutcome::Failure {
            target: target("https://b.test", 2),
            reason: FailureReason::Navigation("timed out".into()),
        });
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
    }

    #[test]
    fn failure_reasons_render_their_category() {
        let reason = FailureReason::Navigation("navigation timed out after 60000ms".into());
        assert!(reason.to_string().starts_with("navigation failed"));
    }
}
