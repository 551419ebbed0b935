//! Batch pipeline integration tests against a scripted mock renderer.
//!
//! The mock navigates successfully unless the target address says
//! otherwise, serves a constant document height so expansion converges
//! immediately, and renders the address back as the PDF payload.

use async_trait::async_trait;
use pagesnap::expand::engine::{HEIGHT_SCRIPT, SCROLL_BOTTOM_SCRIPT, SCROLL_TOP_SCRIPT};
use pagesnap::expand::ExpandTuning;
use pagesnap::pipeline::archive::SnapshotArchive;
use pagesnap::pipeline::{self, CaptureOptions, SnapshotOutcome, Target};
use pagesnap::progress::{ProgressEventKind, ProgressSender};
use pagesnap::renderer::{NavigationResult, RenderContext, Renderer, SessionProfile};
use serde_json::{json, Value};
use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct MockRenderer {
    active: Arc<AtomicUsize>,
}

impl MockRenderer {
    fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn new_context(&self, _profile: &SessionProfile) -> anyhow::Result<Box<dyn RenderContext>> {
        self.active.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MockContext {
            url: String::new(),
            active: Arc::clone(&self.active),
        }))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

struct MockContext {
    url: String,
    active: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for MockContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> anyhow::Result<NavigationResult> {
        if url.contains("times-out") {
            anyhow::bail!("navigation timed out after {timeout_ms}ms");
        }
        if url.contains("unresolvable") {
            anyhow::bail!("navigation failed: net::ERR_NAME_NOT_RESOLVED");
        }
        self.url = url.to_string();
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn execute_js(&self, script: &str) -> anyhow::Result<Value> {
        if script == HEIGHT_SCRIPT {
            return Ok(json!(1000));
        }
        if script == SCROLL_BOTTOM_SCRIPT || script == SCROLL_TOP_SCRIPT {
            return Ok(Value::Null);
        }
        // Candidate scans: nothing to click.
        Ok(json!([]))
    }

    async fn emulate_media(&self, _media: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn print_to_pdf(&self) -> anyhow::Result<Vec<u8>> {
        Ok(format!("%PDF-{}", self.url).into_bytes())
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.active.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}

fn fast_options() -> CaptureOptions {
    CaptureOptions {
        tuning: ExpandTuning {
            max_iterations: 2,
            settle_delay: Duration::ZERO,
            confirm_delay: Duration::ZERO,
            no_change_threshold: 2,
        },
        ..CaptureOptions::default()
    }
}

fn targets(addresses: &[&str]) -> Vec<Target> {
    Target::enumerate(&addresses.iter().map(|s| s.to_string()).collect::<Vec<_>>())
}

#[tokio::test]
async fn one_failure_does_not_affect_other_targets() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("run.zip");
    let mut archive = SnapshotArchive::create(&archive_path).unwrap();

    let renderer = MockRenderer::new();
    let progress = ProgressSender::new();
    let report = pipeline::run(
        &renderer,
        targets(&["https://good.test", "https://times-out.test", "https://good2.test"]),
        &fast_options(),
        Some(&mut archive),
        &progress,
    )
    .await
    .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failure_count(), 1);

    // Outcome order matches input order, ordinals match positions.
    for (i, outcome) in report.outcomes.iter().enumerate() {
        assert_eq!(outcome.target().ordinal, i + 1);
    }
    assert!(report.outcomes[0].is_success());
    assert!(!report.outcomes[1].is_success());
    assert!(report.outcomes[2].is_success());

    // Archive holds exactly the two successes, ordinal-prefixed.
    assert_eq!(
        archive.entries(),
        &["01_good_test.pdf".to_string(), "03_good2_test.pdf".to_string()]
    );
    let path = archive.finish().unwrap();
    let zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    assert_eq!(zip.len(), 2);

    // Every context was released, success or failure.
    assert_eq!(renderer.active_contexts(), 0);
}

#[tokio::test]
async fn all_failures_still_produce_a_complete_report() {
    let renderer = MockRenderer::new();
    let progress = ProgressSender::new();
    let report = pipeline::run(
        &renderer,
        targets(&["https://times-out.a", "https://unresolvable.b"]),
        &fast_options(),
        None,
        &progress,
    )
    .await
    .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.success_count(), 0);
    let reasons: Vec<String> = report
        .outcomes
        .iter()
        .map(|o| match o {
            SnapshotOutcome::Failure { reason, .. } => reason.to_string(),
            SnapshotOutcome::Success { .. } => panic!("unexpected success"),
        })
        .collect();
    assert!(reasons[0].contains("timed out"));
    assert!(reasons[1].contains("ERR_NAME_NOT_RESOLVED"));
    assert_eq!(renderer.active_contexts(), 0);
}

#[tokio::test]
async fn single_target_mode_returns_the_payload_directly() {
    let renderer = MockRenderer::new();
    let progress = ProgressSender::new();
    let report = pipeline::run(
        &renderer,
        targets(&["https://solo.test"]),
        &fast_options(),
        None,
        &progress,
    )
    .await
    .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    match &report.outcomes[0] {
        SnapshotOutcome::Success { target, payload } => {
            assert_eq!(target.ordinal, 1);
            assert_eq!(payload, b"%PDF-https://solo.test");
        }
        SnapshotOutcome::Failure { reason, .. } => panic!("unexpected failure: {reason}"),
    }
}

#[tokio::test]
async fn duplicate_addresses_get_unique_archive_entries() {
    // De-duplication happens upstream; this guards the naming scheme if it
    // ever doesn't.
    let dir = tempfile::tempdir().unwrap();
    let mut archive = SnapshotArchive::create(&dir.path().join("dup.zip")).unwrap();

    let renderer = MockRenderer::new();
    let progress = ProgressSender::new();
    let report = pipeline::run(
        &renderer,
        targets(&["https://a.example/x", "https://a.example/x"]),
        &fast_options(),
        Some(&mut archive),
        &progress,
    )
    .await
    .unwrap();

    assert_eq!(report.success_count(), 2);
    let entries = archive.entries().to_vec();
    assert_eq!(entries.len(), 2);
    assert_ne!(entries[0], entries[1]);
    assert!(entries[0].starts_with("01_"));
    assert!(entries[1].starts_with("02_"));
    archive.finish().unwrap();
}

/// Renderer whose engine teardown always fails.
struct BrokenShutdownRenderer {
    inner: MockRenderer,
}

#[async_trait]
impl Renderer for BrokenShutdownRenderer {
    async fn new_context(&self, profile: &SessionProfile) -> anyhow::Result<Box<dyn RenderContext>> {
        self.inner.new_context(profile).await
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        anyhow::bail!("browser process already exited")
    }

    fn active_contexts(&self) -> usize {
        self.inner.active_contexts()
    }
}

#[tokio::test]
async fn shutdown_failure_does_not_discard_the_report() {
    let renderer = BrokenShutdownRenderer {
        inner: MockRenderer::new(),
    };
    let progress = ProgressSender::new();
    let mut rx = progress.subscribe();

    let report = pipeline::run(
        &renderer,
        targets(&["https://a.test", "https://b.test"]),
        &fast_options(),
        None,
        &progress,
    )
    .await
    .expect("a post-run shutdown failure must not abort the run");

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.success_count(), 2);

    // The run summary event is still emitted.
    let mut saw_finished = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(
            event.event,
            ProgressEventKind::RunFinished {
                succeeded: 2,
                failed: 0,
                ..
            }
        ) {
            saw_finished = true;
        }
    }
    assert!(saw_finished);
}

#[tokio::test]
async fn progress_events_cover_the_whole_run() {
    let renderer = MockRenderer::new();
    let progress = ProgressSender::new();
    let mut rx = progress.subscribe();

    pipeline::run(
        &renderer,
        targets(&["https://a.test", "https://times-out.b"]),
        &fast_options(),
        None,
        &progress,
    )
    .await
    .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.event);
    }
    assert!(matches!(kinds[0], ProgressEventKind::RunStarted { total: 2 }));
    assert!(matches!(
        kinds.last(),
        Some(ProgressEventKind::RunFinished {
            succeeded: 1,
            failed: 1,
            ..
        })
    ));
    let finished: Vec<_> = kinds
        .iter()
        .filter(|k| matches!(k, ProgressEventKind::TargetFinished { .. }))
        .collect();
    assert_eq!(finished.len(), 2);
}
