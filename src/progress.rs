// Copyright 2026 Pagesnap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for batch-run telemetry.
//!
//! The pipeline emits [`ProgressEvent`]s while it works; they flow through a
//! `tokio::sync::broadcast` channel to any subscriber (CLI progress bar,
//! tests). When no subscriber exists, events are silently dropped.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A progress event emitted during a capture run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run ID this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// A batch run has started.
    RunStarted { total: usize },
    /// Navigation to a target has begun.
    TargetStarted {
        ordinal: usize,
        total: usize,
        url: String,
    },
    /// A target finished, successfully or not.
    TargetFinished {
        ordinal: usize,
        total: usize,
        url: String,
        success: bool,
        reason: Option<String>,
        elapsed_ms: u64,
    },
    /// The whole run completed.
    RunFinished {
        succeeded: usize,
        failed: usize,
        elapsed_ms: u64,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Emitter side of the progress channel, tagged with a run ID.
#[derive(Clone)]
pub struct ProgressSender {
    run_id: String,
    seq: Arc<AtomicU64>,
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressSender {
    /// Create a sender with a fresh v4 run ID.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            seq: Arc::new(AtomicU64::new(0)),
            tx,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Send errors mean "no subscriber" and are ignored.
    pub fn emit(&self, event: ProgressEventKind) {
        let _ = self.tx.send(ProgressEvent {
            run_id: self.run_id.clone(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            event,
        });
    }
}

impl Default for ProgressSender {
    fn default() -> Self {
        Self::new()
    }
}
