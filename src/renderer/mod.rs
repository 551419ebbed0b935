//! Renderer abstraction for browser-based page capture.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). One engine
//! instance is shared across a whole batch run; each target gets its own
//! short-lived context that is closed before the next target is opened.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-context session settings applied when a context is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProfile {
    /// Viewport size as (width, height) in CSS pixels.
    pub viewport: (u32, u32),
    /// User-agent string presented to the target site.
    pub user_agent: String,
    /// How long to wait for navigation before giving up.
    pub nav_wait: NavWait,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            viewport: (1280, 1024),
            user_agent: concat!(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ",
                "(KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
            )
            .to_string(),
            nav_wait: NavWait::InitialOnly,
        }
    }
}

/// Navigation wait strategy.
///
/// Ad-library style feeds run background trackers that never go idle, so
/// waiting for network quiescence stalls every navigation until timeout.
/// `InitialOnly` returns as soon as the initial document is constructed and
/// lets the discovery loop's own settle waits absorb late content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavWait {
    /// Return once the initial navigation resolves (default).
    InitialOnly,
    /// Additionally await the load event, still inside the same timeout.
    FullLoad,
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create capture contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab) configured from `profile`.
    async fn new_context(&self, profile: &SessionProfile) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) holding one live page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a hard timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Switch the page's emulated media type (e.g. "print").
    async fn emulate_media(&self, media: &str) -> Result<()>;
    /// Print the current document to paginated PDF bytes.
    async fn print_to_pdf(&self) -> Result<Vec<u8>>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
