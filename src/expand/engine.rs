//! The scroll/click convergence loop.
//!
//! Drives one live page through repeated scroll-to-bottom and
//! expand-affordance-click cycles until the document height stabilizes or
//! the iteration budget runs out. Height-based convergence is the only
//! generic stopping signal available on third-party, uninstrumented pages;
//! a single no-change reading is ambiguous between "fully loaded" and
//! "still fetching", so convergence requires a confirmed streak with an
//! extra wait before each confirming read.

use crate::expand::rule::{is_expandable, ExpansionRule};
use crate::renderer::RenderContext;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Script returning the total scrollable document height.
pub const HEIGHT_SCRIPT: &str = "document.body.scrollHeight";

/// Script scrolling the viewport to the current document bottom.
pub const SCROLL_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Script scrolling the viewport back to the document top.
pub const SCROLL_TOP_SCRIPT: &str = "window.scrollTo(0, 0)";

/// Marker attribute used to address candidates and skip repeat clicks.
pub const INDEX_ATTR: &str = "data-pagesnap-i";

const CLICKED_ATTR: &str = "data-pagesnap-clicked";

/// Pause after scrolling back to the top, so rendering starts from a
/// settled viewport.
const TOP_SETTLE: Duration = Duration::from_millis(1000);

/// Tuning knobs for one discovery run.
#[derive(Debug, Clone)]
pub struct ExpandTuning {
    /// Upper bound on scroll cycles; the loop's only cancellation mechanism.
    pub max_iterations: u32,
    /// Fixed wait after each scroll for async content to attach. A fixed
    /// wait, not an event wait: the loading-complete signal is not reliably
    /// observable on these targets.
    pub settle_delay: Duration,
    /// Extra wait before a confirming height read, to tell slow network
    /// from true end-of-content.
    pub confirm_delay: Duration,
    /// Consecutive equal height readings required to declare convergence.
    pub no_change_threshold: u32,
}

impl Default for ExpandTuning {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            settle_delay: Duration::from_millis(2500),
            confirm_delay: Duration::from_millis(2000),
            no_change_threshold: 2,
        }
    }
}

/// What one discovery run did; consumed by logging and progress events only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandStats {
    /// Scroll cycles executed.
    pub iterations: u32,
    /// Affordances clicked across all passes.
    pub clicks: u64,
    /// Whether the height stabilized before the iteration budget ran out.
    pub converged: bool,
}

/// Per-run scroll bookkeeping, discarded after convergence or budget
/// exhaustion.
struct ScrollState {
    prior_height: i64,
    no_change_streak: u32,
    iteration: u32,
}

/// One clickable-shaped element reported by the scan script.
#[derive(Debug, Deserialize)]
struct Candidate {
    i: u64,
    text: String,
    visible: bool,
    clicked: bool,
}

#[derive(Debug, thiserror::Error)]
enum InteractionError {
    #[error("element detached")]
    Detached,
    #[error("click rejected: {0}")]
    Click(String),
    #[error("evaluation failed: {0}")]
    Evaluate(String),
}

/// Expand the current page until its height stabilizes.
///
/// Mutates the live document in place. Post-conditions: every reachable
/// expand affordance has been clicked at least once, the document height
/// has been confirmed stable (or the iteration budget is spent), and the
/// viewport is back at the top of the page.
///
/// Per-element and per-pass failures are logged and skipped; only
/// session-level failures (the page itself is gone) propagate.
pub async fn expand(
    ctx: &dyn RenderContext,
    rule: &ExpansionRule,
    tuning: &ExpandTuning,
) -> Result<ExpandStats> {
    // Pre-pass: content above the fold may already be truncated.
    let mut clicks = click_pass(ctx, rule).await;

    let mut state = ScrollState {
        prior_height: read_height(ctx).await?,
        no_change_streak: 0,
        iteration: 0,
    };
    let mut converged = false;

    while state.iteration < tuning.max_iterations {
        state.iteration += 1;

        ctx.execute_js(SCROLL_BOTTOM_SCRIPT)
            .await
            .context("scroll to bottom failed")?;
        tokio::time::sleep(tuning.settle_delay).await;

        // Newly attached content may carry its own affordances.
        clicks += click_pass(ctx, rule).await;

        let new_height = read_height(ctx).await?;
        if new_height != state.prior_height {
            state.no_change_streak = 0;
            state.prior_height = new_height;
            debug!(
                iteration = state.iteration,
                height = new_height,
                "document grew"
            );
            continue;
        }

        state.no_change_streak += 1;
        while state.no_change_streak < tuning.no_change_threshold {
            tokio::time::sleep(tuning.confirm_delay).await;
            let confirm = read_height(ctx).await?;
            if confirm == state.prior_height {
                state.no_change_streak += 1;
            } else {
                state.prior_height = confirm;
                state.no_change_streak = 0;
                break;
            }
        }
        if state.no_change_streak >= tuning.no_change_threshold {
            converged = true;
            break;
        }
    }

    // Rendering must start at the canonical top of the page regardless of
    // where expansion left the viewport.
    ctx.execute_js(SCROLL_TOP_SCRIPT)
        .await
        .context("scroll to top failed")?;
    tokio::time::sleep(TOP_SETTLE).await;

    Ok(ExpandStats {
        iterations: state.iteration,
        clicks,
        converged,
    })
}

/// Scan the page for clickable-shaped elements and click every visible,
/// not-yet-clicked affordance. Failures here are expected (elements detach,
/// animations interrupt clicks) and never abort the pass.
async fn click_pass(ctx: &dyn RenderContext, rule: &ExpansionRule) -> u64 {
    let candidates = match scan_candidates(ctx, rule).await {
        Ok(c) => c,
        Err(e) => {
            warn!("candidate scan failed, skipping pass: {e}");
            return 0;
        }
    };

    let mut clicks = 0;
    for cand in candidates {
        if cand.clicked || !cand.visible || !is_expandable(&cand.text, rule) {
            continue;
        }
        match click_candidate(ctx, cand.i).await {
            Ok(()) => {
                clicks += 1;
                debug!(index = cand.i, text = %cand.text, "clicked affordance");
            }
            Err(e) => debug!(index = cand.i, "skipping element: {e}"),
        }
    }
    clicks
}

async fn scan_candidates(
    ctx: &dyn RenderContext,
    rule: &ExpansionRule,
) -> Result<Vec<Candidate>, InteractionError> {
    let value = ctx
        .execute_js(&scan_script(rule))
        .await
        .map_err(|e| InteractionError::Evaluate(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| InteractionError::Evaluate(e.to_string()))
}

async fn click_candidate(ctx: &dyn RenderContext, index: u64) -> Result<(), InteractionError> {
    let value = ctx
        .execute_js(&click_script(index))
        .await
        .map_err(|e| InteractionError::Evaluate(e.to_string()))?;
    match value.as_str() {
        Some("clicked") => Ok(()),
        Some("detached") => Err(InteractionError::Detached),
        Some(other) => Err(InteractionError::Click(other.to_string())),
        None => Err(InteractionError::Click(value.to_string())),
    }
}

async fn read_height(ctx: &dyn RenderContext) -> Result<i64> {
    let value = ctx
        .execute_js(HEIGHT_SCRIPT)
        .await
        .context("height read failed")?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .with_context(|| format!("non-numeric document height: {value}"))
}

/// Build the scan script. Candidate text is truncated at one past the
/// affordance length cap: enough to classify over-length text correctly
/// without shipping whole article bodies back over CDP. Truncation cannot
/// forge a bare-symbol exact match because the symbols are shorter than
/// the truncation bound.
fn scan_script(rule: &ExpansionRule) -> String {
    let limit = rule.max_affordance_len + 1;
    format!(
        r#"(() => {{
    const els = Array.from(document.querySelectorAll(
        'div[role="button"], span, a, button, div'));
    return els.map((el, i) => {{
        el.setAttribute('{INDEX_ATTR}', String(i));
        const rect = el.getBoundingClientRect();
        const text = el.innerText ? el.innerText.trim() : '';
        return {{
            i: i,
            text: text.slice(0, {limit}),
            visible: rect.width > 0 && rect.height > 0,
            clicked: el.hasAttribute('{CLICKED_ATTR}')
        }};
    }});
}})()"#
    )
}

fn click_script(index: u64) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector('[{INDEX_ATTR}="{index}"]');
    if (!el) return 'detached';
    try {{
        el.click();
        el.setAttribute('{CLICKED_ATTR}', '1');
        return 'clicked';
    }} catch (e) {{
        return 'click threw: ' + e;
    }}
}})()"#
    )
}
