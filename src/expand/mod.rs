//! Adaptive content discovery — the scroll/click convergence loop.
//!
//! Infinite-scroll feeds load content in JS-controlled bursts and truncate
//! long posts behind "see more" affordances. `engine::expand` drives a live
//! page through repeated scroll-and-click cycles until the document height
//! stops growing, using `rule::is_expandable` to decide which elements are
//! truncation affordances and which are ordinary body text.

pub mod engine;
pub mod rule;

pub use engine::{expand, ExpandStats, ExpandTuning};
pub use rule::{is_expandable, ExpansionRule};
