//! # Typesetting
//!
//! Measure-and-nudge text fitting.
//!
//! Browsers and GUI toolkits break lines greedily and have no opinion about
//! how the result looks. A heading that misses fitting on one line by three
//! pixels wraps anyway; a paragraph happily ends on a single four-letter word.
//! This crate doesn't lay text out itself. It asks a [`LayoutHost`] how the
//! text came out and nudges it:
//!
//! - **Tightening** shrinks horizontal scale, letter-spacing or word-spacing
//!   by the least amount that removes an avoidable wrap or overflow.
//! - **Widow prevention** swaps the last few spaces for non-breaking ones
//!   until the last line is wide enough.
//!
//! Both are undone and recomputed from scratch on every reflow, so the result
//! only depends on the content and the current geometry.
//!
//! ## Architecture
//!
//! ```text
//! Triggers (mount, content, resize, fonts, key)
//!       ↓
//!   [typesetter]  Coalesces triggers, schedules reflows
//!       ↓
//!   [layout]      Tighten pass, then widow pass, against a LayoutHost
//!       ↓              ↙                ↘
//!   [search]      Bounded binary search    [text]  Reversible splices
//!       ↓
//!   [geometry]    Rects to lines, widths, overflow
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod font;
pub mod geometry;
pub mod layout;
pub mod schedule;
pub mod search;
pub mod style;
pub mod text;
pub mod typesetter;

use std::time::Instant;

pub use config::{FitConfig, PresetRegistry};
pub use document::{Document, FitOutput};
pub use error::FitError;
pub use layout::LayoutHost;
pub use text::TextRun;
pub use typesetter::{ReflowCause, ReflowReport, Typesetter};

use font::GlyphMetrics;
use geometry::line_widths;
use layout::simulated::SimulatedLayout;
use schedule::ImmediateScheduler;

/// Fit a document against the simulated layout host.
///
/// `metrics` overrides the uniform advance from the document's container,
/// e.g. with advances parsed from a real font.
pub fn fit(document: Document, metrics: Option<GlyphMetrics>) -> Result<FitOutput, FitError> {
    let config = document.resolve_config()?;
    let mut host = SimulatedLayout::from_style(&document.container);
    if let Some(metrics) = metrics {
        host = host.with_metrics(metrics);
    }
    let run = document.content.into_run();
    let before = line_widths(&layout::measure_lines(&mut host, &run));

    let now = Instant::now();
    let mut typesetter = Typesetter::with_scheduler(host, run, config, ImmediateScheduler::default());
    typesetter.mount(now);
    let report = typesetter.poll(now).transpose()?;

    let (mut host, run) = typesetter.into_parts();
    let after = line_widths(&layout::measure_lines(&mut host, &run));
    Ok(FitOutput {
        before,
        after,
        report,
        applied: host.applied(),
        substitutions: run.substitutions().to_vec(),
        segments: run.segments(),
        text: run.text(),
    })
}

/// Fit a document given as JSON and return the output as pretty JSON.
pub fn fit_json(json: &str, metrics: Option<GlyphMetrics>) -> Result<String, FitError> {
    let document: Document = serde_json::from_str(json)?;
    let output = fit(document, metrics)?;
    Ok(serde_json::to_string_pretty(&output)?)
}
