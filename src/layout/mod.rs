//! # Measure-and-Nudge Layout
//!
//! Nothing in this crate lays text out from scratch. A [`LayoutHost`] does
//! that (a browser, a GUI toolkit, the [`simulated`] reference host) and the
//! fitting passes here only ask it questions and apply small adjustments:
//!
//! 1. [`tighten`]: shrink scale, letter-spacing or word-spacing by the least
//!    amount that removes an avoidable wrap or overflow
//! 2. [`widows`]: swap trailing spaces for non-breaking ones until the last
//!    line is wide enough
//!
//! Both passes start by undoing their own previous adjustments, so every
//! measurement reflects the unmodified source.

pub mod simulated;
pub mod tighten;
pub mod widows;

use crate::geometry::{group_lines, Extents, Line, LineRect};
use crate::style::FitParameter;
use crate::text::TextRun;

/// The rendering collaborator the fitting passes drive.
///
/// A host owns the styled container a [`TextRun`] is rendered into. Nothing
/// else may mutate that container while a pass is running.
pub trait LayoutHost {
    /// Line-box fragments for `run`, in visual order (top to bottom, left to
    /// right), in the container's coordinate space.
    fn measure_lines(&mut self, run: &TextRun) -> Vec<LineRect>;

    /// Client and scroll extents of the container along the inline axis.
    fn measure_extents(&mut self, run: &TextRun) -> Extents;

    /// Apply a parameter value, or remove it with `None`.
    fn apply_param(&mut self, param: FitParameter, value: Option<f64>);

    /// The element's own computed value for `param` before any adjustment,
    /// in `em` for spacings. `0` when the computed style is `normal`.
    fn baseline(&self, param: FitParameter) -> f64;

    /// Width of an off-flow block laid out at 100% of the container.
    fn container_width(&mut self) -> f64;
}

/// Lines and overflow of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitMetrics {
    pub line_count: usize,
    pub overflow: f64,
}

impl FitMetrics {
    /// Whether `self` is no worse than `target` on both axes.
    pub fn satisfies(&self, target: &FitMetrics) -> bool {
        self.line_count <= target.line_count && self.overflow <= target.overflow
    }
}

/// Measure and group the current lines of `run`.
pub fn measure_lines<H: LayoutHost + ?Sized>(host: &mut H, run: &TextRun) -> Vec<Line> {
    group_lines(&host.measure_lines(run))
}

/// Line count and overflow of `run` in its current state.
pub fn measure_fit<H: LayoutHost + ?Sized>(host: &mut H, run: &TextRun) -> FitMetrics {
    FitMetrics {
        line_count: measure_lines(host, run).len(),
        overflow: host.measure_extents(run).overflow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_requires_both_axes() {
        let target = FitMetrics {
            line_count: 1,
            overflow: 0.0,
        };
        assert!(FitMetrics { line_count: 1, overflow: 0.0 }.satisfies(&target));
        assert!(!FitMetrics { line_count: 2, overflow: 0.0 }.satisfies(&target));
        assert!(!FitMetrics { line_count: 1, overflow: 0.5 }.satisfies(&target));
    }
}
