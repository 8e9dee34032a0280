//! # Widow Prevention
//!
//! A widow here is a last line that is much shorter than the rest. The guard
//! fixes it by turning trailing spaces into non-breaking units, one at a time,
//! re-measuring after each because every removed breakpoint can move every
//! later break.
//!
//! Each pass first undoes the previous pass's substitutions (newest first),
//! so measurements always start from the unmodified source. A pass stops as
//! soon as one of these holds:
//!
//! - fewer than two lines remain
//! - the last line is at least the target width
//! - reaching the target would pull the second-to-last line below the
//!   target itself (which just moves the widow up a line)
//! - no plain space is left to substitute
//! - the substitution cap is reached
//!
//! The target width is resolved once per pass, on the first measurement. A
//! cap of zero stops before that, so the policy is never looked at.

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::{measure_lines, LayoutHost};
use crate::config::WidowOptions;
use crate::error::FitError;
use crate::geometry::line_widths;
use crate::style::{resolve_length_policy, LineWidthContext};
use crate::text::{Substitution, SubstitutionId, TextRun};

/// Why a widow pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WidowStop {
    /// Fewer than two lines.
    SingleLine,
    /// The last line meets the target width.
    WideEnough,
    /// Fixing the last line would leave the line above it too short.
    WouldCreateWidow,
    /// Every space is already substituted.
    NoSpace,
    /// The substitution cap was reached.
    LimitReached,
}

impl fmt::Display for WidowStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            WidowStop::SingleLine => "single line",
            WidowStop::WideEnough => "last line wide enough",
            WidowStop::WouldCreateWidow => "would shorten the previous line below target",
            WidowStop::NoSpace => "no space left to substitute",
            WidowStop::LimitReached => "substitution limit reached",
        };
        f.write_str(reason)
    }
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidowReport {
    pub stop: WidowStop,
    /// Substitutions made by this pass.
    pub substitutions: usize,
    /// Substitutions from the previous pass that were undone first.
    pub undone: usize,
    /// Resolved minimum width of the last line. `None` when the pass never
    /// got far enough to need it.
    pub target_width: Option<f64>,
    /// Line widths at the final measurement.
    pub line_widths: Vec<f64>,
}

/// Runs widow passes and owns the substitutions it makes.
#[derive(Debug, Clone, Default)]
pub struct WidowGuard {
    options: WidowOptions,
    applied: Vec<SubstitutionId>,
}

impl WidowGuard {
    pub fn new(options: WidowOptions) -> Self {
        Self {
            options,
            applied: Vec::new(),
        }
    }

    pub fn options(&self) -> &WidowOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: WidowOptions) {
        self.options = options;
    }

    /// Substitutions currently applied by this guard, oldest first.
    pub fn substitutions(&self) -> &[SubstitutionId] {
        &self.applied
    }

    /// Undo this guard's substitutions, newest first. Returns the removed
    /// records in the order they were undone.
    pub fn undo(&mut self, run: &mut TextRun) -> Vec<Substitution> {
        let mut removed = Vec::with_capacity(self.applied.len());
        for id in self.applied.drain(..).rev() {
            match run.undo(id) {
                Ok(record) => removed.push(record),
                // Content was replaced underneath us; nothing left to undo.
                Err(e) => trace!(error = %e, "substitution already gone"),
            }
        }
        removed
    }

    /// Forget substitutions without touching the run. Used when the run's
    /// content is replaced wholesale.
    pub fn forget(&mut self) {
        self.applied.clear();
    }

    /// Run one pass over `run`.
    ///
    /// On error the run is put back exactly as the previous pass left it.
    pub fn reflow<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        run: &mut TextRun,
    ) -> Result<WidowReport, FitError> {
        let previous = self.undo(run);
        self.reflow_undone(host, run, previous)
    }

    /// Run a pass after the caller already called [`WidowGuard::undo`].
    ///
    /// `previous` are the records `undo` returned; they're re-applied if the
    /// pass fails. Lets a caller measure the unmodified run for other work
    /// before the widow pass starts.
    pub fn reflow_undone<H: LayoutHost + ?Sized>(
        &mut self,
        host: &mut H,
        run: &mut TextRun,
        previous: Vec<Substitution>,
    ) -> Result<WidowReport, FitError> {
        debug!(undone = previous.len(), "undid previous substitutions");

        let mut created = Vec::new();
        match self.fill(host, run, &mut created) {
            Ok(mut report) => {
                report.undone = previous.len();
                debug!(
                    substitutions = created.len(),
                    stop = %report.stop,
                    "widow pass finished"
                );
                self.applied = created;
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "widow pass failed, restoring previous state");
                for id in created.into_iter().rev() {
                    // Made by this pass, so always present.
                    let _ = run.undo(id);
                }
                self.restore(run, previous);
                Err(e)
            }
        }
    }

    /// Re-apply records removed by [`WidowGuard::undo`].
    fn restore(&mut self, run: &mut TextRun, undone: Vec<Substitution>) {
        for record in undone.into_iter().rev() {
            match run.splice(record.span, record.original.len(), record.replacement) {
                Ok(id) => self.applied.push(id),
                Err(e) => warn!(error = %e, "could not restore substitution"),
            }
        }
    }

    fn fill<H: LayoutHost + ?Sized>(
        &self,
        host: &mut H,
        run: &mut TextRun,
        created: &mut Vec<SubstitutionId>,
    ) -> Result<WidowReport, FitError> {
        if self.options.max_substitutions == 0 {
            return Ok(WidowReport {
                stop: WidowStop::LimitReached,
                substitutions: 0,
                undone: 0,
                target_width: None,
                line_widths: line_widths(&measure_lines(host, run)),
            });
        }

        let mut target_width = None;
        let mut widths;
        let stop = loop {
            widths = line_widths(&measure_lines(host, run));
            let &[.., prev, last] = widths.as_slice() else {
                break WidowStop::SingleLine;
            };

            let target = match target_width {
                Some(target) => target,
                None => {
                    let context = LineWidthContext {
                        line_widths: widths.clone(),
                        max_line_width: widths.iter().copied().fold(0.0, f64::max),
                        prev_line_width: prev,
                        last_line_width: last,
                        container_width: host.container_width(),
                    };
                    let target = resolve_length_policy(&self.options.min_line_width, &context)?;
                    trace!(target, "resolved minimum line width");
                    target_width = Some(target);
                    target
                }
            };

            if last >= target {
                break WidowStop::WideEnough;
            }
            if prev - (target - last) < target {
                break WidowStop::WouldCreateWidow;
            }
            if created.len() >= self.options.max_substitutions {
                break WidowStop::LimitReached;
            }
            let Some(span) = run.last_plain_space() else {
                break WidowStop::NoSpace;
            };

            let unit = self.options.replacement.produce()?;
            let id = run.splice(span, 1, unit)?;
            debug!(node = span.node, offset = span.offset, last, target, "substituted space");
            created.push(id);
        };

        Ok(WidowReport {
            stop,
            substitutions: created.len(),
            undone: 0,
            target_width,
            line_widths: widths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::layout::simulated::SimulatedLayout;
    use crate::style::MinLineWidth;
    use crate::text::{InlineElement, Node, Replacement, NBSP};
    use tracing_test::traced_test;

    /// Two full 800px lines of nine 8-letter words, then "whisk" (50px).
    fn widow_text() -> String {
        let line = |c: char| vec![c.to_string().repeat(8); 9].join(" ");
        format!("{} {} whisk", line('a'), line('b'))
    }

    /// 10px per character in an 800px box.
    fn widow_host() -> SimulatedLayout {
        SimulatedLayout::new(800.0, 20.0)
    }

    fn guard(min_line_width: MinLineWidth) -> WidowGuard {
        WidowGuard::new(WidowOptions {
            min_line_width,
            ..WidowOptions::default()
        })
    }

    #[test]
    fn one_substitution_fixes_a_short_last_line() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        let mut guard = guard(MinLineWidth::Css("10%".into()));

        let report = guard.reflow(&mut host, &mut run).unwrap();
        assert_eq!(report.substitutions, 1);
        assert_eq!(report.stop, WidowStop::WideEnough);
        assert_eq!(report.target_width, Some(80.0));
        assert_eq!(report.line_widths, vec![800.0, 710.0, 140.0]);
        assert!(run.text().ends_with(&format!("bbbbbbbb{NBSP}whisk")));
        assert_eq!(guard.substitutions().len(), 1);
    }

    #[test]
    fn zero_cap_means_zero_substitutions() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        let mut guard = WidowGuard::new(WidowOptions {
            max_substitutions: 0,
            min_line_width: MinLineWidth::Css("10%".into()),
            ..WidowOptions::default()
        });
        let report = guard.reflow(&mut host, &mut run).unwrap();
        assert_eq!(report.substitutions, 0);
        assert_eq!(report.stop, WidowStop::LimitReached);
        assert_eq!(run.text(), widow_text());
    }

    #[test]
    fn zero_cap_never_resolves_the_policy() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        let mut guard = WidowGuard::new(WidowOptions {
            max_substitutions: 0,
            min_line_width: MinLineWidth::Css("12em".into()),
            ..WidowOptions::default()
        });
        let report = guard.reflow(&mut host, &mut run).unwrap();
        assert_eq!(report.stop, WidowStop::LimitReached);
        assert_eq!(report.target_width, None);
        assert_eq!(report.line_widths, vec![800.0, 800.0, 50.0]);
    }

    #[test]
    fn single_line_needs_nothing() {
        let mut host = widow_host();
        let mut run = TextRun::from_text("Islay whisky");
        let report = WidowGuard::default().reflow(&mut host, &mut run).unwrap();
        assert_eq!(report.stop, WidowStop::SingleLine);
        assert_eq!(report.target_width, None);
    }

    #[test]
    fn refuses_to_move_the_widow_up_a_line() {
        // 8px per character: "aaaaa" (40px) over "b c" (24px).
        let mut host = SimulatedLayout::new(48.0, 16.0);
        let mut run = TextRun::from_text("aaaaa b c");
        let report = guard(MinLineWidth::Fixed(35.0))
            .reflow(&mut host, &mut run)
            .unwrap();
        assert_eq!(report.line_widths, vec![40.0, 24.0]);
        assert_eq!(report.stop, WidowStop::WouldCreateWidow);
        assert_eq!(report.substitutions, 0);
    }

    #[test]
    fn stops_when_no_space_is_left() {
        let mut host = SimulatedLayout::new(400.0, 16.0);
        let mut run = TextRun::new(vec![Node::text("aaaa"), Node::Break, Node::text("b")]);
        let report = guard(MinLineWidth::Fixed(20.0))
            .reflow(&mut host, &mut run)
            .unwrap();
        assert_eq!(report.stop, WidowStop::NoSpace);
        assert_eq!(report.substitutions, 0);
    }

    #[test]
    fn cap_bounds_every_pass() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        // Unreachable target: every pass hits the cap.
        let mut guard = WidowGuard::new(WidowOptions {
            max_substitutions: 2,
            min_line_width: MinLineWidth::Fixed(300.0),
            ..WidowOptions::default()
        });
        for _ in 0..3 {
            let report = guard.reflow(&mut host, &mut run).unwrap();
            assert!(report.substitutions <= 2);
            assert_eq!(run.substitutions().len(), report.substitutions);
        }
    }

    #[test]
    fn second_pass_lands_on_the_same_result() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        let mut guard = guard(MinLineWidth::Css("10%".into()));
        let first = guard.reflow(&mut host, &mut run).unwrap();
        let text = run.text();
        let second = guard.reflow(&mut host, &mut run).unwrap();
        assert_eq!(second.undone, 1);
        assert_eq!(second.substitutions, first.substitutions);
        assert_eq!(second.line_widths, first.line_widths);
        assert_eq!(run.text(), text);
    }

    #[test]
    fn element_replacements_are_transplanted() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        let mut guard = WidowGuard::new(WidowOptions {
            min_line_width: MinLineWidth::Css("10%".into()),
            replacement: Replacement::Element(InlineElement::new("span", NBSP).with_class("nbsp")),
            ..WidowOptions::default()
        });
        let report = guard.reflow(&mut host, &mut run).unwrap();
        assert_eq!(report.line_widths, vec![800.0, 710.0, 140.0]);
        assert_eq!(run.segments().len(), 3);
    }

    #[test]
    fn unsupported_replacement_restores_last_good_state() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        let mut guard = guard(MinLineWidth::Css("10%".into()));
        guard.reflow(&mut host, &mut run).unwrap();
        let good = run.text();

        guard.set_options(WidowOptions {
            min_line_width: MinLineWidth::Css("10%".into()),
            replacement: Replacement::Factory(Arc::new(|| Node::Break)),
            ..WidowOptions::default()
        });
        let err = guard.reflow(&mut host, &mut run).unwrap_err();
        assert!(matches!(err, FitError::UnsupportedReplacement(_)));
        assert_eq!(run.text(), good);
        assert_eq!(guard.substitutions().len(), 1);
    }

    #[test]
    fn bad_length_policy_is_surfaced() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        let mut guard = guard(MinLineWidth::Css("10%".into()));
        guard.reflow(&mut host, &mut run).unwrap();
        let good = run.text();

        guard.set_options(WidowOptions {
            min_line_width: MinLineWidth::Css("12em".into()),
            ..WidowOptions::default()
        });
        let err = guard.reflow(&mut host, &mut run).unwrap_err();
        assert!(matches!(err, FitError::InvalidLength { .. }));
        assert_eq!(run.text(), good);
    }

    #[test]
    fn dynamic_policy_sees_the_measured_lines() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        let policy = MinLineWidth::Dynamic(Arc::new(|ctx: &LineWidthContext| {
            assert_eq!(ctx.line_widths, vec![800.0, 800.0, 50.0]);
            assert_eq!(ctx.container_width, 800.0);
            MinLineWidth::Fixed(ctx.max_line_width / 10.0)
        }));
        let report = guard(policy).reflow(&mut host, &mut run).unwrap();
        assert_eq!(report.target_width, Some(80.0));
        assert_eq!(report.substitutions, 1);
    }

    #[traced_test]
    #[test]
    fn logs_each_substitution() {
        let mut host = widow_host();
        let mut run = TextRun::from_text(widow_text());
        guard(MinLineWidth::Css("10%".into()))
            .reflow(&mut host, &mut run)
            .unwrap();
        assert!(logs_contain("substituted space"));
        assert!(logs_contain("widow pass finished"));
    }
}
