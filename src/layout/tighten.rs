//! # Tightening
//!
//! Shrinks a run by the least amount that gets rid of an avoidable wrap or
//! overflow. Each pass goes:
//!
//! 1. **Baseline**: clear all three parameters and measure. One line and no
//!    overflow means there is nothing to do.
//! 2. **Probing**: apply every parameter at its minimum at once and measure
//!    again. That measurement is the best the run can possibly do; if it is
//!    no better than the baseline, clear everything and stop. If it still
//!    overflows, keep it as is: loosening can only make overflow worse.
//! 3. **Cascade**: starting from identity again, tighten parameters one at a
//!    time in priority order (scale, letter-spacing, word-spacing). The first
//!    parameter that reaches the probing target at its minimum (with the
//!    earlier ones held at theirs) is searched for its loosest value that
//!    still reaches the target. Later parameters stay untouched.
//!
//! The cascade tightens forward from identity. It does not relax each
//! parameter back from the all-minimum state.
//!
//! Everything is re-derived from identity on every pass, so running a pass
//! twice with the same geometry lands on the same values.

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use super::{measure_fit, FitMetrics, LayoutHost};
use crate::config::TightenOptions;
use crate::search::{search, Measurement, Preference, Probe, SearchOptions};
use crate::style::{AppliedParams, FitParameter};
use crate::text::TextRun;

/// How a tighten pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TightenOutcome {
    /// Nothing wrapped or overflowed at identity.
    AlreadyFits,
    /// Full tightening didn't improve lines or overflow; everything reset.
    NoImprovement,
    /// Overflow survives full tightening; every parameter left at its minimum.
    MaxTightened,
    /// One parameter was searched; those before it in priority sit at their
    /// minimum, those after it at identity.
    #[serde(rename_all = "camelCase")]
    Searched {
        param: FitParameter,
        value: f64,
        iterations: u32,
    },
}

impl fmt::Display for TightenOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TightenOutcome::AlreadyFits => f.write_str("already fits"),
            TightenOutcome::NoImprovement => f.write_str("no improvement possible"),
            TightenOutcome::MaxTightened => f.write_str("fully tightened"),
            TightenOutcome::Searched { param, value, .. } => write!(f, "{param} = {value}"),
        }
    }
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TightenReport {
    pub outcome: TightenOutcome,
    /// Measured at identity.
    pub baseline: FitMetrics,
    /// Measured after the pass.
    pub result: FitMetrics,
    pub applied: AppliedParams,
}

/// Resolved search range of one parameter.
#[derive(Debug, Clone, Copy)]
struct Range {
    min: f64,
    identity: f64,
}

/// Runs tighten passes against a host and remembers what it applied.
#[derive(Debug, Clone, Default)]
pub struct TightenEngine {
    options: TightenOptions,
    applied: AppliedParams,
}

impl TightenEngine {
    pub fn new(options: TightenOptions) -> Self {
        Self {
            options,
            applied: AppliedParams::default(),
        }
    }

    pub fn options(&self) -> &TightenOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: TightenOptions) {
        self.options = options;
    }

    /// Parameter values this engine last left applied.
    pub fn applied(&self) -> AppliedParams {
        self.applied
    }

    /// Put `applied` back on the host exactly, clearing anything it leaves
    /// unset. Used to roll back a reflow that failed after tightening.
    pub fn restore<H: LayoutHost + ?Sized>(&mut self, host: &mut H, applied: AppliedParams) {
        for param in FitParameter::PRIORITY {
            host.apply_param(param, applied.get(param));
        }
        self.applied = applied;
    }

    /// Remove every parameter from the host.
    pub fn reset<H: LayoutHost + ?Sized>(&mut self, host: &mut H) {
        for param in FitParameter::PRIORITY {
            host.apply_param(param, None);
        }
        self.applied = AppliedParams::default();
    }

    fn apply<H: LayoutHost + ?Sized>(&mut self, host: &mut H, param: FitParameter, value: f64) {
        host.apply_param(param, Some(value));
        self.applied.set(param, Some(value));
    }

    /// Run one pass over `run`.
    pub fn reflow<H: LayoutHost + ?Sized>(&mut self, host: &mut H, run: &TextRun) -> TightenReport {
        self.reset(host);
        let baseline = measure_fit(host, run);
        debug!(lines = baseline.line_count, overflow = baseline.overflow, "tighten baseline");

        if baseline.line_count <= 1 && baseline.overflow <= 0.0 {
            return self.report(TightenOutcome::AlreadyFits, baseline, baseline);
        }

        let ranges = FitParameter::PRIORITY.map(|param| {
            let base = host.baseline(param);
            Range {
                min: self.options.min_bound(param).resolve(base),
                identity: param.identity(base),
            }
        });

        for (param, range) in FitParameter::PRIORITY.into_iter().zip(ranges) {
            self.apply(host, param, range.min);
        }
        let target = measure_fit(host, run);
        debug!(
            lines = target.line_count,
            overflow = target.overflow,
            "tighten target"
        );

        let improves = target.line_count < baseline.line_count || target.overflow < baseline.overflow;
        if !improves || !target.satisfies(&baseline) {
            self.reset(host);
            return self.report(TightenOutcome::NoImprovement, baseline, baseline);
        }
        if target.overflow > 0.0 || self.options.max_iterations == 0 {
            return self.report(TightenOutcome::MaxTightened, baseline, target);
        }

        self.reset(host);
        for (param, range) in FitParameter::PRIORITY.into_iter().zip(ranges) {
            self.apply(host, param, range.min);
            let reached = measure_fit(host, run);
            if !reached.satisfies(&target) {
                trace!(%param, "minimum alone misses the target, holding it");
                continue;
            }

            // The optimizer expects the upper bound to be applied already.
            self.apply(host, param, range.identity);
            let options = SearchOptions::new(range.min, range.identity)
                .max_iterations(self.options.max_iterations)
                .precision(self.options.precision)
                .preference(Preference::Low);
            let mut probe = ParamProbe {
                host: &mut *host,
                run,
                param,
                target,
            };
            let outcome = search(&mut probe, &options);
            self.applied.set(param, Some(outcome.value));
            debug!(%param, value = outcome.value, iterations = outcome.iterations, "tightened");

            let result = measure_fit(host, run);
            return self.report(
                TightenOutcome::Searched {
                    param,
                    value: outcome.value,
                    iterations: outcome.iterations,
                },
                baseline,
                result,
            );
        }

        // Only reachable if the host measures inconsistently.
        self.report(TightenOutcome::MaxTightened, baseline, target)
    }

    fn report(&self, outcome: TightenOutcome, baseline: FitMetrics, result: FitMetrics) -> TightenReport {
        TightenReport {
            outcome,
            baseline,
            result,
            applied: self.applied,
        }
    }
}

/// Searches one parameter against the probing target.
struct ParamProbe<'a, H: LayoutHost + ?Sized> {
    host: &'a mut H,
    run: &'a TextRun,
    param: FitParameter,
    target: FitMetrics,
}

impl<H: LayoutHost + ?Sized> Probe for ParamProbe<'_, H> {
    fn update(&mut self, value: f64) {
        self.host.apply_param(self.param, Some(value));
    }

    fn measure(&mut self) -> Measurement {
        // High means too many lines or too much overflow: tighten further.
        if measure_fit(&mut *self.host, self.run).satisfies(&self.target) {
            Measurement::Low
        } else {
            Measurement::High
        }
    }
}
