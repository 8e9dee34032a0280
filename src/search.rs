//! # Bounded Binary Search
//!
//! A generic optimizer over a single scalar. The caller owns the target being
//! tuned; the optimizer only ever talks to it through a [`Probe`]: `update`
//! applies a candidate value, `measure` reports which way to go next.
//!
//! Rendering pipelines serialize style values with limited precision (six
//! significant digits in the common engines), so candidate values are rounded
//! to `precision` significant digits and the search stops as soon as rounding
//! can no longer produce a value strictly between the bounds.

use tracing::trace;

/// Tri-state verdict returned by [`Probe::measure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// The value should be raised.
    Low,
    /// The value should be lowered.
    High,
    /// The value is acceptable as-is.
    Optimal,
}

/// Which side of the final bracket to commit to when the iteration budget
/// runs out before an [`Measurement::Optimal`] value is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preference {
    /// Commit to the lower bound (under-correct).
    #[default]
    Low,
    /// Commit to the upper bound (over-correct).
    High,
    /// Keep whatever value was tested last.
    LastTested,
}

/// The target being tuned.
pub trait Probe {
    /// Apply `value` to the target. Always called before [`Probe::measure`].
    fn update(&mut self, value: f64);
    /// Measure the target in its current state.
    fn measure(&mut self) -> Measurement;
}

/// Adapter turning a pair of closures into a [`Probe`].
///
/// Handy when `update` and `measure` don't need to borrow the same state.
pub struct FnProbe<U, M> {
    pub update: U,
    pub measure: M,
}

impl<U, M> Probe for FnProbe<U, M>
where
    U: FnMut(f64),
    M: FnMut() -> Measurement,
{
    fn update(&mut self, value: f64) {
        (self.update)(value)
    }

    fn measure(&mut self) -> Measurement {
        (self.measure)()
    }
}

/// Search configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub max_iterations: u32,
    /// Significant digits candidate values are rounded to. `None` disables
    /// rounding (and the early exit that comes with it).
    pub precision: Option<u32>,
    pub preference: Preference,
}

impl SearchOptions {
    pub fn new(lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            lower_bound,
            upper_bound,
            max_iterations: 5,
            precision: Some(6),
            preference: Preference::Low,
        }
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn precision(mut self, precision: Option<u32>) -> Self {
        self.precision = precision;
        self
    }

    pub fn preference(mut self, preference: Preference) -> Self {
        self.preference = preference;
        self
    }
}

/// Final state of one search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    /// The committed value. The probe has already been updated to it.
    pub value: f64,
    /// Number of `update` + `measure` rounds performed.
    pub iterations: u32,
    /// Whether the search stopped on an `Optimal` measurement.
    pub optimal: bool,
}

/// Round `value` to `digits` significant digits, the way a renderer would
/// when serializing a style value.
pub fn round_to_precision(value: f64, digits: u32) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    let digits = digits.clamp(1, 17) as usize;
    // Scientific formatting rounds correctly at the requested digit count.
    format!("{:.*e}", digits - 1, value)
        .parse()
        .unwrap_or(value)
}

/// Run a bounded binary search and return the committed value.
///
/// The last tested value starts at the upper bound: the caller is expected to
/// already have it applied. With `max_iterations == 0` nothing is
/// probed and the upper bound comes straight back.
pub fn search<P: Probe + ?Sized>(probe: &mut P, options: &SearchOptions) -> SearchOutcome {
    if options.max_iterations == 0 {
        return SearchOutcome {
            value: options.upper_bound,
            iterations: 0,
            optimal: false,
        };
    }

    let mut lower = options.lower_bound;
    let mut upper = options.upper_bound;
    let mut last_value = upper;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        let mut middle = (lower + upper) / 2.0;
        if let Some(digits) = options.precision {
            middle = round_to_precision(middle, digits);
        }
        if middle == upper || middle == lower {
            trace!(lower, upper, "precision exhausted, stopping early");
            break;
        }

        iterations += 1;
        last_value = middle;
        probe.update(middle);
        let result = probe.measure();
        trace!(iteration = iterations, value = middle, ?result, "search step");

        match result {
            Measurement::Low => lower = middle,
            Measurement::High => upper = middle,
            Measurement::Optimal => {
                return SearchOutcome {
                    value: middle,
                    iterations,
                    optimal: true,
                }
            }
        }
    }

    let value = match options.preference {
        Preference::Low => lower,
        Preference::High => upper,
        Preference::LastTested => last_value,
    };
    if value != last_value {
        probe.update(value);
    }

    SearchOutcome {
        value,
        iterations,
        optimal: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Records every applied value and answers based on a threshold:
    /// values above `boundary` are too high.
    struct Threshold {
        boundary: f64,
        current: f64,
        applied: Vec<f64>,
    }

    impl Threshold {
        fn new(boundary: f64, start: f64) -> Self {
            Self {
                boundary,
                current: start,
                applied: Vec::new(),
            }
        }
    }

    impl Probe for Threshold {
        fn update(&mut self, value: f64) {
            self.current = value;
            self.applied.push(value);
        }

        fn measure(&mut self) -> Measurement {
            if self.current > self.boundary {
                Measurement::High
            } else {
                Measurement::Low
            }
        }
    }

    #[test]
    fn rounds_to_significant_digits() {
        assert_eq!(round_to_precision(0.98765432, 6), 0.987654);
        assert_eq!(round_to_precision(1234.5678, 3), 1230.0);
        assert_eq!(round_to_precision(-0.0123456789, 4), -0.01235);
        assert_eq!(round_to_precision(0.0, 6), 0.0);
    }

    #[test]
    fn zero_iterations_returns_upper_bound_untouched() {
        let mut probe = Threshold::new(0.5, 1.0);
        let outcome = search(&mut probe, &SearchOptions::new(0.0, 1.0).max_iterations(0));
        assert_eq!(outcome.value, 1.0);
        assert_eq!(outcome.iterations, 0);
        assert!(probe.applied.is_empty());
    }

    #[test]
    fn zero_iterations_ignores_preference() {
        for preference in [Preference::Low, Preference::High, Preference::LastTested] {
            let mut probe = Threshold::new(0.98, 1.0);
            let options = SearchOptions::new(0.97, 1.0)
                .max_iterations(0)
                .preference(preference);
            let outcome = search(&mut probe, &options);
            assert_eq!(outcome.value, 1.0);
            assert!(probe.applied.is_empty());
            assert_eq!(probe.current, 1.0);
        }
    }

    #[test]
    fn low_preference_commits_to_lower_bound() {
        let mut probe = Threshold::new(0.3, 1.0);
        let outcome = search(&mut probe, &SearchOptions::new(0.0, 1.0));
        // 0.5 H, 0.25 L, 0.375 H, 0.3125 H, 0.28125 L
        assert_eq!(probe.applied, vec![0.5, 0.25, 0.375, 0.3125, 0.28125]);
        assert_eq!(outcome.value, 0.28125);
        assert_eq!(outcome.iterations, 5);
        assert!(!outcome.optimal);
    }

    #[test]
    fn final_update_leaves_target_at_committed_value() {
        // Last tested value is too high, so the lower bound must be re-applied.
        let mut probe = Threshold::new(0.1, 1.0);
        let outcome = search(&mut probe, &SearchOptions::new(0.0, 1.0).max_iterations(3));
        assert_eq!(probe.applied, vec![0.5, 0.25, 0.125, 0.0]);
        assert_eq!(outcome.value, 0.0);
        assert_eq!(probe.current, outcome.value);
    }

    #[test]
    fn high_preference_commits_to_upper_bound() {
        let mut probe = Threshold::new(0.3, 1.0);
        let options = SearchOptions::new(0.0, 1.0).preference(Preference::High);
        let outcome = search(&mut probe, &options);
        assert_eq!(outcome.value, 0.3125);
        assert_eq!(probe.current, 0.3125);
    }

    #[test]
    fn last_tested_preference_never_re_applies() {
        let mut probe = Threshold::new(0.3, 1.0);
        let options = SearchOptions::new(0.0, 1.0).preference(Preference::LastTested);
        let outcome = search(&mut probe, &options);
        assert_eq!(outcome.value, 0.28125);
        assert_eq!(probe.applied.len(), 5);
    }

    #[test]
    fn optimal_stops_immediately() {
        let applied = RefCell::new(Vec::new());
        let calls = Cell::new(0);
        let mut probe = FnProbe {
            update: |v| applied.borrow_mut().push(v),
            measure: || {
                calls.set(calls.get() + 1);
                if calls.get() == 2 {
                    Measurement::Optimal
                } else {
                    Measurement::High
                }
            },
        };
        let outcome = search(&mut probe, &SearchOptions::new(0.0, 1.0));
        assert!(outcome.optimal);
        assert_eq!(outcome.value, 0.25);
        assert_eq!(*applied.borrow(), vec![0.5, 0.25]);
    }

    #[test]
    fn precision_cuts_search_short() {
        // With two significant digits, 0.97..1.0 only has a few distinct midpoints.
        let mut probe = Threshold::new(0.0, 1.0);
        let options = SearchOptions::new(0.97, 1.0)
            .max_iterations(50)
            .precision(Some(2));
        let outcome = search(&mut probe, &options);
        assert!(outcome.iterations < 50);
        assert_eq!(outcome.value, 0.97);
    }

    #[test]
    fn collapsed_bounds_do_nothing() {
        let mut probe = Threshold::new(0.5, 0.97);
        let outcome = search(&mut probe, &SearchOptions::new(0.97, 0.97));
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.value, 0.97);
        assert!(probe.applied.is_empty());
    }
}
