//! # Fit Parameters and Lengths
//!
//! The three style knobs the tightener turns, the bounds it may turn them to,
//! and the length policies the widow guard uses for its minimum line width.
//!
//! Spacing values are in `em`, relative to the text's own font size; scale is
//! a horizontal-only factor. Lengths are resolved to pixels.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// One of the style parameters the tightener can adjust, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FitParameter {
    /// Horizontal scale. Barely perceptible, so tried first.
    Scale,
    LetterSpacing,
    /// Most visually disruptive, tried last.
    WordSpacing,
}

impl FitParameter {
    /// Priority order for the tighten cascade.
    pub const PRIORITY: [FitParameter; 3] = [
        FitParameter::Scale,
        FitParameter::LetterSpacing,
        FitParameter::WordSpacing,
    ];

    /// The no-op value of this parameter given the element's own computed
    /// baseline. Scale has no baseline: its identity is always `1`.
    pub fn identity(self, baseline: f64) -> f64 {
        match self {
            FitParameter::Scale => 1.0,
            FitParameter::LetterSpacing | FitParameter::WordSpacing => baseline,
        }
    }

    pub fn css_property(self) -> &'static str {
        match self {
            FitParameter::Scale => "scaleX",
            FitParameter::LetterSpacing => "letter-spacing",
            FitParameter::WordSpacing => "word-spacing",
        }
    }
}

impl fmt::Display for FitParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_property())
    }
}

/// Values currently applied to a run. `None` means the style is removed and
/// the element renders at its baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedParams {
    pub scale: Option<f64>,
    pub letter_spacing: Option<f64>,
    pub word_spacing: Option<f64>,
}

impl AppliedParams {
    pub fn get(&self, param: FitParameter) -> Option<f64> {
        match param {
            FitParameter::Scale => self.scale,
            FitParameter::LetterSpacing => self.letter_spacing,
            FitParameter::WordSpacing => self.word_spacing,
        }
    }

    pub fn set(&mut self, param: FitParameter, value: Option<f64>) {
        match param {
            FitParameter::Scale => self.scale = value,
            FitParameter::LetterSpacing => self.letter_spacing = value,
            FitParameter::WordSpacing => self.word_spacing = value,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.scale.is_none() && self.letter_spacing.is_none() && self.word_spacing.is_none()
    }
}

/// The tightest value a parameter may take.
#[derive(Clone)]
pub enum ParamBound {
    /// An absolute value.
    Fixed(f64),
    /// Relative to the element's computed baseline: `baseline + offset`.
    Offset(f64),
    /// Computed from the baseline.
    Custom(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl ParamBound {
    pub fn resolve(&self, baseline: f64) -> f64 {
        match self {
            ParamBound::Fixed(value) => *value,
            ParamBound::Offset(offset) => baseline + offset,
            ParamBound::Custom(f) => f(baseline),
        }
    }
}

impl fmt::Debug for ParamBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamBound::Fixed(v) => f.debug_tuple("Fixed").field(v).finish(),
            ParamBound::Offset(v) => f.debug_tuple("Offset").field(v).finish(),
            ParamBound::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBound {
    Fixed(f64),
    Offset { offset: f64 },
}

impl<'de> Deserialize<'de> for ParamBound {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawBound::deserialize(deserializer)? {
            RawBound::Fixed(value) => ParamBound::Fixed(value),
            RawBound::Offset { offset } => ParamBound::Offset(offset),
        })
    }
}

/// A CSS length the widow guard understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CssLength {
    Px(f64),
    /// Percentage of the container's available width.
    Percent(f64),
}

impl CssLength {
    /// Parse `"15%"` or `"120px"`. Anything else is an error.
    pub fn parse(input: &str) -> Result<Self, FitError> {
        let trimmed = input.trim();
        let invalid = |reason: &str| FitError::InvalidLength {
            value: input.to_string(),
            reason: reason.to_string(),
        };
        let (number, unit) = if let Some(n) = trimmed.strip_suffix('%') {
            (n, "%")
        } else if let Some(n) = trimmed.strip_suffix("px") {
            (n, "px")
        } else {
            return Err(invalid("expected a `%` or `px` length"));
        };
        if !is_plain_number(number) {
            return Err(invalid("malformed number"));
        }
        let value: f64 = number.parse().map_err(|_| invalid("malformed number"))?;
        Ok(match unit {
            "%" => CssLength::Percent(value),
            _ => CssLength::Px(value),
        })
    }

    pub fn to_px(self, container_width: f64) -> f64 {
        match self {
            CssLength::Px(px) => px,
            CssLength::Percent(pct) => container_width * pct / 100.0,
        }
    }
}

/// `-?\d*\.?\d+`
fn is_plain_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    match frac {
        Some(frac) => all_digits(int) && !frac.is_empty() && all_digits(frac),
        None => !int.is_empty() && all_digits(int),
    }
}

/// What a dynamic minimum-width policy gets to look at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineWidthContext {
    pub line_widths: Vec<f64>,
    pub max_line_width: f64,
    pub prev_line_width: f64,
    pub last_line_width: f64,
    /// Width of a synthetic block laid out at 100% of the container.
    pub container_width: f64,
}

/// Minimum width of the last line.
#[derive(Clone)]
pub enum MinLineWidth {
    /// Absolute pixels.
    Fixed(f64),
    /// A CSS length string, resolved against the container.
    Css(String),
    /// Decided per pass from the measured lines.
    Dynamic(Arc<dyn Fn(&LineWidthContext) -> MinLineWidth + Send + Sync>),
}

impl Default for MinLineWidth {
    fn default() -> Self {
        MinLineWidth::Css("15%".to_string())
    }
}

impl fmt::Debug for MinLineWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinLineWidth::Fixed(v) => f.debug_tuple("Fixed").field(v).finish(),
            MinLineWidth::Css(s) => f.debug_tuple("Css").field(s).finish(),
            MinLineWidth::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMinLineWidth {
    Fixed(f64),
    Css(String),
}

impl<'de> Deserialize<'de> for MinLineWidth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawMinLineWidth::deserialize(deserializer)? {
            RawMinLineWidth::Fixed(px) => MinLineWidth::Fixed(px),
            RawMinLineWidth::Css(css) => MinLineWidth::Css(css),
        })
    }
}

const MAX_POLICY_DEPTH: usize = 8;

/// Resolve a minimum-width policy to pixels.
pub fn resolve_length_policy(
    policy: &MinLineWidth,
    context: &LineWidthContext,
) -> Result<f64, FitError> {
    let mut current = policy.clone();
    for _ in 0..MAX_POLICY_DEPTH {
        let px = match &current {
            MinLineWidth::Fixed(px) => *px,
            MinLineWidth::Css(css) => CssLength::parse(css)?.to_px(context.container_width),
            MinLineWidth::Dynamic(f) => {
                let next = f(context);
                current = next;
                continue;
            }
        };
        if !px.is_finite() {
            return Err(FitError::InvalidLength {
                value: format!("{current:?}"),
                reason: "resolved to a non-finite width".to_string(),
            });
        }
        return Ok(px);
    }
    Err(FitError::InvalidLength {
        value: "<dynamic>".to_string(),
        reason: format!("policy callbacks nested deeper than {MAX_POLICY_DEPTH}"),
    })
}
