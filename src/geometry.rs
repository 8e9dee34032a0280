//! # Line Geometry
//!
//! Turns the raw rectangles a renderer reports for a run of text into visual
//! lines. A single line can be made of several fragments (one per inline
//! element it crosses), so rows are detected by vertical position: a new line
//! starts whenever a fragment sits strictly below the first fragment of the
//! current line. Input must therefore be in visual order, top to bottom and
//! left to right.

use serde::Serialize;

/// One fragment of rendered text, in the coordinate space of the measured
/// container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineRect {
    pub top: f64,
    pub left: f64,
    pub right: f64,
}

impl LineRect {
    pub fn new(top: f64, left: f64, right: f64) -> Self {
        Self { top, left, right }
    }
}

/// The fragments that make up one visual row.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub rects: Vec<LineRect>,
}

impl Line {
    /// Horizontal extent of the row: `max(right) - min(left)`.
    pub fn width(&self) -> f64 {
        line_width(&self.rects)
    }

    pub fn top(&self) -> f64 {
        self.rects.first().map_or(0.0, |r| r.top)
    }
}

/// Client and scroll extents of the measured container along the inline axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extents {
    pub client: f64,
    pub scroll: f64,
}

impl Extents {
    pub fn overflow(&self) -> f64 {
        overflow(self.client, self.scroll)
    }
}

/// Group fragments into rows. An empty input yields no lines.
pub fn group_lines(rects: &[LineRect]) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    for rect in rects {
        match lines.last_mut() {
            Some(line) if rect.top <= line.top() => line.rects.push(*rect),
            _ => lines.push(Line { rects: vec![*rect] }),
        }
    }
    lines
}

/// Width spanned by a set of fragments. Zero for an empty set.
pub fn line_width(rects: &[LineRect]) -> f64 {
    if rects.is_empty() {
        return 0.0;
    }
    let left = rects.iter().map(|r| r.left).fold(f64::INFINITY, f64::min);
    let right = rects
        .iter()
        .map(|r| r.right)
        .fold(f64::NEG_INFINITY, f64::max);
    right - left
}

/// Widths of each line, in order.
pub fn line_widths(lines: &[Line]) -> Vec<f64> {
    lines.iter().map(Line::width).collect()
}

/// How far content sticks out of its container. Never negative.
pub fn overflow(client_extent: f64, scroll_extent: f64) -> f64 {
    (scroll_extent - client_extent).max(0.0)
}
