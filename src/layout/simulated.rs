//! A reference [`LayoutHost`] with a deliberately small line breaker.
//!
//! Text is broken greedily at UAX #14 opportunities, so a no-break space
//! never breaks and hard breaks always do. Trailing collapsible whitespace
//! hangs past the end of the line and doesn't count towards its width.
//! Horizontal scale shrinks the text box, not the container: a run scaled to
//! `s` has `container / s` pixels of room and reports rects multiplied by `s`.
//!
//! There's no shaping, kerning or bidi here. It exists so the fitting passes
//! can be driven from the CLI and tested against real numbers.

use std::ops::Range;

use serde::Deserialize;
use unicode_linebreak::{linebreaks, BreakOpportunity};

use super::LayoutHost;
use crate::font::GlyphMetrics;
use crate::geometry::{Extents, LineRect};
use crate::style::{AppliedParams, FitParameter};
use crate::text::TextRun;

const EPSILON: f64 = 1e-9;

/// Container geometry and base text style, as read from a JSON document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStyle {
    pub width: f64,
    pub font_size: f64,
    #[serde(default)]
    pub line_height: Option<f64>,
    /// Computed letter-spacing in em. `0` is `normal`.
    #[serde(default)]
    pub letter_spacing: f64,
    #[serde(default)]
    pub word_spacing: f64,
    /// Uniform advance in em, used when no font file is given.
    #[serde(default)]
    pub advance: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SimulatedLayout {
    container_width: f64,
    font_size: f64,
    line_height: f64,
    metrics: GlyphMetrics,
    letter_spacing_baseline: f64,
    word_spacing_baseline: f64,
    applied: AppliedParams,
    measurements: usize,
}

#[derive(Debug, Clone, Copy)]
struct Glyph {
    segment: usize,
    byte: usize,
    ch: char,
    advance: f64,
}

impl SimulatedLayout {
    /// A container `container_width` pixels wide with text at `font_size`
    /// pixels and half-em uniform advances.
    pub fn new(container_width: f64, font_size: f64) -> Self {
        Self {
            container_width,
            font_size,
            line_height: font_size * 1.2,
            metrics: GlyphMetrics::default(),
            letter_spacing_baseline: 0.0,
            word_spacing_baseline: 0.0,
            applied: AppliedParams::default(),
            measurements: 0,
        }
    }

    pub fn from_style(style: &ContainerStyle) -> Self {
        let mut layout = Self::new(style.width, style.font_size)
            .with_baseline(FitParameter::LetterSpacing, style.letter_spacing)
            .with_baseline(FitParameter::WordSpacing, style.word_spacing);
        if let Some(line_height) = style.line_height {
            layout.line_height = line_height;
        }
        if let Some(advance) = style.advance {
            layout.metrics = GlyphMetrics::Uniform(advance);
        }
        layout
    }

    pub fn with_metrics(mut self, metrics: GlyphMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the element's own computed spacing, in em. Ignored for scale.
    pub fn with_baseline(mut self, param: FitParameter, em: f64) -> Self {
        match param {
            FitParameter::Scale => {}
            FitParameter::LetterSpacing => self.letter_spacing_baseline = em,
            FitParameter::WordSpacing => self.word_spacing_baseline = em,
        }
        self
    }

    pub fn set_container_width(&mut self, width: f64) {
        self.container_width = width;
    }

    pub fn applied(&self) -> AppliedParams {
        self.applied
    }

    /// How many times lines have been measured.
    pub fn measurements(&self) -> usize {
        self.measurements
    }

    fn scale(&self) -> f64 {
        self.applied.scale.unwrap_or(1.0)
    }

    fn shape(&self, run: &TextRun) -> (String, Vec<Glyph>) {
        let letter = self.applied.letter_spacing.unwrap_or(self.letter_spacing_baseline) * self.font_size;
        let word = self.applied.word_spacing.unwrap_or(self.word_spacing_baseline) * self.font_size;

        let mut text = String::new();
        let mut glyphs = Vec::new();
        for (segment, piece) in run.segments().iter().enumerate() {
            for ch in piece.text().chars() {
                let mut advance = match ch {
                    '\n' | '\r' => 0.0,
                    _ => self.metrics.advance(ch) * self.font_size + letter,
                };
                if ch == ' ' || ch == '\u{a0}' {
                    advance += word;
                }
                glyphs.push(Glyph {
                    segment,
                    byte: text.len(),
                    ch,
                    advance,
                });
                text.push(ch);
            }
        }
        (text, glyphs)
    }

    /// Greedy line filling. Returns glyph ranges, one per line.
    fn break_lines(&self, text: &str, glyphs: &[Glyph]) -> Vec<Range<usize>> {
        if glyphs.is_empty() {
            return Vec::new();
        }
        let available = self.container_width / self.scale();
        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut line_advance = 0.0;
        let mut prev = 0;

        for (position, opportunity) in linebreaks(text) {
            let end = glyphs.partition_point(|g| g.byte < position);
            let unit = &glyphs[prev..end];
            let unit_advance: f64 = unit.iter().map(|g| g.advance).sum();
            let visible = unit_advance - hanging_advance(unit);

            if prev > line_start && line_advance + visible > available + EPSILON {
                lines.push(line_start..prev);
                line_start = prev;
                line_advance = 0.0;
            }
            line_advance += unit_advance;

            if opportunity == BreakOpportunity::Mandatory {
                lines.push(line_start..end);
                line_start = end;
                line_advance = 0.0;
            }
            prev = end;
        }
        if line_start < glyphs.len() {
            lines.push(line_start..glyphs.len());
        }
        lines
    }

    fn visible_widths(&self, run: &TextRun) -> Vec<f64> {
        let (text, glyphs) = self.shape(run);
        let scale = self.scale();
        self.break_lines(&text, &glyphs)
            .into_iter()
            .map(|range| {
                let line = trim_hanging(&glyphs[range]);
                line.iter().map(|g| g.advance).sum::<f64>() * scale
            })
            .collect()
    }
}

fn is_hanging(ch: char) -> bool {
    matches!(ch, ' ' | '\n' | '\r' | '\t')
}

fn hanging_advance(glyphs: &[Glyph]) -> f64 {
    glyphs
        .iter()
        .rev()
        .take_while(|g| is_hanging(g.ch))
        .map(|g| g.advance)
        .sum()
}

fn trim_hanging(glyphs: &[Glyph]) -> &[Glyph] {
    let keep = glyphs.len() - glyphs.iter().rev().take_while(|g| is_hanging(g.ch)).count();
    &glyphs[..keep]
}

impl LayoutHost for SimulatedLayout {
    fn measure_lines(&mut self, run: &TextRun) -> Vec<LineRect> {
        self.measurements += 1;
        let (text, glyphs) = self.shape(run);
        let scale = self.scale();
        let mut rects = Vec::new();

        for (index, range) in self.break_lines(&text, &glyphs).into_iter().enumerate() {
            let top = index as f64 * self.line_height;
            let line = trim_hanging(&glyphs[range]);
            if line.is_empty() {
                rects.push(LineRect::new(top, 0.0, 0.0));
                continue;
            }
            // One fragment per segment crossed, like inline boxes.
            let mut x = 0.0;
            let mut fragment: Option<(usize, f64)> = None;
            for glyph in line {
                match fragment {
                    Some((segment, _)) if segment == glyph.segment => {}
                    Some((_, left)) => {
                        rects.push(LineRect::new(top, left * scale, x * scale));
                        fragment = Some((glyph.segment, x));
                    }
                    None => fragment = Some((glyph.segment, x)),
                }
                x += glyph.advance;
            }
            if let Some((_, left)) = fragment {
                rects.push(LineRect::new(top, left * scale, x * scale));
            }
        }
        rects
    }

    fn measure_extents(&mut self, run: &TextRun) -> Extents {
        let widest = self
            .visible_widths(run)
            .into_iter()
            .fold(0.0, f64::max);
        Extents {
            client: self.container_width,
            scroll: self.container_width.max(widest),
        }
    }

    fn apply_param(&mut self, param: FitParameter, value: Option<f64>) {
        self.applied.set(param, value);
    }

    fn baseline(&self, param: FitParameter) -> f64 {
        match param {
            FitParameter::Scale => 1.0,
            FitParameter::LetterSpacing => self.letter_spacing_baseline,
            FitParameter::WordSpacing => self.word_spacing_baseline,
        }
    }

    fn container_width(&mut self) -> f64 {
        self.container_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{group_lines, line_widths};
    use crate::text::{InlineElement, Node, ReplacementUnit, SpanRef, NBSP};

    fn widths(host: &mut SimulatedLayout, run: &TextRun) -> Vec<f64> {
        line_widths(&group_lines(&host.measure_lines(run)))
    }

    #[test]
    fn breaks_greedily_at_spaces() {
        // 8px per character.
        let mut host = SimulatedLayout::new(100.0, 16.0);
        let run = TextRun::from_text("aaaa bbbb cccc dddd");
        // "aaaa bbbb " fits (72 visible), "cccc" would make it 112.
        assert_eq!(widths(&mut host, &run), vec![72.0, 72.0]);
    }

    #[test]
    fn empty_text_has_no_lines() {
        let mut host = SimulatedLayout::new(100.0, 16.0);
        assert!(host.measure_lines(&TextRun::from_text("")).is_empty());
    }

    #[test]
    fn no_break_space_glues_words() {
        let mut host = SimulatedLayout::new(100.0, 16.0);
        let mut run = TextRun::from_text("aaaa bbbb cccc dddd");
        run.splice(SpanRef { node: 0, offset: 9 }, 1, ReplacementUnit::Text(NBSP.to_string()))
            .unwrap();
        // "bbbb\u{a0}cccc" can only move as a whole.
        assert_eq!(widths(&mut host, &run), vec![32.0, 72.0, 32.0]);
    }

    #[test]
    fn hard_breaks_always_break() {
        let mut host = SimulatedLayout::new(1000.0, 16.0);
        let run = TextRun::new(vec![Node::text("ab"), Node::Break, Node::text("cd")]);
        assert_eq!(widths(&mut host, &run), vec![16.0, 16.0]);
    }

    #[test]
    fn one_fragment_per_inline_segment() {
        let mut host = SimulatedLayout::new(1000.0, 16.0);
        let run = TextRun::new(vec![
            Node::text("ab "),
            Node::Element(InlineElement::new("em", "cd")),
            Node::text(" ef"),
        ]);
        let rects = host.measure_lines(&run);
        assert_eq!(rects.len(), 3);
        assert_eq!(rects[1], LineRect::new(0.0, 24.0, 40.0));
        assert_eq!(group_lines(&rects).len(), 1);
    }

    #[test]
    fn scale_widens_available_room_and_shrinks_rects() {
        let mut host = SimulatedLayout::new(100.0, 16.0);
        let run = TextRun::from_text("aaaaaa bbbbbb");
        assert_eq!(widths(&mut host, &run).len(), 2);
        host.apply_param(FitParameter::Scale, Some(0.5));
        let single = widths(&mut host, &run);
        assert_eq!(single, vec![52.0]);
    }

    #[test]
    fn spacing_is_applied_in_em() {
        let mut host = SimulatedLayout::new(1000.0, 10.0)
            .with_baseline(FitParameter::WordSpacing, 0.1);
        let run = TextRun::from_text("ab cd");
        // 5 chars at 5px, plus 1px word spacing.
        assert_eq!(widths(&mut host, &run), vec![26.0]);
        host.apply_param(FitParameter::LetterSpacing, Some(-0.1));
        assert_eq!(widths(&mut host, &run), vec![21.0]);
        host.apply_param(FitParameter::WordSpacing, None);
        assert_eq!(host.baseline(FitParameter::WordSpacing), 0.1);
        assert_eq!(widths(&mut host, &run), vec![21.0]);
    }

    #[test]
    fn overlong_words_overflow() {
        let mut host = SimulatedLayout::new(150.0, 16.0);
        let run = TextRun::from_text("Supercalifragilistic");
        let extents = host.measure_extents(&run);
        assert_eq!(extents.overflow(), 10.0);
        assert_eq!(host.measurements(), 0);
    }
}
