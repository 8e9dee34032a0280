//! # Fonts
//!
//! Glyph advances for the simulated layout host, and the font-load observer
//! that tells a typesetter when web fonts have arrived (a reflow trigger).
//!
//! Advances are kept in `em` so the same metrics serve any font size.

pub mod observer;

use std::collections::HashMap;

use crate::error::FitError;

pub use observer::{FontDescriptor, FontObserver, FontStatus};

/// Per-character horizontal advances.
#[derive(Debug, Clone)]
pub enum GlyphMetrics {
    /// Every character has the same advance, in em.
    Uniform(f64),
    /// Advances read from a TrueType/OpenType font.
    Font(FontMetrics),
}

impl Default for GlyphMetrics {
    fn default() -> Self {
        GlyphMetrics::Uniform(0.5)
    }
}

impl GlyphMetrics {
    /// Advance of `ch` in em.
    pub fn advance(&self, ch: char) -> f64 {
        match self {
            GlyphMetrics::Uniform(em) => *em,
            GlyphMetrics::Font(metrics) => metrics.advance(ch),
        }
    }

    /// Parse advances from raw font bytes.
    pub fn from_font_data(data: &[u8]) -> Result<Self, FitError> {
        FontMetrics::from_font_data(data).map(GlyphMetrics::Font)
    }
}

/// Metrics parsed from a font file via ttf-parser.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    /// Used for characters the font has no glyph for.
    pub default_advance: u16,
}

impl FontMetrics {
    pub fn advance(&self, ch: char) -> f64 {
        // A no-break space is drawn with the space glyph in most fonts.
        let ch = if ch == '\u{a0}' && !self.advance_widths.contains_key(&ch) {
            ' '
        } else {
            ch
        };
        let units = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        units as f64 / self.units_per_em as f64
    }

    pub fn from_font_data(data: &[u8]) -> Result<Self, FitError> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|e| FitError::FontError(format!("Failed to parse font: {e}")))?;
        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            return Err(FitError::FontError("font reports zero units per em".to_string()));
        }

        let mut advance_widths = HashMap::new();
        let mut default_advance = 0u16;

        // Basic Multilingual Plane only
        for code in 32u32..=0xFFFF {
            let Some(ch) = char::from_u32(code) else {
                continue;
            };
            if let Some(glyph_id) = face.glyph_index(ch) {
                let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                advance_widths.insert(ch, advance);
                if ch == ' ' {
                    default_advance = advance;
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Ok(FontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
        })
    }
}
