// Glyph and image atlas inputs consumed by shaping. Rasterisation and atlas packing
// happen elsewhere; only metrics and positions matter here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Em size glyph metrics are expressed in.
pub const ONE_EM: f64 = 24.0;

/// Border baked around every glyph bitmap.
pub const GLYPH_PBF_BORDER: f64 = 3.0;

/// Padding around every image in the image atlas.
pub const IMAGE_PADDING: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GlyphMetrics {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
    pub advance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlyphPosition {
    pub rect: Option<Rect>,
    pub metrics: GlyphMetrics,
}

/// Font stack → code point → metrics.
pub type GlyphMap = HashMap<String, HashMap<u32, GlyphMetrics>>;

/// Font stack → code point → atlas position.
pub type GlyphPositions = HashMap<String, HashMap<u32, GlyphPosition>>;

pub type ImagePositions = HashMap<String, ImagePosition>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextFit {
    #[default]
    StretchOrShrink,
    StretchOnly,
    Proportional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePosition {
    pub padded_rect: Rect,
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f64,
    #[serde(default)]
    pub sdf: bool,
    /// Stretchable content box `[x1, y1, x2, y2]` in image pixels.
    #[serde(default)]
    pub content: Option<[f64; 4]>,
    #[serde(default)]
    pub text_fit_width: Option<TextFit>,
    #[serde(default)]
    pub text_fit_height: Option<TextFit>,
    /// Whether the image must be sampled with linear filtering.
    #[serde(default)]
    pub stretchable: bool,
}

fn default_pixel_ratio() -> f64 {
    1.0
}

impl ImagePosition {
    pub fn new(padded_rect: Rect, pixel_ratio: f64) -> Self {
        Self {
            padded_rect,
            pixel_ratio,
            sdf: false,
            content: None,
            text_fit_width: None,
            text_fit_height: None,
            stretchable: false,
        }
    }

    /// Size in CSS pixels, excluding atlas padding.
    pub fn display_size(&self) -> [f64; 2] {
        let ratio = if self.pixel_ratio > 0.0 { self.pixel_ratio } else { 1.0 };
        [
            (self.padded_rect.w - IMAGE_PADDING * 2.0) / ratio,
            (self.padded_rect.h - IMAGE_PADDING * 2.0) / ratio,
        ]
    }

    pub fn has_text_fit(&self) -> bool {
        self.content.is_some() && (self.text_fit_width.is_some() || self.text_fit_height.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    #[default]
    Bottom,
    Center,
    Top,
}

impl VerticalAlign {
    pub fn factor(self) -> f64 {
        match self {
            VerticalAlign::Top => 0.0,
            VerticalAlign::Center => 0.5,
            VerticalAlign::Bottom => 1.0,
        }
    }
}

/// One run of formatted label content: either text or an inline image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormattedSection {
    pub text: String,
    pub image: Option<String>,
    pub scale: Option<f64>,
    pub font_stack: Option<String>,
    pub vertical_align: Option<VerticalAlign>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Formatted {
    pub sections: Vec<FormattedSection>,
}

impl Formatted {
    pub fn from_text(text: &str) -> Self {
        Self {
            sections: vec![FormattedSection {
                text: text.to_string(),
                ..FormattedSection::default()
            }],
        }
    }

    /// Plain text content, images excluded.
    pub fn plain_text(&self) -> String {
        self.sections
            .iter()
            .filter(|s| s.image.is_none())
            .map(|s| s.text.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.text.is_empty() && s.image.is_none())
    }
}
