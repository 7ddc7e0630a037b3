// Symbol layer properties, already evaluated to constants for one layer.

use crate::collision::OverlapMode;
use serde::{Deserialize, Serialize};

/// Anchor positions shared by `text-anchor`, `icon-anchor` and variable anchors.
/// The discriminants are stable and stored in placement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum TextAnchor {
    #[default]
    Center = 1,
    Left = 2,
    Right = 3,
    Top = 4,
    Bottom = 5,
    TopLeft = 6,
    TopRight = 7,
    BottomLeft = 8,
    BottomRight = 9,
}

impl TextAnchor {
    pub const ALL: [TextAnchor; 9] = [
        TextAnchor::Center,
        TextAnchor::Left,
        TextAnchor::Right,
        TextAnchor::Top,
        TextAnchor::Bottom,
        TextAnchor::TopLeft,
        TextAnchor::TopRight,
        TextAnchor::BottomLeft,
        TextAnchor::BottomRight,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|anchor| anchor.code() == code)
    }

    pub fn is_top(self) -> bool {
        matches!(self, TextAnchor::Top | TextAnchor::TopLeft | TextAnchor::TopRight)
    }

    pub fn is_bottom(self) -> bool {
        matches!(
            self,
            TextAnchor::Bottom | TextAnchor::BottomLeft | TextAnchor::BottomRight
        )
    }

    pub fn is_left(self) -> bool {
        matches!(self, TextAnchor::Left | TextAnchor::TopLeft | TextAnchor::BottomLeft)
    }

    pub fn is_right(self) -> bool {
        matches!(
            self,
            TextAnchor::Right | TextAnchor::TopRight | TextAnchor::BottomRight
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextJustify {
    Auto,
    Left,
    #[default]
    Center,
    Right,
}

impl TextJustify {
    /// Horizontal justification factor: 0 for left, 0.5 for center, 1 for right.
    pub fn factor(self) -> f64 {
        match self {
            TextJustify::Left => 0.0,
            TextJustify::Right => 1.0,
            TextJustify::Center | TextJustify::Auto => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolPlacement {
    #[default]
    Point,
    Line,
    LineCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    Map,
    Viewport,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconTextFit {
    #[default]
    None,
    Width,
    Height,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolZOrder {
    #[default]
    Auto,
    ViewportY,
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    Lowercase,
}

impl TextTransform {
    pub fn apply(self, text: &str) -> String {
        match self {
            TextTransform::None => text.to_string(),
            TextTransform::Uppercase => text.to_uppercase(),
            TextTransform::Lowercase => text.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritingModeName {
    Horizontal,
    Vertical,
}

/// Layout properties of a symbol layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SymbolLayout {
    pub symbol_placement: SymbolPlacement,
    pub symbol_spacing: f64,
    pub symbol_avoid_edges: bool,
    pub symbol_sort_key: Option<f64>,
    pub symbol_z_order: SymbolZOrder,

    pub icon_image: Option<String>,
    pub icon_allow_overlap: bool,
    pub icon_overlap: Option<OverlapMode>,
    pub icon_ignore_placement: bool,
    pub icon_optional: bool,
    pub icon_rotation_alignment: Alignment,
    pub icon_pitch_alignment: Alignment,
    pub icon_size: f64,
    pub icon_text_fit: IconTextFit,
    /// CSS order: top, right, bottom, left.
    pub icon_text_fit_padding: [f64; 4],
    pub icon_rotate: f64,
    /// One to four values, expanded the way CSS margins are.
    pub icon_padding: Vec<f64>,
    pub icon_keep_upright: bool,
    pub icon_offset: [f64; 2],
    pub icon_anchor: TextAnchor,

    pub text_font: Vec<String>,
    pub text_size: f64,
    pub text_max_width: f64,
    pub text_line_height: f64,
    pub text_letter_spacing: f64,
    pub text_justify: TextJustify,
    pub text_radial_offset: Option<f64>,
    pub text_variable_anchor: Option<Vec<TextAnchor>>,
    pub text_variable_anchor_offset: Option<Vec<(TextAnchor, [f64; 2])>>,
    pub text_anchor: TextAnchor,
    pub text_max_angle: f64,
    pub text_writing_mode: Vec<WritingModeName>,
    pub text_rotation_alignment: Alignment,
    pub text_pitch_alignment: Alignment,
    pub text_rotate: f64,
    pub text_padding: f64,
    pub text_keep_upright: bool,
    pub text_transform: TextTransform,
    pub text_offset: [f64; 2],
    pub text_allow_overlap: bool,
    pub text_overlap: Option<OverlapMode>,
    pub text_ignore_placement: bool,
    pub text_optional: bool,
}

impl Default for SymbolLayout {
    fn default() -> Self {
        Self {
            symbol_placement: SymbolPlacement::Point,
            symbol_spacing: 250.0,
            symbol_avoid_edges: false,
            symbol_sort_key: None,
            symbol_z_order: SymbolZOrder::Auto,
            icon_image: None,
            icon_allow_overlap: false,
            icon_overlap: None,
            icon_ignore_placement: false,
            icon_optional: false,
            icon_rotation_alignment: Alignment::Auto,
            icon_pitch_alignment: Alignment::Auto,
            icon_size: 1.0,
            icon_text_fit: IconTextFit::None,
            icon_text_fit_padding: [0.0; 4],
            icon_rotate: 0.0,
            icon_padding: vec![2.0],
            icon_keep_upright: false,
            icon_offset: [0.0, 0.0],
            icon_anchor: TextAnchor::Center,
            text_font: vec![
                "Open Sans Regular".to_string(),
                "Arial Unicode MS Regular".to_string(),
            ],
            text_size: 16.0,
            text_max_width: 10.0,
            text_line_height: 1.2,
            text_letter_spacing: 0.0,
            text_justify: TextJustify::Center,
            text_radial_offset: None,
            text_variable_anchor: None,
            text_variable_anchor_offset: None,
            text_anchor: TextAnchor::Center,
            text_max_angle: 45.0,
            text_writing_mode: Vec::new(),
            text_rotation_alignment: Alignment::Auto,
            text_pitch_alignment: Alignment::Auto,
            text_rotate: 0.0,
            text_padding: 2.0,
            text_keep_upright: true,
            text_transform: TextTransform::None,
            text_offset: [0.0, 0.0],
            text_allow_overlap: false,
            text_overlap: None,
            text_ignore_placement: false,
            text_optional: false,
        }
    }
}

impl SymbolLayout {
    /// Resolves `auto` alignments against the placement mode and normalises the
    /// writing modes of point layers.
    pub fn resolved(mut self) -> Self {
        let along_line = self.symbol_placement != SymbolPlacement::Point;
        let auto_rotation = if along_line { Alignment::Map } else { Alignment::Viewport };
        if self.icon_rotation_alignment == Alignment::Auto {
            self.icon_rotation_alignment = auto_rotation;
        }
        if self.text_rotation_alignment == Alignment::Auto {
            self.text_rotation_alignment = auto_rotation;
        }
        if self.text_pitch_alignment == Alignment::Auto {
            self.text_pitch_alignment = if self.text_rotation_alignment == Alignment::Map {
                Alignment::Map
            } else {
                Alignment::Viewport
            };
        }
        if self.icon_pitch_alignment == Alignment::Auto {
            self.icon_pitch_alignment = self.icon_rotation_alignment;
        }
        if !along_line {
            if self.text_writing_mode.is_empty() {
                self.text_writing_mode = vec![WritingModeName::Horizontal];
            } else {
                let mut deduped = Vec::with_capacity(self.text_writing_mode.len());
                for mode in &self.text_writing_mode {
                    if !deduped.contains(mode) {
                        deduped.push(*mode);
                    }
                }
                self.text_writing_mode = deduped;
            }
        }
        self
    }

    pub fn text_overlap_mode(&self) -> OverlapMode {
        get_overlap_mode(self.text_overlap, self.text_allow_overlap)
    }

    pub fn icon_overlap_mode(&self) -> OverlapMode {
        get_overlap_mode(self.icon_overlap, self.icon_allow_overlap)
    }

    pub fn has_variable_anchors(&self) -> bool {
        self.text_variable_anchor_offset.is_some() || self.text_variable_anchor.is_some()
    }

    pub fn allows_vertical_writing(&self) -> bool {
        self.text_writing_mode.contains(&WritingModeName::Vertical)
    }

    pub fn text_along_line(&self) -> bool {
        self.text_rotation_alignment == Alignment::Map
            && self.symbol_placement != SymbolPlacement::Point
    }

    pub fn text_pitch_with_map(&self) -> bool {
        self.text_pitch_alignment == Alignment::Map
    }

    pub fn text_rotate_with_map(&self) -> bool {
        self.text_rotation_alignment == Alignment::Map
    }

    pub fn icon_pitch_with_map(&self) -> bool {
        self.icon_pitch_alignment == Alignment::Map
    }

    pub fn icon_rotate_with_map(&self) -> bool {
        self.icon_rotation_alignment == Alignment::Map
    }

    /// `icon-padding` expanded to `[top, right, bottom, left]` and scaled.
    pub fn icon_padding_box(&self, pixel_ratio: f64) -> [f64; 4] {
        let p = &self.icon_padding;
        let expanded = match p.len() {
            0 => [0.0; 4],
            1 => [p[0]; 4],
            2 => [p[0], p[1], p[0], p[1]],
            3 => [p[0], p[1], p[2], p[1]],
            _ => [p[0], p[1], p[2], p[3]],
        };
        expanded.map(|v| v * pixel_ratio)
    }
}

/// `*-overlap` wins when set; otherwise `*-allow-overlap` maps to `always` or `never`.
pub fn get_overlap_mode(overlap: Option<OverlapMode>, allow_overlap: bool) -> OverlapMode {
    match overlap {
        Some(mode) => mode,
        None if allow_overlap => OverlapMode::Always,
        None => OverlapMode::Never,
    }
}

/// Paint properties that affect placement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SymbolPaint {
    pub text_translate: [f64; 2],
    pub icon_translate: [f64; 2],
}
