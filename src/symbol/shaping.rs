use super::glyphs::{
    Formatted, GLYPH_PBF_BORDER, GlyphMap, GlyphMetrics, GlyphPositions, IMAGE_PADDING,
    ImagePosition, ImagePositions, ONE_EM, Rect, TextFit,
};
use super::script::{
    char_has_upright_vertical_orientation, char_in_complex_shaping_script, char_is_whitespace,
    string_contains_rtl_text,
};
use super::style::{IconTextFit, TextAnchor, TextJustify};
use super::tagged_string::{SectionOptions, TaggedString};
use super::variable_anchor::get_anchor_alignment;
use crate::collision::ShapedExtents;
use crate::warn::warn_once;
use serde::Serialize;

/// Distance from the top of a glyph's em box to where its bitmap starts.
pub const SHAPING_DEFAULT_OFFSET: f64 = -17.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum WritingMode {
    #[default]
    None = 0,
    Horizontal = 1,
    Vertical = 2,
    HorizontalOnly = 3,
}

/// Position of one glyph or inline image relative to the label anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedGlyph {
    pub glyph: char,
    pub image_name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub vertical: bool,
    pub scale: f64,
    pub font_stack: String,
    pub section_index: usize,
    pub metrics: GlyphMetrics,
    pub rect: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionedLine {
    pub positioned_glyphs: Vec<PositionedGlyph>,
    pub line_offset: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shaping {
    pub positioned_lines: Vec<PositionedLine>,
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
    pub writing_mode: WritingMode,
    /// Logical text, before any bidi reordering.
    pub text: String,
    pub icons_in_text: bool,
    pub verticalizable: bool,
}

impl Shaping {
    pub fn glyph_count(&self) -> usize {
        self.positioned_lines
            .iter()
            .map(|line| line.positioned_glyphs.len())
            .sum()
    }

    pub fn is_single_line(&self) -> bool {
        self.positioned_lines.len() == 1
    }
}

impl ShapedExtents for Shaping {
    fn extents(&self) -> [f64; 4] {
        [self.left, self.top, self.right, self.bottom]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionedIcon {
    pub image: ImagePosition,
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
    /// CSS order: left, top, right, bottom.
    pub collision_padding: Option<[f64; 4]>,
}

impl ShapedExtents for PositionedIcon {
    fn extents(&self) -> [f64; 4] {
        if self.image.has_text_fit() {
            apply_text_fit(self)
        } else {
            [self.left, self.top, self.right, self.bottom]
        }
    }

    fn collision_padding(&self) -> Option<[f64; 4]> {
        self.collision_padding
    }
}

/// Reorders right-to-left text into visual order.
///
/// Line breaks are character indices into the logical text. Implementations return
/// one string per visual line.
pub trait BidiProcessor {
    fn process(&self, text: &str, line_breaks: &[usize]) -> Vec<String>;

    /// Style-aware variant: returns each visual line together with the section index
    /// of each of its characters. `None` means unsupported.
    fn process_styled(
        &self,
        _text: &str,
        _section_index: &[usize],
        _line_breaks: &[usize],
    ) -> Option<Vec<(String, Vec<usize>)>> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct ShapeOptions<'a> {
    pub default_font_stack: &'a str,
    pub max_width: f64,
    pub line_height: f64,
    pub text_anchor: TextAnchor,
    pub text_justify: TextJustify,
    pub spacing: f64,
    pub translate: [f64; 2],
    pub writing_mode: WritingMode,
    pub allow_vertical_placement: bool,
    pub layout_text_size: f64,
    pub layout_text_size_this_zoom: f64,
}

struct SectionAttributes {
    rect: Option<Rect>,
    metrics: GlyphMetrics,
    baseline_offset: f64,
    image_offset: f64,
}

struct LineShapingSize {
    vertical_line_content_width: f64,
    horizontal_line_content_height: f64,
}

/// Lays out formatted text into positioned glyph lines.
#[derive(Clone, Copy)]
pub struct TextShaper<'a> {
    pub glyph_map: &'a GlyphMap,
    pub glyph_positions: &'a GlyphPositions,
    pub image_positions: &'a ImagePositions,
    pub bidi: Option<&'a dyn BidiProcessor>,
}

impl<'a> TextShaper<'a> {
    pub fn new(
        glyph_map: &'a GlyphMap,
        glyph_positions: &'a GlyphPositions,
        image_positions: &'a ImagePositions,
    ) -> Self {
        Self {
            glyph_map,
            glyph_positions,
            image_positions,
            bidi: None,
        }
    }

    pub fn with_bidi(mut self, bidi: &'a dyn BidiProcessor) -> Self {
        self.bidi = Some(bidi);
        self
    }

    /// Shapes `text`, or returns `None` when not a single glyph or image could be
    /// positioned.
    pub fn shape_text(&self, text: &Formatted, options: &ShapeOptions<'_>) -> Option<Shaping> {
        let mut logical = TaggedString::from_feature(text, options.default_font_stack);
        if options.writing_mode == WritingMode::Vertical {
            logical.verticalize_punctuation();
        }

        let line_breaks = logical.determine_line_breaks(
            options.spacing,
            options.max_width,
            self.glyph_map,
            self.image_positions,
            options.layout_text_size,
        );
        let lines = self.reorder_lines(&logical, &line_breaks);

        let mut shaping = Shaping {
            positioned_lines: Vec::with_capacity(lines.len()),
            top: options.translate[1],
            bottom: options.translate[1],
            left: options.translate[0],
            right: options.translate[0],
            writing_mode: options.writing_mode,
            text: logical.to_string(),
            icons_in_text: false,
            verticalizable: false,
        };

        self.shape_lines(&mut shaping, lines, options);
        if shaping.glyph_count() == 0 {
            return None;
        }
        Some(shaping)
    }

    fn reorder_lines(&self, logical: &TaggedString, line_breaks: &[usize]) -> Vec<TaggedString> {
        let text = logical.to_string();
        let Some(bidi) = self.bidi else {
            if string_contains_rtl_text(&text) {
                warn_once("RTL text plugin unavailable; right-to-left labels are shaped in logical order");
            }
            return break_lines(logical, line_breaks);
        };

        if logical.sections().len() == 1 {
            return bidi
                .process(&text, line_breaks)
                .into_iter()
                .map(|line| {
                    let count = line.chars().count();
                    logical.with_text(&line, vec![0; count])
                })
                .collect();
        }

        let section_index: Vec<usize> = (0..logical.len()).map(|i| logical.section_index(i)).collect();
        match bidi.process_styled(&text, &section_index, line_breaks) {
            Some(lines) => lines
                .into_iter()
                .map(|(line, sections)| logical.with_text(&line, sections))
                .collect(),
            None => break_lines(logical, line_breaks),
        }
    }

    fn shape_lines(&self, shaping: &mut Shaping, lines: Vec<TaggedString>, options: &ShapeOptions<'_>) {
        let mut x = 0.0;
        let mut y = 0.0;
        let mut max_line_length: f64 = 0.0;
        let mut max_line_height: f64 = 0.0;
        let justify = options.text_justify.factor();
        let layout_text_size_factor = ONE_EM / options.layout_text_size_this_zoom;
        let spacing = options.spacing;
        let line_count = lines.len();

        for mut line in lines {
            line.trim();
            let line_max_scale = line.max_scale();
            let mut positioned_line = PositionedLine::default();
            let mut image_offset: f64 = 0.0;

            if line.is_empty() {
                // An empty line still advances the baseline.
                y += options.line_height;
                shaping.positioned_lines.push(positioned_line);
                continue;
            }

            let size = self.line_content_size(&line, layout_text_size_factor);

            for (i, &c) in line.chars().iter().enumerate() {
                let section = line.section(i);
                let vertical = is_line_vertical(options.writing_mode, options.allow_vertical_placement, c);

                let (attributes, scale, font_stack, image_name) = match section {
                    SectionOptions::Text {
                        scale,
                        vertical_align,
                        font_stack,
                    } => {
                        let Some(attributes) = self.shape_text_section(
                            font_stack,
                            *scale,
                            vertical_align.factor(),
                            c,
                            vertical,
                            &size,
                        ) else {
                            continue;
                        };
                        (attributes, *scale, font_stack.clone(), None)
                    }
                    SectionOptions::Image {
                        scale,
                        vertical_align,
                        image_name,
                    } => {
                        shaping.icons_in_text = true;
                        let scale = scale * layout_text_size_factor;
                        let Some(attributes) = self.shape_image_section(
                            image_name,
                            scale,
                            vertical_align.factor(),
                            vertical,
                            line_max_scale,
                            &size,
                        ) else {
                            continue;
                        };
                        image_offset = image_offset.max(attributes.image_offset);
                        (attributes, scale, String::new(), Some(image_name.clone()))
                    }
                };

                let advance = if vertical {
                    shaping.verticalizable = true;
                    if image_name.is_some() { attributes.metrics.advance } else { ONE_EM }
                } else {
                    attributes.metrics.advance
                };

                positioned_line.positioned_glyphs.push(PositionedGlyph {
                    glyph: c,
                    image_name,
                    x,
                    y: y + SHAPING_DEFAULT_OFFSET + attributes.baseline_offset,
                    vertical,
                    scale,
                    font_stack,
                    section_index: line.section_index(i),
                    metrics: attributes.metrics,
                    rect: attributes.rect,
                });

                x += advance * scale + spacing;
            }

            if !positioned_line.positioned_glyphs.is_empty() {
                let line_length = x - spacing;
                max_line_length = max_line_length.max(line_length);
                justify_line(&mut positioned_line.positioned_glyphs, justify);
            }

            x = 0.0;
            let max_line_offset = (line_max_scale - 1.0) * ONE_EM;
            positioned_line.line_offset = image_offset.max(max_line_offset);
            let current_line_height = options.line_height * line_max_scale + image_offset;
            y += current_line_height;
            max_line_height = max_line_height.max(current_line_height);
            shaping.positioned_lines.push(positioned_line);
        }

        let (horizontal_align, vertical_align) = get_anchor_alignment(options.text_anchor);
        align(
            &mut shaping.positioned_lines,
            justify,
            horizontal_align,
            vertical_align,
            max_line_length,
            max_line_height,
            options.line_height,
            y,
            line_count,
        );

        // top and left already carry the text offset
        shaping.top += -vertical_align * y;
        shaping.bottom = shaping.top + y;
        shaping.left += -horizontal_align * max_line_length;
        shaping.right = shaping.left + max_line_length;
    }

    fn line_content_size(&self, line: &TaggedString, layout_text_size_factor: f64) -> LineShapingSize {
        let max_glyph_size = line.max_scale() * ONE_EM;
        let (max_image_width, max_image_height) = line.max_image_size(self.image_positions);
        LineShapingSize {
            vertical_line_content_width: max_glyph_size.max(max_image_width * layout_text_size_factor),
            horizontal_line_content_height: max_glyph_size.max(max_image_height * layout_text_size_factor),
        }
    }

    fn glyph(&self, font_stack: &str, c: char) -> Option<(Option<Rect>, GlyphMetrics)> {
        let code = u32::from(c);
        if let Some(position) = self
            .glyph_positions
            .get(font_stack)
            .and_then(|positions| positions.get(&code))
            && position.rect.is_some()
        {
            return Some((position.rect, position.metrics));
        }
        self.glyph_map
            .get(font_stack)
            .and_then(|glyphs| glyphs.get(&code))
            .map(|metrics| (None, *metrics))
    }

    fn shape_text_section(
        &self,
        font_stack: &str,
        scale: f64,
        vertical_align_factor: f64,
        c: char,
        vertical: bool,
        size: &LineShapingSize,
    ) -> Option<SectionAttributes> {
        let (rect, metrics) = self.glyph(font_stack, c)?;
        let baseline_offset = if vertical {
            size.vertical_line_content_width - scale * ONE_EM
        } else {
            (size.horizontal_line_content_height - scale * ONE_EM) * vertical_align_factor
        };
        Some(SectionAttributes {
            rect,
            metrics,
            baseline_offset,
            image_offset: 0.0,
        })
    }

    fn shape_image_section(
        &self,
        image_name: &str,
        scale: f64,
        vertical_align_factor: f64,
        vertical: bool,
        line_max_scale: f64,
        size: &LineShapingSize,
    ) -> Option<SectionAttributes> {
        let image = self.image_positions.get(image_name)?;
        let [width, height] = image.display_size();
        let metrics = GlyphMetrics {
            width,
            height,
            left: IMAGE_PADDING,
            top: -GLYPH_PBF_BORDER,
            advance: if vertical { height } else { width },
        };
        let baseline_offset = if vertical {
            size.vertical_line_content_width - height * scale
        } else {
            (size.horizontal_line_content_height - height * scale) * vertical_align_factor
        };
        // Pushes the line down when an image is taller than one em at the line's scale.
        let image_offset = (if vertical { width } else { height }) * scale - ONE_EM * line_max_scale;
        Some(SectionAttributes {
            rect: Some(image.padded_rect),
            metrics,
            baseline_offset,
            image_offset,
        })
    }
}

fn break_lines(input: &TaggedString, line_breaks: &[usize]) -> Vec<TaggedString> {
    let mut lines = Vec::with_capacity(line_breaks.len() + 1);
    let mut start = 0;
    for &line_break in line_breaks {
        lines.push(input.substring(start, line_break));
        start = line_break;
    }
    if start < input.len() {
        lines.push(input.substring(start, input.len()));
    }
    lines
}

fn is_line_vertical(writing_mode: WritingMode, allow_vertical_placement: bool, c: char) -> bool {
    !(writing_mode == WritingMode::Horizontal
        || (!allow_vertical_placement && !char_has_upright_vertical_orientation(c))
        || (allow_vertical_placement && (char_is_whitespace(c) || char_in_complex_shaping_script(c))))
}

fn justify_line(glyphs: &mut [PositionedGlyph], justify: f64) {
    if justify == 0.0 {
        return;
    }
    let Some(last) = glyphs.last() else {
        return;
    };
    let line_indent = (last.x + last.metrics.advance * last.scale) * justify;
    for glyph in glyphs.iter_mut() {
        glyph.x -= line_indent;
    }
}

#[allow(clippy::too_many_arguments)]
fn align(
    lines: &mut [PositionedLine],
    justify: f64,
    horizontal_align: f64,
    vertical_align: f64,
    max_line_length: f64,
    max_line_height: f64,
    line_height: f64,
    block_height: f64,
    line_count: usize,
) {
    let shift_x = (justify - horizontal_align) * max_line_length;
    let shift_y = if max_line_height != line_height {
        -block_height * vertical_align - SHAPING_DEFAULT_OFFSET
    } else {
        -vertical_align * line_count as f64 * line_height + 0.5 * line_height
    };
    for glyph in lines.iter_mut().flat_map(|line| line.positioned_glyphs.iter_mut()) {
        glyph.x += shift_x;
        glyph.y += shift_y;
    }
}

/// Places an icon image around its anchor according to `icon-anchor` and `icon-offset`.
pub fn shape_icon(image: &ImagePosition, icon_offset: [f64; 2], icon_anchor: TextAnchor) -> PositionedIcon {
    let (horizontal_align, vertical_align) = get_anchor_alignment(icon_anchor);
    let [width, height] = image.display_size();
    let left = icon_offset[0] - width * horizontal_align;
    let top = icon_offset[1] - height * vertical_align;
    PositionedIcon {
        image: image.clone(),
        top,
        bottom: top + height,
        left,
        right: left + width,
        collision_padding: None,
    }
}

/// Extents `[x1, y1, x2, y2]` of a text-fitted icon, with proportional axes pushed
/// back out to the aspect ratio of the image's content box.
pub fn apply_text_fit(icon: &PositionedIcon) -> [f64; 4] {
    let mut left = icon.left;
    let mut top = icon.top;
    let mut width = icon.right - left;
    let mut height = icon.bottom - top;
    let Some(content) = icon.image.content else {
        return [left, top, left + width, top + height];
    };
    let content_width = content[2] - content[0];
    let content_height = content[3] - content[1];
    let fit_width = icon.image.text_fit_width.unwrap_or_default();
    let fit_height = icon.image.text_fit_height.unwrap_or_default();
    let aspect = content_width / content_height;

    // Height wins when both axes are proportional.
    if fit_height == TextFit::Proportional {
        if (fit_width == TextFit::StretchOnly && width / height < aspect)
            || fit_width == TextFit::Proportional
        {
            let new_width = (height * aspect).ceil();
            left *= new_width / width;
            width = new_width;
        }
    } else if fit_width == TextFit::Proportional
        && fit_height == TextFit::StretchOnly
        && aspect != 0.0
        && width / height > aspect
    {
        let new_height = (width / aspect).ceil();
        top *= new_height / height;
        height = new_height;
    }
    [left, top, left + width, top + height]
}

/// Stretches or centres an icon over shaped text for `icon-text-fit`.
/// `padding` is CSS order `[top, right, bottom, left]`.
pub fn fit_icon_to_text(
    icon: &PositionedIcon,
    text: &Shaping,
    text_fit: IconTextFit,
    padding: [f64; 4],
    icon_offset: [f64; 2],
    font_scale: f64,
) -> PositionedIcon {
    let image = &icon.image;
    let [display_width, display_height] = image.display_size();

    let collision_padding = image.content.map(|content| {
        let pixel_ratio = if image.pixel_ratio > 0.0 { image.pixel_ratio } else { 1.0 };
        [
            content[0] / pixel_ratio,
            content[1] / pixel_ratio,
            display_width - content[2] / pixel_ratio,
            display_height - content[3] / pixel_ratio,
        ]
    });

    let text_left = text.left * font_scale;
    let text_right = text.right * font_scale;
    let (left, right) = if matches!(text_fit, IconTextFit::Width | IconTextFit::Both) {
        (
            icon_offset[0] + text_left - padding[3],
            icon_offset[0] + text_right + padding[1],
        )
    } else {
        let left = icon_offset[0] + (text_left + text_right - display_width) / 2.0;
        (left, left + display_width)
    };

    let text_top = text.top * font_scale;
    let text_bottom = text.bottom * font_scale;
    let (top, bottom) = if matches!(text_fit, IconTextFit::Height | IconTextFit::Both) {
        (
            icon_offset[1] + text_top - padding[0],
            icon_offset[1] + text_bottom + padding[2],
        )
    } else {
        let top = icon_offset[1] + (text_top + text_bottom - display_height) / 2.0;
        (top, top + display_height)
    };

    PositionedIcon {
        image: image.clone(),
        top,
        bottom,
        left,
        right,
        collision_padding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::glyphs::FormattedSection;
    use std::collections::HashMap;

    const FONT: &str = "Test Sans";

    fn glyph_map() -> GlyphMap {
        let mut glyphs = HashMap::new();
        for c in ('a'..='z').chain('A'..='Z').chain([' ', '-', '\u{5e9}', '\u{4e2d}']) {
            glyphs.insert(
                u32::from(c),
                GlyphMetrics {
                    width: 10.0,
                    height: 18.0,
                    left: 1.0,
                    top: -8.0,
                    advance: if c == ' ' { 6.0 } else { 12.0 },
                },
            );
        }
        HashMap::from([(FONT.to_string(), glyphs)])
    }

    fn options() -> ShapeOptions<'static> {
        ShapeOptions {
            default_font_stack: FONT,
            max_width: f64::INFINITY,
            line_height: 24.0 * 1.2,
            text_anchor: TextAnchor::Center,
            text_justify: TextJustify::Center,
            spacing: 0.0,
            translate: [0.0, 0.0],
            writing_mode: WritingMode::Horizontal,
            allow_vertical_placement: false,
            layout_text_size: 16.0,
            layout_text_size_this_zoom: 16.0,
        }
    }

    fn shape(text: &str, options: &ShapeOptions<'_>) -> Option<Shaping> {
        let glyphs = glyph_map();
        let positions = GlyphPositions::new();
        let images = ImagePositions::new();
        TextShaper::new(&glyphs, &positions, &images).shape_text(&Formatted::from_text(text), options)
    }

    #[test]
    fn single_line_is_centered_on_anchor() {
        let shaping = shape("abc", &options()).expect("shaped");
        assert_eq!(shaping.positioned_lines.len(), 1);
        assert_eq!(shaping.left, -18.0);
        assert_eq!(shaping.right, 18.0);
        assert!((shaping.top + 14.4).abs() < 1e-9, "top {}", shaping.top);
        assert!((shaping.bottom - 14.4).abs() < 1e-9, "bottom {}", shaping.bottom);
        let xs: Vec<f64> = shaping.positioned_lines[0]
            .positioned_glyphs
            .iter()
            .map(|g| g.x)
            .collect();
        assert_eq!(xs, vec![-18.0, -6.0, 6.0]);
        let y = shaping.positioned_lines[0].positioned_glyphs[0].y;
        assert!((y - SHAPING_DEFAULT_OFFSET).abs() < 1e-9, "y {y}");
    }

    #[test]
    fn anchor_moves_block() {
        let mut opts = options();
        opts.text_anchor = TextAnchor::TopLeft;
        let shaping = shape("abc", &opts).expect("shaped");
        assert_eq!(shaping.left, 0.0);
        assert_eq!(shaping.right, 36.0);
        assert_eq!(shaping.top, 0.0);

        opts.text_anchor = TextAnchor::BottomRight;
        opts.translate = [5.0, 7.0];
        let shaping = shape("abc", &opts).expect("shaped");
        assert_eq!(shaping.right, 5.0);
        assert!((shaping.bottom - 7.0).abs() < 1e-9, "bottom {}", shaping.bottom);
    }

    #[test]
    fn missing_glyphs_fail_shaping() {
        assert_eq!(shape("\u{263A}\u{263B}", &options()), None);
        assert_eq!(shape("", &options()), None);
    }

    #[test]
    fn missing_glyph_is_skipped() {
        let shaping = shape("a\u{263A}b", &options()).expect("shaped");
        assert_eq!(shaping.glyph_count(), 2);
        assert_eq!(shaping.right - shaping.left, 24.0);
    }

    #[test]
    fn max_width_breaks_lines() {
        let mut opts = options();
        opts.max_width = 60.0;
        let shaping = shape("aaaa bbbb cccc", &opts).expect("shaped");
        assert_eq!(shaping.positioned_lines.len(), 3);
        assert!((shaping.bottom - shaping.top - 3.0 * 28.8).abs() < 1e-9);
    }

    #[test]
    fn left_justified_lines_start_at_block_edge() {
        let mut opts = options();
        opts.max_width = 60.0;
        opts.text_justify = TextJustify::Left;
        let shaping = shape("aaaa bb", &opts).expect("shaped");
        for line in &shaping.positioned_lines {
            let first = &line.positioned_glyphs[0];
            assert!((first.x - shaping.left).abs() < 1e-9, "{} vs {}", first.x, shaping.left);
        }
    }

    #[test]
    fn rtl_text_without_bidi_keeps_logical_order() {
        let shaping = shape("\u{5e9}a", &options()).expect("shaped");
        let glyphs: Vec<char> = shaping.positioned_lines[0]
            .positioned_glyphs
            .iter()
            .map(|g| g.glyph)
            .collect();
        assert_eq!(glyphs, vec!['\u{5e9}', 'a']);
    }

    struct Reverse;

    impl BidiProcessor for Reverse {
        fn process(&self, text: &str, _line_breaks: &[usize]) -> Vec<String> {
            vec![text.chars().rev().collect()]
        }
    }

    #[test]
    fn bidi_processor_reorders_single_section_text() {
        let glyphs = glyph_map();
        let positions = GlyphPositions::new();
        let images = ImagePositions::new();
        let reverse = Reverse;
        let shaper = TextShaper::new(&glyphs, &positions, &images).with_bidi(&reverse);
        let shaping = shaper
            .shape_text(&Formatted::from_text("ab"), &options())
            .expect("shaped");
        let glyphs: Vec<char> = shaping.positioned_lines[0]
            .positioned_glyphs
            .iter()
            .map(|g| g.glyph)
            .collect();
        assert_eq!(glyphs, vec!['b', 'a']);
        assert_eq!(shaping.text, "ab");
    }

    #[test]
    fn vertical_mode_marks_upright_glyphs() {
        let mut opts = options();
        opts.writing_mode = WritingMode::Vertical;
        let shaping = shape("\u{4e2d}\u{4e2d}", &opts).expect("shaped");
        assert!(shaping.verticalizable);
        assert!(shaping.positioned_lines[0].positioned_glyphs.iter().all(|g| g.vertical));
        assert_eq!(shaping.right - shaping.left, 48.0);
    }

    #[test]
    fn inline_image_is_positioned() {
        let glyphs = glyph_map();
        let positions = GlyphPositions::new();
        let mut images = ImagePositions::new();
        images.insert(
            "dot".to_string(),
            ImagePosition::new(Rect { x: 0.0, y: 0.0, w: 22.0, h: 22.0 }, 1.0),
        );
        let text = Formatted {
            sections: vec![
                FormattedSection {
                    text: "a".to_string(),
                    ..FormattedSection::default()
                },
                FormattedSection {
                    image: Some("dot".to_string()),
                    ..FormattedSection::default()
                },
            ],
        };
        let shaping = TextShaper::new(&glyphs, &positions, &images)
            .shape_text(&text, &options())
            .expect("shaped");
        assert!(shaping.icons_in_text);
        let image_glyph = &shaping.positioned_lines[0].positioned_glyphs[1];
        assert_eq!(image_glyph.image_name.as_deref(), Some("dot"));
        assert_eq!(image_glyph.metrics.width, 20.0);
        // 24 / 16 image scale.
        assert!((image_glyph.scale - 1.5).abs() < 1e-9);
    }

    fn icon(rect: Rect, content: [f64; 4], width: Option<TextFit>, height: Option<TextFit>) -> PositionedIcon {
        let mut image = ImagePosition::new(rect, 1.0);
        image.content = Some(content);
        image.text_fit_width = width;
        image.text_fit_height = height;
        PositionedIcon {
            image,
            top: 0.0,
            bottom: 14.0,
            left: 0.0,
            right: 14.0,
            collision_padding: None,
        }
    }

    #[test]
    fn text_fit_without_proportional_axis_is_unchanged() {
        let rect = Rect { x: 0.0, y: 0.0, w: 100.0, h: 20.0 };
        let plain = icon(rect, [5.0, 5.0, 95.0, 15.0], None, None);
        assert_eq!(apply_text_fit(&plain), [0.0, 0.0, 14.0, 14.0]);
        let stretch = icon(
            rect,
            [5.0, 5.0, 95.0, 15.0],
            Some(TextFit::StretchOrShrink),
            Some(TextFit::StretchOrShrink),
        );
        assert_eq!(apply_text_fit(&stretch), [0.0, 0.0, 14.0, 14.0]);
    }

    #[test]
    fn text_fit_restores_content_aspect() {
        let wide = icon(
            Rect { x: 0.0, y: 0.0, w: 100.0, h: 20.0 },
            [5.0, 5.0, 95.0, 15.0],
            Some(TextFit::StretchOnly),
            Some(TextFit::Proportional),
        );
        assert_eq!(apply_text_fit(&wide), [0.0, 0.0, 126.0, 14.0]);

        let tall = icon(
            Rect { x: 0.0, y: 0.0, w: 20.0, h: 100.0 },
            [5.0, 5.0, 15.0, 95.0],
            Some(TextFit::Proportional),
            Some(TextFit::StretchOnly),
        );
        assert_eq!(apply_text_fit(&tall), [0.0, 0.0, 14.0, 126.0]);
    }

    #[test]
    fn icon_is_anchored_and_offset() {
        let image = ImagePosition::new(Rect { x: 0.0, y: 0.0, w: 22.0, h: 12.0 }, 1.0);
        let centered = shape_icon(&image, [0.0, 0.0], TextAnchor::Center);
        assert_eq!((centered.left, centered.top, centered.right, centered.bottom), (-10.0, -5.0, 10.0, 5.0));
        let top_left = shape_icon(&image, [3.0, 4.0], TextAnchor::TopLeft);
        assert_eq!((top_left.left, top_left.top, top_left.right, top_left.bottom), (3.0, 4.0, 23.0, 14.0));
    }

    #[test]
    fn icon_fits_text_with_padding() {
        let image = ImagePosition::new(Rect { x: 0.0, y: 0.0, w: 22.0, h: 22.0 }, 1.0);
        let base = shape_icon(&image, [0.0, 0.0], TextAnchor::Center);
        let text = shape("abcd", &options()).expect("shaped");
        let both = fit_icon_to_text(&base, &text, IconTextFit::Both, [1.0, 2.0, 3.0, 4.0], [0.0, 0.0], 1.0);
        assert_eq!(both.left, text.left - 4.0);
        assert_eq!(both.right, text.right + 2.0);
        assert_eq!(both.top, text.top - 1.0);
        assert_eq!(both.bottom, text.bottom + 3.0);

        let width = fit_icon_to_text(&base, &text, IconTextFit::Width, [0.0; 4], [0.0, 0.0], 0.5);
        assert_eq!(width.left, text.left * 0.5);
        assert!((width.top + 10.0).abs() < 1e-9 && (width.bottom - 10.0).abs() < 1e-9);
        assert_eq!(width.collision_padding, None);
    }
}
