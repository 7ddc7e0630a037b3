use super::glyphs::{GLYPH_PBF_BORDER, IMAGE_PADDING, ImagePositions, ONE_EM, Rect};
use super::shaping::{PositionedIcon, SHAPING_DEFAULT_OFFSET, Shaping, WritingMode};
use crate::geometry::Point;
use serde::Serialize;

/// Four corners of a glyph or icon, relative to the label anchor, plus its atlas rect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolQuad {
    pub tl: Point,
    pub tr: Point,
    pub bl: Point,
    pub br: Point,
    pub tex: Rect,
    pub writing_mode: Option<WritingMode>,
    /// Offset along the line for glyphs that follow a line; zero otherwise.
    pub glyph_offset: [f64; 2],
    pub is_sdf: bool,
    pub section_index: usize,
}

impl SymbolQuad {
    pub fn corners(&self) -> [Point; 4] {
        [self.tl, self.tr, self.br, self.bl]
    }
}

/// Builds the quad for a shaped icon, rotated by `icon_rotate` degrees.
///
/// The quad covers the atlas padding too, scaled so that the padding keeps
/// its on-screen size when the icon has been stretched by icon-text-fit.
pub fn get_icon_quads(shaped_icon: &PositionedIcon, icon_rotate: f64, is_sdf_icon: bool) -> Vec<SymbolQuad> {
    let image = &shaped_icon.image;
    let pixel_ratio = if image.pixel_ratio > 0.0 { image.pixel_ratio } else { 1.0 };
    let [display_width, display_height] = image.display_size();

    let icon_width = shaped_icon.right - shaped_icon.left;
    let icon_height = shaped_icon.bottom - shaped_icon.top;
    let pad = IMAGE_PADDING / pixel_ratio;
    let pad_x = if display_width > 0.0 { pad * icon_width / display_width } else { pad };
    let pad_y = if display_height > 0.0 { pad * icon_height / display_height } else { pad };

    let x1 = shaped_icon.left - pad_x;
    let y1 = shaped_icon.top - pad_y;
    let x2 = shaped_icon.right + pad_x;
    let y2 = shaped_icon.bottom + pad_y;

    let mut corners = [
        Point::new(x1, y1),
        Point::new(x2, y1),
        Point::new(x1, y2),
        Point::new(x2, y2),
    ];
    if icon_rotate != 0.0 {
        let angle = icon_rotate.to_radians();
        for corner in &mut corners {
            *corner = corner.rotate(angle);
        }
    }
    let [tl, tr, bl, br] = corners;

    vec![SymbolQuad {
        tl,
        tr,
        bl,
        br,
        tex: image.padded_rect,
        writing_mode: None,
        glyph_offset: [0.0, 0.0],
        is_sdf: is_sdf_icon,
        section_index: 0,
    }]
}

/// Options for [`get_glyph_quads`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphQuadOptions {
    /// Offset applied to point labels, in glyph-metric units.
    pub text_offset: [f64; 2],
    /// `text-rotate` in degrees.
    pub text_rotate: f64,
    pub along_line: bool,
    pub allow_vertical_placement: bool,
}

/// One quad per positioned glyph that has an atlas rect.
pub fn get_glyph_quads(
    shaping: &Shaping,
    image_positions: &ImagePositions,
    options: GlyphQuadOptions,
) -> Vec<SymbolQuad> {
    let text_rotate = options.text_rotate.to_radians();
    let mut quads = Vec::with_capacity(shaping.glyph_count());

    for line in &shaping.positioned_lines {
        for glyph in &line.positioned_glyphs {
            let Some(rect) = glyph.rect else {
                continue;
            };

            let mut rect_buffer = GLYPH_PBF_BORDER + 1.0;
            let mut is_sdf = true;
            let mut pixel_ratio = 1.0;
            let mut line_offset = 0.0;

            let rotate_vertical_glyph =
                (options.along_line || options.allow_vertical_placement) && glyph.vertical;
            let half_advance = glyph.metrics.advance * glyph.scale / 2.0;

            if options.allow_vertical_placement && shaping.verticalizable {
                let scaled_glyph_offset = (glyph.scale - 1.0) * ONE_EM;
                let image_offset = (ONE_EM - glyph.metrics.width * glyph.scale) / 2.0;
                line_offset = line.line_offset / 2.0
                    - if glyph.image_name.is_some() {
                        -image_offset
                    } else {
                        scaled_glyph_offset
                    };
            }

            if let Some(image) = glyph
                .image_name
                .as_deref()
                .and_then(|name| image_positions.get(name))
            {
                is_sdf = image.sdf;
                pixel_ratio = if image.pixel_ratio > 0.0 { image.pixel_ratio } else { 1.0 };
                rect_buffer = IMAGE_PADDING / pixel_ratio;
            }

            let glyph_offset = if options.along_line {
                [glyph.x + half_advance, glyph.y]
            } else {
                [0.0, 0.0]
            };
            let mut built_in_offset = if options.along_line {
                [0.0, 0.0]
            } else {
                [
                    glyph.x + half_advance + options.text_offset[0],
                    glyph.y + options.text_offset[1] - line_offset,
                ]
            };
            let mut verticalized_offset = [0.0, 0.0];
            if rotate_vertical_glyph {
                verticalized_offset = built_in_offset;
                built_in_offset = [0.0, 0.0];
            }

            let x1 = (glyph.metrics.left - rect_buffer) * glyph.scale - half_advance + built_in_offset[0];
            let y1 = (-glyph.metrics.top - rect_buffer) * glyph.scale + built_in_offset[1];
            let x2 = x1 + rect.w * glyph.scale / pixel_ratio;
            let y2 = y1 + rect.h * glyph.scale / pixel_ratio;

            let mut corners = [
                Point::new(x1, y1),
                Point::new(x2, y1),
                Point::new(x1, y2),
                Point::new(x2, y2),
            ];

            if rotate_vertical_glyph {
                // Rotate a quarter turn around the glyph centre, then shift back onto
                // the vertical baseline.
                let center = Point::new(-half_advance, half_advance - SHAPING_DEFAULT_OFFSET);
                let x_half_width_correction = ONE_EM / 2.0 - half_advance;
                let y_image_correction = if glyph.image_name.is_some() {
                    x_half_width_correction
                } else {
                    0.0
                };
                let correction = Point::new(
                    5.0 - SHAPING_DEFAULT_OFFSET - x_half_width_correction,
                    -y_image_correction,
                ) + Point::new(verticalized_offset[0], verticalized_offset[1]);
                for corner in &mut corners {
                    *corner = rotate_around(*corner, -std::f64::consts::FRAC_PI_2, center) + correction;
                }
            }

            if text_rotate != 0.0 {
                for corner in &mut corners {
                    *corner = corner.rotate(text_rotate);
                }
            }

            let [tl, tr, bl, br] = corners;
            quads.push(SymbolQuad {
                tl,
                tr,
                bl,
                br,
                tex: rect,
                writing_mode: Some(shaping.writing_mode),
                glyph_offset,
                is_sdf,
                section_index: glyph.section_index,
            });
        }
    }

    quads
}

fn rotate_around(point: Point, angle: f64, center: Point) -> Point {
    (point - center).rotate(angle) + center
}
