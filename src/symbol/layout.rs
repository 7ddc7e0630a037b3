// Symbol layout: turns a bucket's features into shaped text, icons, anchors and
// collision geometry. Runs once per tile; placement runs every frame afterwards.

use super::anchors::{Anchor, LabelExtent, get_anchors, get_center_anchor};
use super::bucket::{BufferKind, CollisionArrays, SymbolBucket, SymbolInstance, TextCollision};
use super::feature::{GeometryType, SymbolFeature};
use super::glyphs::{GlyphMap, GlyphPositions, ImagePositions, ONE_EM};
use super::quads::{GlyphQuadOptions, get_glyph_quads, get_icon_quads};
use super::script::{allows_letter_spacing, allows_vertical_writing_mode};
use super::shaping::{
    BidiProcessor, PositionedIcon, ShapeOptions, Shaping, TextShaper, WritingMode, fit_icon_to_text, shape_icon,
};
use super::style::{IconTextFit, SymbolPlacement, TextAnchor, TextJustify};
use super::variable_anchor::{
    INVALID_TEXT_OFFSET, evaluate_variable_offset, get_anchor_justification, get_text_variable_anchor_offset,
};
use crate::collision::{FeatureRef, LabelGeometry, LabelGeometryBuilder};
use crate::geometry::{Point, classify_rings, clip_line, find_pole_of_inaccessibility};
use crate::tile::EXTENT;
use crate::warn::warn_once;

/// Metric size that shaped glyph coordinates are expressed in.
const GLYPH_SIZE: f64 = 24.0;

/// Polygon labels stop refining the pole once within this many tile units (2px).
const POLE_PRECISION: f64 = 16.0;

pub const MIXED_SDF_WARNING: &str = "Style sheet warning: Cannot mix SDF and non-SDF icons in one buffer";
pub const TOO_MANY_GLYPHS_WARNING: &str = "Too many glyphs being rendered in a tile.";

/// Glyph and image atlases a bucket is laid out against.
#[derive(Clone, Copy)]
pub struct LayoutResources<'a> {
    pub glyph_map: &'a GlyphMap,
    pub glyph_positions: &'a GlyphPositions,
    pub image_positions: &'a ImagePositions,
    pub bidi: Option<&'a dyn BidiProcessor>,
}

/// Horizontal shapings keyed by justification, in insertion order. The first one
/// stands in for all of them in collision tests.
#[derive(Debug, Default)]
struct ShapedTextOrientations {
    horizontal: Vec<(TextJustify, Shaping)>,
    vertical: Option<Shaping>,
}

impl ShapedTextOrientations {
    fn default_horizontal(&self) -> Option<&Shaping> {
        self.horizontal.first().map(|(_, shaping)| shaping)
    }

    fn has(&self, justify: TextJustify) -> bool {
        self.horizontal.iter().any(|(j, _)| *j == justify)
    }
}

/// Per-feature values shared by every anchor of the feature.
struct FeatureScales {
    text_box_scale: f64,
    text_max_box_scale: f64,
    icon_box_scale: f64,
    text_padding: [f64; 4],
    icon_padding: [f64; 4],
    text_offset: [f64; 2],
    layout_text_size: f64,
}

/// Lays out every feature of `bucket`, appending symbol instances, quads and collision
/// boxes. Builds collision debug records when `show_collision_boxes` is set.
pub fn perform_symbol_layout(bucket: &mut SymbolBucket, resources: LayoutResources<'_>, show_collision_boxes: bool) {
    let mut shaper = TextShaper::new(resources.glyph_map, resources.glyph_positions, resources.image_positions);
    if let Some(bidi) = resources.bidi {
        shaper = shaper.with_bidi(bidi);
    }

    let layout = bucket.layout.clone();
    let font_stack = layout.text_font.join(",");
    let line_height = layout.text_line_height * ONE_EM;
    let text_along_line = layout.text_along_line();
    let variable_anchor_offset = get_text_variable_anchor_offset(&layout);
    let layout_text_size = layout.text_size;

    let features = std::mem::take(&mut bucket.features);
    for feature in &features {
        let mut orientations = ShapedTextOrientations::default();
        let mut text_offset = [0.0, 0.0];

        if let Some(text) = &feature.text {
            let plain = text.plain_text();
            let spacing = if allows_letter_spacing(&plain) {
                layout.text_letter_spacing * ONE_EM
            } else {
                0.0
            };

            if variable_anchor_offset.is_none() {
                text_offset = match layout.text_radial_offset {
                    Some(radial) if radial != 0.0 => {
                        evaluate_variable_offset(layout.text_anchor, [radial * ONE_EM, INVALID_TEXT_OFFSET])
                    }
                    _ => [layout.text_offset[0] * ONE_EM, layout.text_offset[1] * ONE_EM],
                };
            }

            let mut text_justify = if text_along_line {
                TextJustify::Center
            } else {
                layout.text_justify
            };
            let max_width = if layout.symbol_placement == SymbolPlacement::Point {
                layout.text_max_width * ONE_EM
            } else {
                f64::INFINITY
            };

            let options = |anchor: TextAnchor, justify: TextJustify, mode: WritingMode, allow_vertical: bool| ShapeOptions {
                default_font_stack: &font_stack,
                max_width,
                line_height,
                text_anchor: anchor,
                text_justify: justify,
                spacing,
                translate: text_offset,
                writing_mode: mode,
                allow_vertical_placement: allow_vertical,
                layout_text_size,
                layout_text_size_this_zoom: layout_text_size,
            };

            // Vertical point labels are meant for scripts written vertically and stay
            // left-justified.
            let vertical_point_shaping = || {
                if bucket.allow_vertical_placement && allows_vertical_writing_mode(&plain) {
                    shaper.shape_text(
                        text,
                        &options(layout.text_anchor, TextJustify::Left, WritingMode::Vertical, true),
                    )
                } else {
                    None
                }
            };

            match &variable_anchor_offset {
                Some(anchor_offsets) if !text_along_line => {
                    let mut justifications: Vec<TextJustify> = Vec::new();
                    if text_justify == TextJustify::Auto {
                        for (anchor, _) in anchor_offsets {
                            let justify = get_anchor_justification(*anchor);
                            if !justifications.contains(&justify) {
                                justifications.push(justify);
                            }
                        }
                    } else {
                        justifications.push(text_justify);
                    }

                    // Offsets are applied at placement time, so every shaping is centred.
                    let mut single_line = false;
                    for justification in justifications {
                        if orientations.has(justification) {
                            continue;
                        }
                        if single_line {
                            if let Some(first) = orientations.default_horizontal().cloned() {
                                orientations.horizontal.push((justification, first));
                            }
                        } else if let Some(shaping) = shaper.shape_text(
                            text,
                            &options(TextAnchor::Center, justification, WritingMode::Horizontal, false),
                        ) {
                            single_line = shaping.is_single_line();
                            orientations.horizontal.push((justification, shaping));
                        }
                    }
                    orientations.vertical = vertical_point_shaping();
                }
                _ => {
                    if text_justify == TextJustify::Auto {
                        text_justify = get_anchor_justification(layout.text_anchor);
                    }
                    if let Some(shaping) = shaper.shape_text(
                        text,
                        &options(layout.text_anchor, text_justify, WritingMode::Horizontal, false),
                    ) {
                        orientations.horizontal.push((text_justify, shaping));
                    }
                    orientations.vertical = vertical_point_shaping();

                    if allows_vertical_writing_mode(&plain) && text_along_line && layout.text_keep_upright {
                        orientations.vertical = shaper.shape_text(
                            text,
                            &options(layout.text_anchor, text_justify, WritingMode::Vertical, false),
                        );
                    }
                }
            }
        }

        let mut shaped_icon = None;
        let mut is_sdf_icon = false;
        if let Some(image) = feature
            .icon
            .as_deref()
            .and_then(|name| resources.image_positions.get(name))
        {
            shaped_icon = Some(shape_icon(image, layout.icon_offset, layout.icon_anchor));
            is_sdf_icon = image.sdf;
            match bucket.sdf_icons {
                None => bucket.sdf_icons = Some(is_sdf_icon),
                Some(sdf) if sdf != is_sdf_icon => warn_once(MIXED_SDF_WARNING),
                Some(_) => {}
            }
            if image.pixel_ratio != bucket.pixel_ratio || layout.icon_rotate != 0.0 {
                bucket.icons_need_linear = true;
            }
        }

        let shaped_text = orientations.default_horizontal().or(orientations.vertical.as_ref());
        bucket.icons_in_text = shaped_text.is_some_and(|s| s.icons_in_text);
        if shaped_text.is_some() || shaped_icon.is_some() {
            add_feature(
                bucket,
                feature,
                &orientations,
                shaped_icon,
                resources.image_positions,
                text_offset,
                is_sdf_icon,
                layout_text_size,
            );
        }
    }
    bucket.features = features;

    if show_collision_boxes {
        bucket.generate_collision_debug_buffers();
    }
}

/// Adds one symbol instance per anchor the feature's geometry yields.
#[allow(clippy::too_many_arguments)]
fn add_feature(
    bucket: &mut SymbolBucket,
    feature: &SymbolFeature,
    orientations: &ShapedTextOrientations,
    shaped_icon: Option<PositionedIcon>,
    image_positions: &ImagePositions,
    text_offset: [f64; 2],
    is_sdf_icon: bool,
    layout_text_size: f64,
) {
    let layout = &bucket.layout;
    let font_scale = layout_text_size / GLYPH_SIZE;
    let tile_pixel_ratio = bucket.tile_pixel_ratio;
    let text_padding = layout.text_padding * tile_pixel_ratio;
    let scales = FeatureScales {
        text_box_scale: tile_pixel_ratio * font_scale,
        text_max_box_scale: tile_pixel_ratio * layout.text_size / GLYPH_SIZE,
        icon_box_scale: tile_pixel_ratio * layout.icon_size,
        text_padding: [text_padding; 4],
        icon_padding: layout.icon_padding_box(tile_pixel_ratio),
        text_offset,
        layout_text_size,
    };
    let symbol_min_distance = tile_pixel_ratio * layout.symbol_spacing;
    let text_max_angle = layout.text_max_angle.to_radians();
    let text_repeat_distance = symbol_min_distance / 2.0;
    let placement = layout.symbol_placement;

    let default_shaping = orientations.default_horizontal();
    let mut shaped_icon = shaped_icon;
    let mut vertically_shaped_icon = None;
    if layout.icon_text_fit != IconTextFit::None
        && let Some(icon) = shaped_icon.take()
    {
        let fit = |text: &Shaping| {
            fit_icon_to_text(
                &icon,
                text,
                layout.icon_text_fit,
                layout.icon_text_fit_padding,
                layout.icon_offset,
                font_scale,
            )
        };
        if bucket.allow_vertical_placement
            && let Some(vertical) = &orientations.vertical
        {
            vertically_shaped_icon = Some(fit(vertical));
        }
        shaped_icon = Some(match default_shaping {
            Some(shaping) => fit(shaping),
            None => icon.clone(),
        });
    }

    let icon = IconParts {
        horizontal: shaped_icon.as_ref(),
        vertical: vertically_shaped_icon.as_ref(),
        is_sdf: is_sdf_icon,
    };
    let add_at_anchor = |bucket: &mut SymbolBucket, line: &[Point], anchor: Anchor| {
        // Symbols are drawn across tile borders; each anchor belongs to one tile only.
        if anchor.point.x < 0.0 || anchor.point.x >= EXTENT || anchor.point.y < 0.0 || anchor.point.y >= EXTENT {
            return;
        }
        add_symbol(bucket, anchor, line, orientations, &icon, image_positions, feature, &scales);
    };

    let label = LabelExtent {
        text_width: orientations
            .vertical
            .as_ref()
            .or(default_shaping)
            .map(|s| s.right - s.left),
        icon_width: shaped_icon.as_ref().map(|i| i.right - i.left),
    };

    match placement {
        SymbolPlacement::Line => {
            let overscaling = bucket.overscaling;
            for line in clip_line(&feature.geometry, 0.0, 0.0, EXTENT, EXTENT) {
                let anchors = get_anchors(
                    &line,
                    symbol_min_distance,
                    text_max_angle,
                    label,
                    GLYPH_SIZE,
                    scales.text_max_box_scale,
                    overscaling,
                    EXTENT,
                );
                for anchor in anchors {
                    let too_close = default_shaping
                        .is_some_and(|s| anchor_is_too_close(bucket, &s.text, text_repeat_distance, anchor.point));
                    if !too_close {
                        add_at_anchor(bucket, &line, anchor);
                    }
                }
            }
        }
        SymbolPlacement::LineCenter => {
            // Unclipped; one-point lines are skipped as clipping would.
            for line in feature.geometry.iter().filter(|line| line.len() > 1) {
                if let Some(anchor) = get_center_anchor(
                    line,
                    text_max_angle,
                    label,
                    GLYPH_SIZE,
                    scales.text_max_box_scale,
                    None,
                ) {
                    add_at_anchor(bucket, line, anchor);
                }
            }
        }
        SymbolPlacement::Point => match feature.geometry_type {
            GeometryType::Polygon => {
                for polygon in classify_rings(&feature.geometry, 0) {
                    let pole = find_pole_of_inaccessibility(&polygon, POLE_PRECISION);
                    let outer = polygon.first().cloned().unwrap_or_default();
                    add_at_anchor(bucket, &outer, Anchor::new(pole.x, pole.y, 0.0, None));
                }
            }
            GeometryType::Line => {
                for line in &feature.geometry {
                    if let Some(first) = line.first() {
                        add_at_anchor(bucket, line, Anchor::new(first.x, first.y, 0.0, None));
                    }
                }
            }
            GeometryType::Point => {
                for points in &feature.geometry {
                    for point in points {
                        add_at_anchor(bucket, &[*point], Anchor::new(point.x, point.y, 0.0, None));
                    }
                }
            }
        },
    }
}

struct IconParts<'a> {
    horizontal: Option<&'a PositionedIcon>,
    vertical: Option<&'a PositionedIcon>,
    is_sdf: bool,
}

/// Index of the first collision box of `geometry`, if it has one.
fn first_box(geometry: &LabelGeometry) -> Option<usize> {
    geometry.has_box().then_some(geometry.boxes.start)
}

/// Adds a single label and icon placement at `anchor`.
#[allow(clippy::too_many_arguments)]
fn add_symbol(
    bucket: &mut SymbolBucket,
    anchor: Anchor,
    line: &[Point],
    orientations: &ShapedTextOrientations,
    icon: &IconParts<'_>,
    image_positions: &ImagePositions,
    feature: &SymbolFeature,
    scales: &FeatureScales,
) {
    // Features past the glyph capacity are dropped.
    if bucket.glyph_offsets.len() >= bucket.max_glyphs {
        warn_once(TOO_MANY_GLYPHS_WARNING);
        return;
    }

    let text_along_line = bucket.layout.text_along_line();
    let text_rotate = bucket.layout.text_rotate;
    let text_size = bucket.layout.text_size;
    let icon_rotate = bucket.layout.icon_rotate;
    let icon_size = bucket.layout.icon_size;
    let icon_offset = bucket.layout.icon_offset;
    let feature_ref = FeatureRef {
        feature_index: feature.index,
        source_layer_index: feature.source_layer_index,
        bucket_index: bucket.index,
    };
    let line_range = bucket.add_to_line_vertex_array(anchor.point, anchor.segment, line);

    let mut vertical_text_geometry = None;
    let mut vertical_icon_geometry = None;
    if bucket.allow_vertical_placement
        && let Some(vertical) = &orientations.vertical
    {
        let vertical_rotation = text_rotate + 90.0;
        let mut builder = LabelGeometryBuilder::new(&mut bucket.collision_boxes);
        vertical_text_geometry = Some(builder.build(
            anchor.point,
            feature_ref,
            vertical,
            scales.text_box_scale,
            scales.text_padding,
            text_along_line,
            vertical_rotation,
        ));
        if let Some(vertical_icon) = icon.vertical {
            vertical_icon_geometry = Some(builder.build(
                anchor.point,
                feature_ref,
                vertical_icon,
                scales.icon_box_scale,
                scales.icon_padding,
                text_along_line,
                vertical_rotation,
            ));
        }
    }

    // Icons go first so text can point at its icon's placed symbol.
    let mut icon_geometry = None;
    let mut placed_icon = None;
    let mut vertical_placed_icon = None;
    let mut num_icon_vertices = 0;
    let mut num_vertical_icon_vertices = 0;
    if let Some(shaped_icon) = icon.horizontal {
        let icon_quads = get_icon_quads(shaped_icon, icon_rotate, icon.is_sdf);
        let vertical_icon_quads = icon
            .vertical
            .map(|vertical| get_icon_quads(vertical, icon_rotate, icon.is_sdf));
        icon_geometry = Some(LabelGeometryBuilder::new(&mut bucket.collision_boxes).build(
            anchor.point,
            feature_ref,
            shaped_icon,
            scales.icon_box_scale,
            scales.icon_padding,
            false,
            icon_rotate,
        ));

        num_icon_vertices = icon_quads.len() * 4;
        placed_icon = Some(bucket.add_symbols(
            BufferKind::Icon,
            icon_quads,
            icon_size,
            icon_offset,
            WritingMode::None,
            anchor.point,
            anchor.segment,
            line_range.clone(),
            None,
        ));

        if let Some(quads) = vertical_icon_quads {
            num_vertical_icon_vertices = quads.len() * 4;
            vertical_placed_icon = Some(bucket.add_symbols(
                BufferKind::Icon,
                quads,
                icon_size,
                icon_offset,
                WritingMode::Vertical,
                anchor.point,
                anchor.segment,
                line_range.clone(),
                None,
            ));
        }
    }

    let quad_options = GlyphQuadOptions {
        text_offset: scales.text_offset,
        text_rotate,
        along_line: text_along_line,
        allow_vertical_placement: bucket.allow_vertical_placement,
    };
    let horizontal_mode = if orientations.vertical.is_some() {
        WritingMode::Horizontal
    } else {
        WritingMode::HorizontalOnly
    };

    let mut text_geometry = None;
    let mut key = String::new();
    let mut justified: [Option<usize>; 3] = [None; 3];
    let mut num_horizontal_glyph_vertices = 0;
    for (justification, shaping) in &orientations.horizontal {
        if text_geometry.is_none() {
            key = shaping.text.clone();
            text_geometry = Some(LabelGeometryBuilder::new(&mut bucket.collision_boxes).build(
                anchor.point,
                feature_ref,
                shaping,
                scales.text_box_scale,
                scales.text_padding,
                text_along_line,
                text_rotate,
            ));
        }

        let quads = get_glyph_quads(shaping, image_positions, quad_options);
        num_horizontal_glyph_vertices += quads.len() * 4;
        let index = bucket.add_symbols(
            BufferKind::Text,
            quads,
            text_size,
            scales.text_offset,
            horizontal_mode,
            anchor.point,
            anchor.segment,
            line_range.clone(),
            placed_icon,
        );

        // A single line reads the same under every justification.
        if shaping.is_single_line() {
            for (justify, _) in &orientations.horizontal {
                set_justified(&mut justified, *justify, index);
            }
            break;
        }
        set_justified(&mut justified, *justification, index);
    }

    let mut vertical_text = None;
    let mut num_vertical_glyph_vertices = 0;
    if let Some(vertical) = &orientations.vertical {
        let quads = get_glyph_quads(vertical, image_positions, quad_options);
        num_vertical_glyph_vertices = quads.len() * 4;
        vertical_text = Some(bucket.add_symbols(
            BufferKind::Text,
            quads,
            text_size,
            scales.text_offset,
            WritingMode::Vertical,
            anchor.point,
            anchor.segment,
            line_range.clone(),
            vertical_placed_icon,
        ));
    }

    // Circles follow the line at runtime; the tallest part decides their size.
    let circle_diameter = [&text_geometry, &vertical_text_geometry, &icon_geometry, &vertical_icon_geometry]
        .into_iter()
        .flatten()
        .filter_map(|geometry| geometry.circle_diameter)
        .reduce(f64::max);
    let text = match circle_diameter {
        Some(diameter) => TextCollision::Circles {
            diameter: diameter * scales.layout_text_size / ONE_EM,
        },
        None => TextCollision::Boxes {
            horizontal: text_geometry.as_ref().and_then(first_box),
            vertical: vertical_text_geometry.as_ref().and_then(first_box),
        },
    };
    let collision = CollisionArrays {
        text,
        icon: icon_geometry.as_ref().and_then(first_box),
        vertical_icon: vertical_icon_geometry.as_ref().and_then(first_box),
    };

    let symbol_index = bucket.symbol_instances.len();
    if let Some(sort_key) = feature.sort_key {
        bucket.add_to_sort_key_ranges(symbol_index, sort_key);
    }

    let offsets_start = bucket.text_anchor_offsets.len();
    if let Some(offsets) = get_text_variable_anchor_offset(&bucket.layout) {
        bucket.text_anchor_offsets.extend(offsets);
    }
    let text_anchor_offsets = offsets_start..bucket.text_anchor_offsets.len();

    let [left_justified_text, center_justified_text, right_justified_text] = justified;
    bucket.symbol_instances.push(SymbolInstance {
        anchor: anchor.point,
        right_justified_text,
        center_justified_text,
        left_justified_text,
        vertical_text,
        placed_icon,
        vertical_placed_icon,
        key,
        feature_index: feature.index,
        num_horizontal_glyph_vertices,
        num_vertical_glyph_vertices,
        num_icon_vertices,
        num_vertical_icon_vertices,
        collision,
        cross_tile_id: 0,
        text_box_scale: scales.text_box_scale,
        text_anchor_offsets,
    });
}

/// Slots are `[left, center, right]`.
fn set_justified(slots: &mut [Option<usize>; 3], justify: TextJustify, index: usize) {
    let slot = match justify {
        TextJustify::Left => 0,
        TextJustify::Right => 2,
        TextJustify::Center | TextJustify::Auto => 1,
    };
    slots[slot] = Some(index);
}

/// Whether a label with the same text already sits within `repeat_distance` of
/// `anchor`. Anchors that pass are remembered for later checks.
pub fn anchor_is_too_close(bucket: &mut SymbolBucket, text: &str, repeat_distance: f64, anchor: Point) -> bool {
    let others = bucket.compare_text.entry(text.to_string()).or_default();
    if others.iter().rev().any(|other| anchor.dist(*other) < repeat_distance) {
        return true;
    }
    others.push(anchor);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::bucket::BucketOptions;
    use crate::symbol::glyphs::{GlyphMetrics, GlyphPosition, ImagePosition, Rect};
    use crate::symbol::style::{SymbolLayout, SymbolPaint, WritingModeName};
    use crate::tile::OverscaledTileId;
    use std::collections::HashMap;

    const FONT: &str = "Test Regular";

    struct Atlas {
        glyph_map: GlyphMap,
        glyph_positions: GlyphPositions,
        image_positions: ImagePositions,
    }

    impl Atlas {
        fn new() -> Self {
            let mut glyphs = HashMap::new();
            let mut positions = HashMap::new();
            for c in (32u32..127).chain([0x4E2D, 0x6587]) {
                let metrics = GlyphMetrics {
                    width: 14.0,
                    height: 18.0,
                    left: 1.0,
                    top: -4.0,
                    advance: 16.0,
                };
                glyphs.insert(c, metrics);
                positions.insert(
                    c,
                    GlyphPosition {
                        rect: Some(Rect {
                            x: 0.0,
                            y: 0.0,
                            w: 20.0,
                            h: 24.0,
                        }),
                        metrics,
                    },
                );
            }
            let mut image_positions = HashMap::new();
            image_positions.insert(
                "pin".to_string(),
                ImagePosition::new(
                    Rect {
                        x: 0.0,
                        y: 0.0,
                        w: 22.0,
                        h: 22.0,
                    },
                    1.0,
                ),
            );
            Self {
                glyph_map: HashMap::from([(FONT.to_string(), glyphs)]),
                glyph_positions: HashMap::from([(FONT.to_string(), positions)]),
                image_positions,
            }
        }

        fn resources(&self) -> LayoutResources<'_> {
            LayoutResources {
                glyph_map: &self.glyph_map,
                glyph_positions: &self.glyph_positions,
                image_positions: &self.image_positions,
                bidi: None,
            }
        }
    }

    fn layout() -> SymbolLayout {
        SymbolLayout {
            text_font: vec![FONT.to_string()],
            ..SymbolLayout::default()
        }
    }

    fn bucket(layout: SymbolLayout, features: Vec<SymbolFeature>) -> SymbolBucket {
        let options = BucketOptions {
            tile_id: OverscaledTileId::new(0, 0, 0, 0, 0),
            ..BucketOptions::default()
        };
        let mut bucket = SymbolBucket::new(options, layout, SymbolPaint::default());
        bucket.populate(features);
        bucket
    }

    #[test]
    fn point_label_gets_text_box_and_center_symbol() {
        let atlas = Atlas::new();
        let mut bucket = bucket(layout(), vec![SymbolFeature::point(0, 100.0, 100.0).with_text("Cafe")]);
        perform_symbol_layout(&mut bucket, atlas.resources(), false);

        assert_eq!(bucket.symbol_instances.len(), 1);
        let instance = &bucket.symbol_instances[0];
        assert_eq!(instance.key, "Cafe");
        assert!(instance.collision.text_box().is_some());
        assert!(instance.center_justified_text.is_some());
        assert_eq!(instance.num_horizontal_glyph_vertices, 16);
        let placed = &bucket.text.placed_symbols[0];
        assert_eq!(placed.writing_mode, WritingMode::HorizontalOnly);
        assert!(placed.line.is_empty());
    }

    #[test]
    fn anchors_outside_the_tile_are_dropped() {
        let atlas = Atlas::new();
        let mut bucket = bucket(
            layout(),
            vec![
                SymbolFeature::point(0, -1.0, 10.0).with_text("a"),
                SymbolFeature::point(1, EXTENT, 10.0).with_text("b"),
                SymbolFeature::point(2, EXTENT - 1.0, 10.0).with_text("c"),
            ],
        );
        perform_symbol_layout(&mut bucket, atlas.resources(), false);
        let features: Vec<u32> = bucket.symbol_instances.iter().map(|s| s.feature_index).collect();
        assert_eq!(features, vec![2]);
    }

    #[test]
    fn variable_anchors_share_single_line_shaping() {
        let atlas = Atlas::new();
        let layout = SymbolLayout {
            text_variable_anchor: Some(vec![TextAnchor::Left, TextAnchor::Right, TextAnchor::Top]),
            text_justify: TextJustify::Auto,
            ..layout()
        };
        let mut bucket = bucket(layout, vec![SymbolFeature::point(0, 50.0, 50.0).with_text("Pier")]);
        perform_symbol_layout(&mut bucket, atlas.resources(), false);

        let instance = &bucket.symbol_instances[0];
        assert_eq!(bucket.text.placed_symbols.len(), 1);
        assert_eq!(instance.left_justified_text, Some(0));
        assert_eq!(instance.right_justified_text, Some(0));
        assert_eq!(instance.center_justified_text, Some(0));
        assert_eq!(instance.text_anchor_offsets.len(), 3);
    }

    #[test]
    fn features_past_glyph_capacity_are_dropped() {
        let atlas = Atlas::new();
        let options = BucketOptions {
            tile_id: OverscaledTileId::new(0, 0, 0, 0, 0),
            max_glyphs: 4,
            ..BucketOptions::default()
        };
        let mut bucket = SymbolBucket::new(options, layout(), SymbolPaint::default());
        let features = (0..5)
            .map(|i| SymbolFeature::point(i, 100.0 + f64::from(i) * 500.0, 100.0).with_text("Cafe"))
            .collect();
        bucket.populate(features);
        perform_symbol_layout(&mut bucket, atlas.resources(), false);

        assert!(bucket.glyph_offsets.len() <= 4, "{} glyphs", bucket.glyph_offsets.len());
        assert_eq!(bucket.symbol_instances.len(), 1);
        assert_eq!(bucket.text.placed_symbols.len(), 1);
        assert!(crate::warn::was_emitted(TOO_MANY_GLYPHS_WARNING));
    }

    #[test]
    fn line_labels_use_collision_circles() {
        let atlas = Atlas::new();
        let layout = SymbolLayout {
            symbol_placement: SymbolPlacement::Line,
            ..layout()
        };
        let line = (0..=8).map(|i| Point::new(100.0 + f64::from(i) * 500.0, 2000.0)).collect();
        let mut bucket = bucket(layout, vec![SymbolFeature::line(0, line).with_text("Main Street")]);
        perform_symbol_layout(&mut bucket, atlas.resources(), false);

        assert!(!bucket.symbol_instances.is_empty());
        for instance in &bucket.symbol_instances {
            let diameter = instance.collision.circle_diameter().unwrap_or(0.0);
            assert!(diameter >= 10.0 * 16.0 / ONE_EM, "diameter {diameter}");
            assert!(instance.collision.text_box().is_none());
        }
        let placed = &bucket.text.placed_symbols[0];
        assert!(!placed.line.is_empty());
    }

    #[test]
    fn repeated_text_anchors_are_spaced() {
        let mut bucket = bucket(layout(), Vec::new());
        assert!(!anchor_is_too_close(&mut bucket, "a", 50.0, Point::new(0.0, 0.0)));
        assert!(anchor_is_too_close(&mut bucket, "a", 50.0, Point::new(30.0, 0.0)));
        assert!(!anchor_is_too_close(&mut bucket, "b", 50.0, Point::new(30.0, 0.0)));
        assert!(!anchor_is_too_close(&mut bucket, "a", 50.0, Point::new(60.0, 0.0)));
    }

    #[test]
    fn icon_and_vertical_text_for_cjk_point_label() {
        let atlas = Atlas::new();
        let layout = SymbolLayout {
            text_writing_mode: vec![WritingModeName::Horizontal, WritingModeName::Vertical],
            icon_image: Some("pin".to_string()),
            ..layout()
        };
        let mut bucket = bucket(layout, vec![SymbolFeature::point(0, 10.0, 10.0).with_text("中文")]);
        perform_symbol_layout(&mut bucket, atlas.resources(), true);

        let instance = &bucket.symbol_instances[0];
        assert!(instance.vertical_text.is_some());
        assert!(instance.collision.vertical_text_box().is_some());
        assert_eq!(instance.placed_icon, Some(0));
        assert_eq!(bucket.text.placed_symbols[0].writing_mode, WritingMode::Horizontal);
        assert_eq!(bucket.text.placed_symbols[0].associated_icon_index, Some(0));
        assert_eq!(bucket.sdf_icons, Some(false));
        let debug = bucket.collision_debug.as_ref().map(|d| d.boxes.len());
        assert_eq!(debug, Some(3));
    }

    #[test]
    fn polygon_label_sits_inside() {
        let atlas = Atlas::new();
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(400.0, 0.0),
            Point::new(400.0, 400.0),
            Point::new(0.0, 400.0),
            Point::new(0.0, 0.0),
        ];
        let feature = SymbolFeature {
            geometry_type: GeometryType::Polygon,
            geometry: vec![ring],
            ..SymbolFeature::point(0, 0.0, 0.0).with_text("Park")
        };
        let mut bucket = bucket(layout(), vec![feature]);
        perform_symbol_layout(&mut bucket, atlas.resources(), false);
        let anchor = bucket.symbol_instances[0].anchor;
        assert!(anchor.dist(Point::new(200.0, 200.0)) < 20.0, "{anchor:?}");
    }
}
