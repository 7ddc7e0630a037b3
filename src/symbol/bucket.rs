// Per tile/layer storage of laid-out symbols: placed glyph and icon runs, collision
// geometry and the symbol instances the placement pass iterates over.

use super::feature::SymbolFeature;
use super::merge_lines::merge_lines;
use super::quads::SymbolQuad;
use super::shaping::WritingMode;
use super::style::{SymbolLayout, SymbolPaint, SymbolPlacement, SymbolZOrder, TextAnchor, WritingModeName};
use crate::collision::{CollisionBox, OverlapMode};
use crate::geometry::{Point, round_half_up};
use crate::tile::{EXTENT, OverscaledTileId, TILE_SIZE};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

/// Glyph capacity of one bucket unless configured otherwise.
pub const DEFAULT_MAX_GLYPHS: usize = 65535;

/// One run of glyph or icon quads sharing an anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedSymbol {
    pub anchor: Point,
    pub segment: Option<usize>,
    /// Range into the bucket's glyph offsets, one entry per quad.
    pub glyphs: Range<usize>,
    /// Range into the owning buffers' quads.
    pub quads: Range<usize>,
    /// Range into the bucket's line vertices; empty for point anchors.
    pub line: Range<usize>,
    pub font_size: f64,
    pub line_offset: [f64; 2],
    pub writing_mode: WritingMode,
    /// Orientation chosen at placement; `None` until placed.
    pub placed_orientation: WritingMode,
    pub hidden: bool,
    /// Only set on the justification that is in use; 0 hides the others.
    pub cross_tile_id: u32,
    pub associated_icon_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineVertex {
    pub point: Point,
    pub tile_unit_distance_from_anchor: f64,
}

/// Geometry and per-quad opacity of either the text or the icon half of a bucket.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolBuffers {
    pub quads: Vec<SymbolQuad>,
    pub placed_symbols: Vec<PlacedSymbol>,
    /// One packed opacity per quad, rebuilt by every opacity update.
    pub opacity_vertices: Vec<u32>,
    pub has_visible_vertices: bool,
    /// Placed symbol indices in the order they are drawn.
    pub draw_order: Vec<usize>,
}

impl SymbolBuffers {
    pub fn has_data(&self) -> bool {
        !self.placed_symbols.is_empty()
    }

    pub(crate) fn clear_opacities(&mut self) {
        self.opacity_vertices.clear();
        self.has_visible_vertices = false;
    }

    pub(crate) fn add_opacities(&mut self, num_vertices: usize, opacity: u32, hidden_opacity: u32) {
        for _ in 0..num_vertices / 4 {
            self.opacity_vertices.push(opacity);
        }
        self.has_visible_vertices = self.has_visible_vertices || opacity != hidden_opacity;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Text,
    Icon,
}

/// Text collision geometry of an instance: point labels test boxes, labels following
/// a line are approximated at placement time by a chain of circles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextCollision {
    Boxes {
        horizontal: Option<usize>,
        vertical: Option<usize>,
    },
    /// Circle diameter in pixels at the layout text size.
    Circles { diameter: f64 },
}

/// Collision geometry of one symbol instance. Box fields index the bucket's
/// collision box array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionArrays {
    pub text: TextCollision,
    pub icon: Option<usize>,
    pub vertical_icon: Option<usize>,
}

impl CollisionArrays {
    pub fn text_box(&self) -> Option<usize> {
        match self.text {
            TextCollision::Boxes { horizontal, .. } => horizontal,
            TextCollision::Circles { .. } => None,
        }
    }

    pub fn vertical_text_box(&self) -> Option<usize> {
        match self.text {
            TextCollision::Boxes { vertical, .. } => vertical,
            TextCollision::Circles { .. } => None,
        }
    }

    pub fn circle_diameter(&self) -> Option<f64> {
        match self.text {
            TextCollision::Circles { diameter } => Some(diameter),
            TextCollision::Boxes { .. } => None,
        }
    }
}

/// One candidate placement of a feature at one anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInstance {
    pub anchor: Point,
    pub right_justified_text: Option<usize>,
    pub center_justified_text: Option<usize>,
    pub left_justified_text: Option<usize>,
    pub vertical_text: Option<usize>,
    pub placed_icon: Option<usize>,
    pub vertical_placed_icon: Option<usize>,
    /// Shaped text, used to key duplicate detection.
    pub key: String,
    pub feature_index: u32,
    pub num_horizontal_glyph_vertices: usize,
    pub num_vertical_glyph_vertices: usize,
    pub num_icon_vertices: usize,
    pub num_vertical_icon_vertices: usize,
    pub collision: CollisionArrays,
    /// Assigned upstream; 0 means unassigned.
    pub cross_tile_id: u32,
    pub text_box_scale: f64,
    /// Range into the bucket's variable anchor offsets; empty without variable anchors.
    pub text_anchor_offsets: Range<usize>,
}

impl SymbolInstance {
    pub fn use_runtime_collision_circles(&self) -> bool {
        self.collision.circle_diameter().is_some()
    }

    pub fn has_text(&self) -> bool {
        self.num_horizontal_glyph_vertices > 0 || self.num_vertical_glyph_vertices > 0
    }

    /// Horizontal text runs in `[left, center, right]` order.
    pub fn horizontal_text_indexes(&self) -> [Option<usize>; 3] {
        [
            self.left_justified_text,
            self.center_justified_text,
            self.right_justified_text,
        ]
    }
}

/// Consecutive symbol instances sharing a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKeyRange {
    pub sort_key: f64,
    pub symbol_instance_start: usize,
    pub symbol_instance_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugBoxKind {
    Text,
    Icon,
}

/// Debug record of one collision box, refreshed by every opacity update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionDebugBox {
    pub symbol_index: usize,
    pub kind: DebugBoxKind,
    pub vertical: bool,
    pub anchor: Point,
    /// Tile-space extent relative to the anchor.
    pub extent: [f64; 4],
    pub placed: bool,
    pub not_used: bool,
    pub shift: Point,
    /// Viewport box last tested for the symbol.
    pub viewport_box: [f64; 4],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionDebug {
    pub boxes: Vec<CollisionDebugBox>,
    #[serde(skip)]
    by_symbol: Vec<Range<usize>>,
}

impl CollisionDebug {
    pub fn has_boxes(&self, kind: DebugBoxKind) -> bool {
        self.boxes.iter().any(|b| b.kind == kind)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update(
        &mut self,
        symbol_index: usize,
        kind: DebugBoxKind,
        vertical: bool,
        placed: bool,
        not_used: bool,
        viewport_box: [f64; 4],
        shift: Point,
    ) {
        let Some(range) = self.by_symbol.get(symbol_index).cloned() else {
            return;
        };
        for entry in &mut self.boxes[range] {
            if entry.kind == kind && entry.vertical == vertical {
                entry.placed = placed;
                entry.not_used = not_used;
                entry.viewport_box = viewport_box;
                entry.shift = shift;
            }
        }
    }
}

/// Collision circle handed back by placement for debug drawing, in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DebugCircle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub collision: bool,
}

/// Identity of a bucket within its tile and source.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketOptions {
    pub index: u32,
    pub source_layer_index: u32,
    pub layer_id: String,
    pub source_id: String,
    pub tile_id: OverscaledTileId,
    pub pixel_ratio: f64,
    pub max_glyphs: usize,
    /// Join touching line parts that carry the same text before anchoring.
    pub merge_lines: bool,
}

impl Default for BucketOptions {
    fn default() -> Self {
        Self {
            index: 0,
            source_layer_index: 0,
            layer_id: String::new(),
            source_id: String::new(),
            tile_id: OverscaledTileId::new(0, 0, 0, 0, 0),
            pixel_ratio: 1.0,
            max_glyphs: DEFAULT_MAX_GLYPHS,
            merge_lines: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolBucket {
    /// Unique across loaded buckets; 0 means unassigned.
    pub bucket_instance_id: u32,
    pub index: u32,
    pub source_layer_index: u32,
    pub layer_id: String,
    pub source_id: String,
    pub tile_id: OverscaledTileId,
    pub zoom: f64,
    pub overscaling: f64,
    pub pixel_ratio: f64,
    pub tile_pixel_ratio: f64,
    pub layout: SymbolLayout,
    pub paint: SymbolPaint,
    /// Orientations to try, in order, for point labels.
    pub writing_modes: Vec<WritingMode>,
    pub allow_vertical_placement: bool,
    pub sdf_icons: Option<bool>,
    pub icons_need_linear: bool,
    pub icons_in_text: bool,
    pub just_reloaded: bool,
    /// Set while the owning tile waits for labels of the tile it replaces to fade out.
    pub holding_for_fade: bool,
    pub max_glyphs: usize,
    merge_lines: bool,

    pub features: Vec<SymbolFeature>,
    pub text: SymbolBuffers,
    pub icon: SymbolBuffers,
    pub glyph_offsets: Vec<f64>,
    pub line_vertices: Vec<LineVertex>,
    pub collision_boxes: Vec<CollisionBox>,
    pub symbol_instances: Vec<SymbolInstance>,
    pub text_anchor_offsets: Vec<(TextAnchor, Point)>,
    pub sort_key_ranges: Vec<SortKeyRange>,
    pub(crate) compare_text: HashMap<String, Vec<Point>>,

    pub can_overlap: bool,
    pub sort_features_by_key: bool,
    pub sort_features_by_y: bool,
    sorted_angle: Option<f64>,
    symbol_instance_indexes: Vec<usize>,
    pub feature_sort_order: Vec<u32>,

    pub collision_debug: Option<CollisionDebug>,
    pub collision_circles: Vec<DebugCircle>,
}

impl SymbolBucket {
    pub fn new(options: BucketOptions, layout: SymbolLayout, paint: SymbolPaint) -> Self {
        let layout = layout.resolved();
        let overscaling = options.tile_id.overscale_factor();

        let can_overlap = layout.text_overlap_mode() != OverlapMode::Never
            || layout.icon_overlap_mode() != OverlapMode::Never
            || layout.text_ignore_placement
            || layout.icon_ignore_placement;

        let writing_modes: Vec<WritingMode> = if layout.symbol_placement == SymbolPlacement::Point {
            layout
                .text_writing_mode
                .iter()
                .map(|mode| match mode {
                    WritingModeName::Horizontal => WritingMode::Horizontal,
                    WritingModeName::Vertical => WritingMode::Vertical,
                })
                .collect()
        } else {
            Vec::new()
        };
        let allow_vertical_placement = writing_modes.contains(&WritingMode::Vertical);

        let mut bucket = Self {
            bucket_instance_id: 0,
            index: options.index,
            source_layer_index: options.source_layer_index,
            layer_id: options.layer_id,
            source_id: options.source_id,
            tile_id: options.tile_id,
            zoom: f64::from(options.tile_id.overscaled_z),
            overscaling,
            pixel_ratio: options.pixel_ratio,
            tile_pixel_ratio: EXTENT / (TILE_SIZE * overscaling),
            layout,
            paint,
            writing_modes,
            allow_vertical_placement,
            sdf_icons: None,
            icons_need_linear: false,
            icons_in_text: false,
            just_reloaded: false,
            holding_for_fade: false,
            max_glyphs: options.max_glyphs,
            merge_lines: options.merge_lines,
            features: Vec::new(),
            text: SymbolBuffers::default(),
            icon: SymbolBuffers::default(),
            glyph_offsets: Vec::new(),
            line_vertices: Vec::new(),
            collision_boxes: Vec::new(),
            symbol_instances: Vec::new(),
            text_anchor_offsets: Vec::new(),
            sort_key_ranges: Vec::new(),
            compare_text: HashMap::new(),
            can_overlap,
            sort_features_by_key: false,
            sort_features_by_y: false,
            sorted_angle: None,
            symbol_instance_indexes: Vec::new(),
            feature_sort_order: Vec::new(),
            collision_debug: None,
            collision_circles: Vec::new(),
        };
        bucket.update_sort_flags();
        bucket
    }

    fn update_sort_flags(&mut self) {
        let z_order = self.layout.symbol_z_order;
        let by_viewport_y = z_order == SymbolZOrder::ViewportY
            || (z_order == SymbolZOrder::Auto && !self.sort_features_by_key);
        self.sort_features_by_y = by_viewport_y && self.can_overlap;
    }

    /// Takes the features of this layer, resolving text transforms, default icons and
    /// sort keys. Features with neither text nor icon are dropped.
    pub fn populate(&mut self, features: Vec<SymbolFeature>) {
        let data_driven_sort_key = features.iter().any(|f| f.sort_key.is_some());
        self.sort_features_by_key =
            self.layout.symbol_z_order != SymbolZOrder::ViewportY && data_driven_sort_key;
        self.update_sort_flags();

        let mut kept = Vec::with_capacity(features.len());
        for mut feature in features {
            if let Some(text) = feature.text.as_mut() {
                for section in &mut text.sections {
                    if section.image.is_none() {
                        section.text = self.layout.text_transform.apply(&section.text);
                    }
                }
            }
            if feature.text.as_ref().is_some_and(|text| text.is_empty()) {
                feature.text = None;
            }
            if feature.icon.is_none() {
                feature.icon = self.layout.icon_image.clone();
            }
            if feature.text.is_none() && feature.icon.is_none() {
                continue;
            }
            feature.sort_key = if self.sort_features_by_key {
                Some(feature.sort_key.or(self.layout.symbol_sort_key).unwrap_or(0.0))
            } else {
                None
            };
            kept.push(feature);
        }

        if self.merge_lines && self.layout.symbol_placement == SymbolPlacement::Line {
            kept = merge_lines(kept);
        }
        if self.sort_features_by_key {
            kept.sort_by(|a, b| {
                a.sort_key
                    .unwrap_or(0.0)
                    .total_cmp(&b.sort_key.unwrap_or(0.0))
            });
        }
        self.features = kept;
    }

    pub fn has_text_data(&self) -> bool {
        self.text.has_data()
    }

    pub fn has_icon_data(&self) -> bool {
        self.icon.has_data()
    }

    pub fn has_debug_data(&self) -> bool {
        self.collision_debug.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol_instances.is_empty()
    }

    pub fn buffers(&self, kind: BufferKind) -> &SymbolBuffers {
        match kind {
            BufferKind::Text => &self.text,
            BufferKind::Icon => &self.icon,
        }
    }

    fn buffers_mut(&mut self, kind: BufferKind) -> &mut SymbolBuffers {
        match kind {
            BufferKind::Text => &mut self.text,
            BufferKind::Icon => &mut self.icon,
        }
    }

    /// Copies `line` with each vertex's distance from the anchor along the line.
    /// Point anchors store no vertices.
    pub(crate) fn add_to_line_vertex_array(&mut self, anchor_point: Point, segment: Option<usize>, line: &[Point]) -> Range<usize> {
        let start = self.line_vertices.len();
        let Some(segment) = segment.filter(|s| s + 1 < line.len()) else {
            return start..start;
        };

        let mut distances = vec![0.0; line.len()];
        let mut forward = anchor_point.dist(line[segment + 1]);
        for i in segment + 1..line.len() {
            distances[i] = forward;
            if i + 1 < line.len() {
                forward += line[i + 1].dist(line[i]);
            }
        }
        let mut backward = anchor_point.dist(line[segment]);
        for i in (0..=segment).rev() {
            distances[i] = backward;
            if i > 0 {
                backward += line[i - 1].dist(line[i]);
            }
        }

        self.line_vertices.extend(line.iter().zip(distances).map(|(point, distance)| LineVertex {
            point: *point,
            tile_unit_distance_from_anchor: distance,
        }));
        start..self.line_vertices.len()
    }

    /// Appends a run of quads and returns the index of its placed symbol.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_symbols(
        &mut self,
        kind: BufferKind,
        quads: Vec<SymbolQuad>,
        font_size: f64,
        line_offset: [f64; 2],
        writing_mode: WritingMode,
        anchor_point: Point,
        segment: Option<usize>,
        line: Range<usize>,
        associated_icon_index: Option<usize>,
    ) -> usize {
        let glyph_start = self.glyph_offsets.len();
        self.glyph_offsets.extend(quads.iter().map(|quad| quad.glyph_offset[0]));
        let glyphs = glyph_start..self.glyph_offsets.len();

        let buffers = self.buffers_mut(kind);
        let quad_start = buffers.quads.len();
        buffers.quads.extend(quads);
        let index = buffers.placed_symbols.len();
        buffers.placed_symbols.push(PlacedSymbol {
            anchor: anchor_point,
            segment,
            glyphs,
            quads: quad_start..buffers.quads.len(),
            line,
            font_size,
            line_offset,
            writing_mode,
            placed_orientation: WritingMode::None,
            hidden: false,
            cross_tile_id: 0,
            associated_icon_index,
        });
        buffers.draw_order.push(index);
        index
    }

    pub(crate) fn add_to_sort_key_ranges(&mut self, symbol_instance_index: usize, sort_key: f64) {
        if let Some(last) = self.sort_key_ranges.last_mut()
            && last.sort_key == sort_key
        {
            last.symbol_instance_end = symbol_instance_index + 1;
            return;
        }
        self.sort_key_ranges.push(SortKeyRange {
            sort_key,
            symbol_instance_start: symbol_instance_index,
            symbol_instance_end: symbol_instance_index + 1,
        });
    }

    /// Builds one debug record per collision box of every instance.
    pub fn generate_collision_debug_buffers(&mut self) {
        let mut debug = CollisionDebug::default();
        for (symbol_index, instance) in self.symbol_instances.iter().enumerate() {
            let start = debug.boxes.len();
            let boxes = [
                (instance.collision.text_box(), DebugBoxKind::Text, false),
                (instance.collision.vertical_text_box(), DebugBoxKind::Text, true),
                (instance.collision.icon, DebugBoxKind::Icon, false),
                (instance.collision.vertical_icon, DebugBoxKind::Icon, true),
            ];
            for (index, kind, vertical) in boxes {
                let Some(b) = index.and_then(|i| self.collision_boxes.get(i)) else {
                    continue;
                };
                debug.boxes.push(CollisionDebugBox {
                    symbol_index,
                    kind,
                    vertical,
                    anchor: b.anchor,
                    extent: [b.x1, b.y1, b.x2, b.y2],
                    placed: false,
                    not_used: false,
                    shift: Point::default(),
                    viewport_box: [0.0; 4],
                });
            }
            debug.by_symbol.push(start..debug.boxes.len());
        }
        self.collision_debug = Some(debug);
    }

    /// Instance indexes ordered by their anchor's y once rotated by `angle`, with ties
    /// drawn in reverse feature order.
    pub fn get_sorted_symbol_indexes(&self, angle: f64) -> Vec<usize> {
        if self.sorted_angle == Some(angle) && !self.symbol_instance_indexes.is_empty() {
            return self.symbol_instance_indexes.clone();
        }
        let (sin, cos) = angle.sin_cos();
        let rotated_ys: Vec<i64> = self
            .symbol_instances
            .iter()
            .map(|instance| round_half_up(sin * instance.anchor.x + cos * instance.anchor.y) as i64)
            .collect();

        let mut result: Vec<usize> = (0..self.symbol_instances.len()).collect();
        result.sort_by(|&a, &b| {
            rotated_ys[a].cmp(&rotated_ys[b]).then_with(|| {
                self.symbol_instances[b]
                    .feature_index
                    .cmp(&self.symbol_instances[a].feature_index)
            })
        });
        result
    }

    /// Rewrites draw order so that overlapping labels stack by screen y.
    pub fn sort_features(&mut self, angle: f64) {
        if !self.sort_features_by_y || self.sorted_angle == Some(angle) {
            return;
        }

        self.symbol_instance_indexes = self.get_sorted_symbol_indexes(angle);
        self.sorted_angle = Some(angle);

        self.text.draw_order.clear();
        self.icon.draw_order.clear();
        self.feature_sort_order.clear();

        for &i in &self.symbol_instance_indexes {
            let instance = &self.symbol_instances[i];
            self.feature_sort_order.push(instance.feature_index);

            // Justifications sharing glyphs are drawn once.
            let justified = [
                instance.right_justified_text,
                instance.center_justified_text,
                instance.left_justified_text,
            ];
            for (position, index) in justified.iter().enumerate() {
                if let Some(index) = index
                    && !justified[..position].contains(&Some(*index))
                {
                    self.text.draw_order.push(*index);
                }
            }
            if let Some(index) = instance.vertical_text {
                self.text.draw_order.push(index);
            }
            if let Some(index) = instance.placed_icon {
                self.icon.draw_order.push(index);
            }
            if let Some(index) = instance.vertical_placed_icon {
                self.icon.draw_order.push(index);
            }
        }
    }

    pub fn sorted_angle(&self) -> Option<f64> {
        self.sorted_angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(x: f64, y: f64, feature_index: u32) -> SymbolInstance {
        SymbolInstance {
            anchor: Point::new(x, y),
            right_justified_text: None,
            center_justified_text: None,
            left_justified_text: None,
            vertical_text: None,
            placed_icon: None,
            vertical_placed_icon: None,
            key: String::new(),
            feature_index,
            num_horizontal_glyph_vertices: 0,
            num_vertical_glyph_vertices: 0,
            num_icon_vertices: 0,
            num_vertical_icon_vertices: 0,
            collision: CollisionArrays {
                text: TextCollision::Boxes {
                    horizontal: None,
                    vertical: None,
                },
                icon: None,
                vertical_icon: None,
            },
            cross_tile_id: 0,
            text_box_scale: 1.0,
            text_anchor_offsets: 0..0,
        }
    }

    fn overlapping_bucket() -> SymbolBucket {
        let layout = SymbolLayout {
            text_allow_overlap: true,
            ..SymbolLayout::default()
        };
        SymbolBucket::new(BucketOptions::default(), layout, SymbolPaint::default())
    }

    #[test]
    fn tile_pixel_ratio_follows_overscaling() {
        let options = BucketOptions {
            tile_id: OverscaledTileId::new(3, 0, 2, 1, 1),
            ..BucketOptions::default()
        };
        let bucket = SymbolBucket::new(options, SymbolLayout::default(), SymbolPaint::default());
        assert_eq!(bucket.overscaling, 2.0);
        assert_eq!(bucket.tile_pixel_ratio, EXTENT / 1024.0);
    }

    #[test]
    fn sort_flags_depend_on_overlap_and_keys() {
        let bucket = SymbolBucket::new(BucketOptions::default(), SymbolLayout::default(), SymbolPaint::default());
        assert!(!bucket.can_overlap);
        assert!(!bucket.sort_features_by_y);

        let mut bucket = overlapping_bucket();
        assert!(bucket.sort_features_by_y);

        bucket.populate(vec![
            SymbolFeature::point(0, 1.0, 1.0).with_text("b"),
            SymbolFeature {
                sort_key: Some(-1.0),
                ..SymbolFeature::point(1, 2.0, 2.0).with_text("a")
            },
        ]);
        assert!(bucket.sort_features_by_key);
        assert!(!bucket.sort_features_by_y);
        let order: Vec<u32> = bucket.features.iter().map(|f| f.index).collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn populate_drops_empty_features_and_applies_transform() {
        let layout = SymbolLayout {
            text_transform: super::super::style::TextTransform::Uppercase,
            ..SymbolLayout::default()
        };
        let mut bucket = SymbolBucket::new(BucketOptions::default(), layout, SymbolPaint::default());
        bucket.populate(vec![
            SymbolFeature::point(0, 1.0, 1.0).with_text("main st"),
            SymbolFeature::point(1, 2.0, 2.0).with_text(""),
            SymbolFeature::point(2, 3.0, 3.0),
        ]);
        assert_eq!(bucket.features.len(), 1);
        assert_eq!(bucket.features[0].text_key().as_deref(), Some("MAIN ST"));
    }

    #[test]
    fn sort_key_ranges_merge_equal_neighbours() {
        let mut bucket = overlapping_bucket();
        bucket.add_to_sort_key_ranges(0, 1.0);
        bucket.add_to_sort_key_ranges(1, 1.0);
        bucket.add_to_sort_key_ranges(2, 3.0);
        bucket.add_to_sort_key_ranges(3, 1.0);
        let ranges: Vec<(f64, usize, usize)> = bucket
            .sort_key_ranges
            .iter()
            .map(|r| (r.sort_key, r.symbol_instance_start, r.symbol_instance_end))
            .collect();
        assert_eq!(ranges, vec![(1.0, 0, 2), (3.0, 2, 3), (1.0, 3, 4)]);
    }

    #[test]
    fn line_vertices_measure_from_anchor() {
        let mut bucket = overlapping_bucket();
        let line = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 0.0),
        ];
        let range = bucket.add_to_line_vertex_array(Point::new(15.0, 0.0), Some(1), &line);
        let distances: Vec<f64> = bucket.line_vertices[range]
            .iter()
            .map(|v| v.tile_unit_distance_from_anchor)
            .collect();
        assert_eq!(distances, vec![15.0, 5.0, 5.0, 15.0]);

        let empty = bucket.add_to_line_vertex_array(Point::new(1.0, 1.0), None, &line);
        assert!(empty.is_empty());
    }

    #[test]
    fn sorted_indexes_follow_rotated_y_then_reverse_feature_order() {
        let mut bucket = overlapping_bucket();
        bucket.symbol_instances = vec![
            instance(0.0, 30.0, 0),
            instance(0.0, 10.0, 1),
            instance(5.0, 10.0, 2),
        ];
        assert_eq!(bucket.get_sorted_symbol_indexes(0.0), vec![2, 1, 0]);
        // Rotated a quarter turn the x coordinate decides.
        assert_eq!(
            bucket.get_sorted_symbol_indexes(std::f64::consts::FRAC_PI_2),
            vec![1, 0, 2]
        );
    }

    #[test]
    fn sort_features_dedupes_shared_justifications() {
        let mut bucket = overlapping_bucket();
        let mut a = instance(0.0, 20.0, 0);
        a.right_justified_text = Some(0);
        a.center_justified_text = Some(0);
        a.left_justified_text = Some(0);
        a.placed_icon = Some(0);
        let mut b = instance(0.0, 10.0, 1);
        b.center_justified_text = Some(1);
        b.vertical_text = Some(2);
        bucket.symbol_instances = vec![a, b];

        bucket.sort_features(0.0);
        assert_eq!(bucket.text.draw_order, vec![1, 2, 0]);
        assert_eq!(bucket.icon.draw_order, vec![0]);
        assert_eq!(bucket.feature_sort_order, vec![1, 0]);
        assert_eq!(bucket.sorted_angle(), Some(0.0));
    }

    #[test]
    fn opacities_track_visibility() {
        let mut buffers = SymbolBuffers::default();
        buffers.add_opacities(8, 0, 0);
        assert!(!buffers.has_visible_vertices);
        buffers.add_opacities(4, 7, 0);
        assert_eq!(buffers.opacity_vertices, vec![0, 0, 7]);
        assert!(buffers.has_visible_vertices);
        buffers.clear_opacities();
        assert!(buffers.opacity_vertices.is_empty());
    }
}
