// Per-frame label placement. Every symbol instance is tested against the labels placed
// before it in the same frame; results are merged with the previous frame's fade state
// on commit and written back into the buckets as packed opacities.

mod engine;
mod groups;
mod opacity;

pub use engine::PlacementEngine;
pub use groups::{CollisionGroup, CollisionGroups};
pub use opacity::{JointOpacityState, JointPlacement, OpacityState, PACKED_HIDDEN_OPACITY, pack_opacity};

use crate::camera::{Mat4, SymbolProjection, Transform};
use crate::collision::space::{ElevationFn, GroupPredicate};
use crate::collision::{
    CollisionBox, CollisionSpace, FeatureKey, LineLabel, OverlapMode, PlacedBox, PlacedCircles,
    TileProjection, VIEWPORT_PADDING,
};
use crate::error::PlacementError;
use crate::geometry::Point;
use crate::symbol::bucket::{CollisionArrays, DebugBoxKind, DebugCircle, SymbolBucket};
use crate::symbol::shaping::WritingMode;
use crate::symbol::style::{IconTextFit, SymbolZOrder, TextAnchor, TextJustify};
use crate::symbol::variable_anchor::{get_anchor_alignment, get_anchor_justification};
use crate::tile::{EXTENT, OverscaledTileId};
use crate::warn::warn_once;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub const COLLISIONS_NOT_SHOWN_WARNING: &str = "Collisions detected, but collision boxes are not shown";

/// Terrain height at a tile point, used to lift anchors before projection.
pub type TerrainElevation = Arc<dyn Fn(&OverscaledTileId, f64, f64) -> f64 + Send + Sync>;

/// Anchor a variable-anchor label settled on, kept so the next frame can prefer it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableOffset {
    /// Offset in ems.
    pub text_offset: Point,
    pub width: f64,
    pub height: f64,
    pub anchor: TextAnchor,
    pub text_box_scale: f64,
    /// Anchor used by the previous frame, when it placed this label too.
    pub prev_anchor: Option<TextAnchor>,
}

/// Shift in tile units that moves a centered text box to `anchor`.
pub fn calculate_variable_layout_shift(
    anchor: TextAnchor,
    width: f64,
    height: f64,
    text_offset: Point,
    text_box_scale: f64,
) -> Point {
    let (horizontal_align, vertical_align) = get_anchor_alignment(anchor);
    let shift_x = -(horizontal_align - 0.5) * width;
    let shift_y = -(vertical_align - 0.5) * height;
    Point::new(
        shift_x + text_offset.x * text_box_scale,
        shift_y + text_offset.y * text_box_scale,
    )
}

/// What a placement keeps about each bucket it placed, for feature queries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedQueryData {
    pub bucket_instance_id: u32,
    pub source_layer_index: u32,
    pub bucket_index: u32,
    pub tile_id: OverscaledTileId,
    pub feature_sort_order: Vec<u32>,
}

/// Projection state shared by every part of one bucket in a pass.
#[derive(Debug, Clone)]
pub struct TileLayerParameters {
    pub tile_id: OverscaledTileId,
    pub tile_matrix: Mat4,
    /// Viewport pixels per tile unit.
    pub text_pixel_ratio: f64,
    pub pixels_to_tile_units: f64,
    pub translation_text: [f64; 2],
    pub translation_icon: [f64; 2],
    pub holding_for_fade: bool,
    pub collision_group: CollisionGroup,
}

/// A contiguous run of symbol instances from one bucket.
#[derive(Debug, Clone)]
pub struct BucketPart {
    pub sort_key: Option<f64>,
    pub symbol_instance_start: usize,
    pub symbol_instance_end: usize,
    /// Index of the bucket in the layer slice the part was gathered from.
    pub bucket: usize,
    pub parameters: TileLayerParameters,
}

/// Viewport boxes last tested for one symbol, kept for the debug view.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RealCollisionBoxes {
    text: Option<[f64; 4]>,
    icon: Option<[f64; 4]>,
}

/// Layer-wide settings for placing one bucket part.
struct PartContext<'a> {
    text_ctx: TileProjection<'a>,
    icon_ctx: TileProjection<'a>,
    predicate: Option<GroupPredicate<'a>>,
    group_id: u16,
    text_pixel_ratio: f64,
    text_overlap_mode: OverlapMode,
    icon_overlap_mode: OverlapMode,
    text_optional: bool,
    icon_optional: bool,
    text_ignore_placement: bool,
    icon_ignore_placement: bool,
    always_show_text: bool,
    always_show_icon: bool,
    has_icon_text_fit: bool,
    text_padding: f64,
    holding_for_fade: bool,
    show_collision_boxes: bool,
}

/// Result of placing a text box at one of its variable anchors.
struct AnchorPlacement {
    placed: PlacedBox,
    shift: Point,
}

/// One frame of placement. Holds the collision grids for the frame and the placement
/// and fade state keyed by cross-tile id.
pub struct Placement {
    collision_index: CollisionSpace,
    terrain: Option<TerrainElevation>,
    pub placements: HashMap<u32, JointPlacement>,
    pub opacities: HashMap<u32, JointOpacityState>,
    pub variable_offsets: HashMap<u32, VariableOffset>,
    pub placed_orientations: HashMap<u32, WritingMode>,
    commit_time: f64,
    prev_zoom_adjustment: f64,
    last_placement_change_time: Option<f64>,
    stale: bool,
    fade_duration: f64,
    retained_query_data: HashMap<u32, RetainedQueryData>,
    collision_groups: CollisionGroups,
    zoom_at_last_recency_check: Option<f64>,
    collision_circle_arrays: HashMap<u32, Vec<DebugCircle>>,
    collision_box_arrays: HashMap<u32, HashMap<usize, RealCollisionBoxes>>,
}

impl Placement {
    pub fn new(
        transform: Transform,
        projection: Arc<dyn SymbolProjection>,
        terrain: Option<TerrainElevation>,
        fade_duration: f64,
        cross_source_collisions: bool,
    ) -> Self {
        Self {
            collision_index: CollisionSpace::new(transform, projection),
            terrain,
            placements: HashMap::new(),
            opacities: HashMap::new(),
            variable_offsets: HashMap::new(),
            placed_orientations: HashMap::new(),
            commit_time: 0.0,
            prev_zoom_adjustment: 0.0,
            last_placement_change_time: None,
            stale: false,
            fade_duration,
            retained_query_data: HashMap::new(),
            collision_groups: CollisionGroups::new(cross_source_collisions),
            zoom_at_last_recency_check: None,
            collision_circle_arrays: HashMap::new(),
            collision_box_arrays: HashMap::new(),
        }
    }

    pub fn transform(&self) -> &Transform {
        self.collision_index.transform()
    }

    pub fn collision_index(&self) -> &CollisionSpace {
        &self.collision_index
    }

    pub fn commit_time(&self) -> f64 {
        self.commit_time
    }

    pub fn last_placement_change_time(&self) -> Option<f64> {
        self.last_placement_change_time
    }

    pub fn retained_query_data(&self, bucket_instance_id: u32) -> Option<&RetainedQueryData> {
        self.retained_query_data.get(&bucket_instance_id)
    }

    /// Appends the parts of `bucket` to `results`. With `sort_across_tiles` every sort key
    /// range becomes its own part so that parts of all tiles can be interleaved by key.
    pub fn get_bucket_parts(
        &mut self,
        results: &mut Vec<BucketPart>,
        bucket_index: usize,
        bucket: &SymbolBucket,
        sort_across_tiles: bool,
    ) {
        let collision_group = self.collision_groups.get(&bucket.source_id);
        let tile_id = bucket.tile_id;
        let transform = self.collision_index.transform();

        let scale = 2f64.powf(transform.zoom - f64::from(tile_id.overscaled_z));
        let pixels_to_tile_units = EXTENT / (tile_id.tile_size() * scale);
        let translate = |t: [f64; 2]| [t[0] * pixels_to_tile_units, t[1] * pixels_to_tile_units];

        let parameters = TileLayerParameters {
            tile_id,
            tile_matrix: transform.tile_matrix(&tile_id),
            text_pixel_ratio: tile_id.tile_size() / EXTENT,
            pixels_to_tile_units,
            translation_text: translate(bucket.paint.text_translate),
            translation_icon: translate(bucket.paint.icon_translate),
            holding_for_fade: bucket.holding_for_fade,
            collision_group,
        };

        self.retained_query_data.insert(
            bucket.bucket_instance_id,
            RetainedQueryData {
                bucket_instance_id: bucket.bucket_instance_id,
                source_layer_index: bucket.source_layer_index,
                bucket_index: bucket.index,
                tile_id,
                feature_sort_order: Vec::new(),
            },
        );

        if sort_across_tiles && !bucket.sort_key_ranges.is_empty() {
            for range in &bucket.sort_key_ranges {
                results.push(BucketPart {
                    sort_key: Some(range.sort_key),
                    symbol_instance_start: range.symbol_instance_start,
                    symbol_instance_end: range.symbol_instance_end,
                    bucket: bucket_index,
                    parameters: parameters.clone(),
                });
            }
        } else {
            results.push(BucketPart {
                sort_key: None,
                symbol_instance_start: 0,
                symbol_instance_end: bucket.symbol_instances.len(),
                bucket: bucket_index,
                parameters,
            });
        }
    }

    /// Places one layer: `buckets` holds the layer's bucket of every tile in view.
    pub fn place_layer(
        &mut self,
        buckets: &mut [SymbolBucket],
        seen_cross_tile_ids: &mut HashSet<u32>,
        show_collision_boxes: bool,
        prev: Option<&Placement>,
    ) -> Result<(), PlacementError> {
        let sort_across_tiles = buckets.iter().any(|bucket| bucket.sort_features_by_key);
        let mut parts = Vec::new();
        for (index, bucket) in buckets.iter().enumerate() {
            self.get_bucket_parts(&mut parts, index, bucket, sort_across_tiles);
        }
        if sort_across_tiles {
            parts.sort_by(|a, b| {
                a.sort_key
                    .unwrap_or(0.0)
                    .total_cmp(&b.sort_key.unwrap_or(0.0))
            });
        }
        for part in &parts {
            self.place_layer_bucket_part(
                part,
                &mut buckets[part.bucket],
                seen_cross_tile_ids,
                show_collision_boxes,
                prev,
            )?;
        }
        log::debug!(
            "placed {} parts, {} cross-tile ids resolved",
            parts.len(),
            seen_cross_tile_ids.len()
        );
        Ok(())
    }

    pub fn place_layer_bucket_part(
        &mut self,
        part: &BucketPart,
        bucket: &mut SymbolBucket,
        seen_cross_tile_ids: &mut HashSet<u32>,
        show_collision_boxes: bool,
        prev: Option<&Placement>,
    ) -> Result<(), PlacementError> {
        let params = &part.parameters;
        let layout = &bucket.layout;

        let text_overlap_mode = layout.text_overlap_mode();
        let icon_overlap_mode = layout.icon_overlap_mode();
        let text_always_overlap = text_overlap_mode == OverlapMode::Always;
        let icon_always_overlap = icon_overlap_mode == OverlapMode::Always;
        let pitch_with_map = layout.text_pitch_with_map();
        let rotate_with_map = layout.text_rotate_with_map();
        let z_order_by_viewport_y = layout.symbol_z_order == SymbolZOrder::ViewportY;

        // Labels that always show are marked visible even when they never reached the
        // grid, unless they depend on a partner that may still collide.
        let always_show_text = text_always_overlap
            && (icon_always_overlap || !bucket.has_icon_data() || layout.icon_optional);
        let always_show_icon = icon_always_overlap
            && (text_always_overlap || !bucket.has_text_data() || layout.text_optional);

        let tile_id = params.tile_id;
        let terrain = self.terrain.clone();
        let elevation = terrain
            .as_ref()
            .map(|terrain| move |x: f64, y: f64| terrain(&tile_id, x, y));
        let group = params.collision_group;
        let group_filter = move |key: &FeatureKey| group.accepts(key);

        let text_ctx = TileProjection {
            tile_matrix: &params.tile_matrix,
            tile_id: &tile_id,
            pitch_with_map,
            rotate_with_map,
            translation: params.translation_text,
            pixels_to_tile_units: params.pixels_to_tile_units,
            elevation: elevation.as_ref().map(|f| f as ElevationFn<'_>),
        };
        let ctx = PartContext {
            text_ctx,
            icon_ctx: TileProjection {
                translation: params.translation_icon,
                ..text_ctx
            },
            predicate: group
                .is_scoped()
                .then_some(&group_filter as GroupPredicate<'_>),
            group_id: group.id,
            text_pixel_ratio: params.text_pixel_ratio,
            text_overlap_mode,
            icon_overlap_mode,
            text_optional: layout.text_optional,
            icon_optional: layout.icon_optional,
            text_ignore_placement: layout.text_ignore_placement,
            icon_ignore_placement: layout.icon_ignore_placement,
            always_show_text,
            always_show_icon,
            has_icon_text_fit: layout.icon_text_fit != IconTextFit::None,
            text_padding: layout.text_padding,
            holding_for_fade: params.holding_for_fade,
            show_collision_boxes,
        };

        if z_order_by_viewport_y {
            if part.symbol_instance_start != 0 {
                return Err(PlacementError::SortedPartNotAtStart);
            }
            let order = bucket.get_sorted_symbol_indexes(-self.transform().bearing_in_radians());
            for &symbol_index in order.iter().rev() {
                self.place_symbol(&ctx, bucket, symbol_index, seen_cross_tile_ids, prev)?;
            }
        } else {
            for symbol_index in part.symbol_instance_start..part.symbol_instance_end {
                self.place_symbol(&ctx, bucket, symbol_index, seen_cross_tile_ids, prev)?;
            }
        }

        bucket.just_reloaded = false;
        Ok(())
    }

    fn place_symbol(
        &mut self,
        ctx: &PartContext<'_>,
        bucket: &mut SymbolBucket,
        symbol_index: usize,
        seen_cross_tile_ids: &mut HashSet<u32>,
        prev: Option<&Placement>,
    ) -> Result<(), PlacementError> {
        let instance = &bucket.symbol_instances[symbol_index];
        let cross_tile_id = instance.cross_tile_id;
        if seen_cross_tile_ids.contains(&cross_tile_id) {
            return Ok(());
        }
        if cross_tile_id == 0 {
            return Err(PlacementError::ZeroCrossTileId {
                bucket_instance_id: bucket.bucket_instance_id,
                symbol_index,
            });
        }
        if bucket.bucket_instance_id == 0 {
            return Err(PlacementError::ZeroBucketInstanceId);
        }
        if ctx.holding_for_fade {
            // Not marked as seen: a parent tile may still hold a copy that should place.
            self.placements
                .insert(cross_tile_id, JointPlacement::new(false, false, false));
            return Ok(());
        }

        let collision = instance.collision;
        let feature_index = instance.feature_index;
        let num_vertical_glyph_vertices = instance.num_vertical_glyph_vertices;
        let has_text = instance.has_text();
        let num_icon_vertices = instance.num_icon_vertices;
        let center_justified_text = instance.center_justified_text;
        let anchor_offsets = instance.text_anchor_offsets.clone();

        let mut placed: Option<PlacedBox> = None;
        let mut placed_vertical_text = false;
        let mut shift: Option<Point> = None;

        if let Some(text_box) = collision.text_box().map(|i| bucket.collision_boxes[i]) {
            let vertical_box = collision
                .vertical_text_box()
                .map(|i| bucket.collision_boxes[i]);
            let modes = if bucket.allow_vertical_placement
                && num_vertical_glyph_vertices > 0
                && vertical_box.is_some()
            {
                bucket.writing_modes.clone()
            } else {
                vec![WritingMode::Horizontal]
            };

            if anchor_offsets.is_empty() {
                for mode in modes {
                    let (candidate, orientation) = match (mode, vertical_box) {
                        (WritingMode::Vertical, Some(vertical)) => (vertical, WritingMode::Vertical),
                        (WritingMode::Vertical, None) => continue,
                        _ => (text_box, WritingMode::Horizontal),
                    };
                    let result = self.collision_index.place_collision_box(
                        &candidate,
                        ctx.text_overlap_mode,
                        ctx.text_pixel_ratio,
                        &ctx.text_ctx,
                        ctx.predicate,
                        None,
                    );
                    if result.placeable {
                        mark_used_orientation(bucket, symbol_index, orientation);
                        self.placed_orientations.insert(cross_tile_id, orientation);
                    }
                    if orientation == WritingMode::Vertical {
                        placed_vertical_text = result.placeable;
                    }
                    placed = Some(result);
                    if result.placeable {
                        break;
                    }
                }
                let is_placed = placed.is_some_and(|p| p.placeable);
                self.update_previous_orientation_if_not_placed(bucket, symbol_index, is_placed, prev);
            } else {
                // Prefer the anchor the previous frame used, when it is still free.
                let mut prev_anchor = prev
                    .and_then(|p| p.variable_offsets.get(&cross_tile_id))
                    .map(|offset| offset.anchor);

                for mode in modes {
                    let attempt = match (mode, vertical_box) {
                        (WritingMode::Vertical, Some(vertical)) => {
                            if placed.is_some_and(|p| p.placeable) {
                                None
                            } else {
                                let icon_box = collision.vertical_icon.map(|i| bucket.collision_boxes[i]);
                                self.place_box_for_variable_anchors(
                                    ctx,
                                    bucket,
                                    symbol_index,
                                    (vertical, icon_box),
                                    WritingMode::Vertical,
                                    &mut prev_anchor,
                                    prev,
                                )?
                            }
                        }
                        (WritingMode::Vertical, None) => continue,
                        _ => {
                            let icon_box = collision.icon.map(|i| bucket.collision_boxes[i]);
                            self.place_box_for_variable_anchors(
                                ctx,
                                bucket,
                                symbol_index,
                                (text_box, icon_box),
                                WritingMode::Horizontal,
                                &mut prev_anchor,
                                prev,
                            )?
                        }
                    };

                    let (result, attempt_shift) = match attempt {
                        Some((result, attempt_shift)) => (Some(result), attempt_shift),
                        None => (None, None),
                    };
                    if attempt_shift.is_some() {
                        shift = attempt_shift;
                    }
                    if mode == WritingMode::Vertical {
                        placed_vertical_text = result.is_some_and(|p| p.placeable);
                    }
                    placed = result;
                    if placed.is_some_and(|p| p.placeable) {
                        break;
                    }
                }

                let is_placed = placed.is_some_and(|p| p.placeable);
                let prev_orientation =
                    self.update_previous_orientation_if_not_placed(bucket, symbol_index, is_placed, prev);

                // Keep the last anchor so a label that lost its spot fades out where it was.
                if !is_placed
                    && let Some(prev_offset) = prev.and_then(|p| p.variable_offsets.get(&cross_tile_id))
                {
                    self.variable_offsets.insert(cross_tile_id, *prev_offset);
                    mark_used_justification(bucket, symbol_index, prev_offset.anchor, prev_orientation);
                }
            }
        }

        let mut place_text = placed.is_some_and(|p| p.placeable);
        let mut offscreen = placed.is_none_or(|p| p.offscreen);

        let mut placed_circles: Option<PlacedCircles> = None;
        if let Some(diameter) = collision.circle_diameter()
            && let Some(center) = center_justified_text
        {
            let placed_symbol = &bucket.text.placed_symbols[center];
            if let Some(segment) = placed_symbol.segment {
                let line: Vec<Point> = bucket.line_vertices[placed_symbol.line.clone()]
                    .iter()
                    .map(|vertex| vertex.point)
                    .collect();
                let glyph_offsets = &bucket.glyph_offsets[placed_symbol.glyphs.clone()];
                let label = LineLabel {
                    anchor: placed_symbol.anchor,
                    segment,
                    line: &line,
                    first_glyph_offset: glyph_offsets.first().copied().unwrap_or(0.0),
                    last_glyph_offset: glyph_offsets.last().copied().unwrap_or(0.0),
                    line_offset: placed_symbol.line_offset,
                };
                let circles = self.collision_index.place_collision_circles(
                    ctx.text_overlap_mode,
                    &label,
                    placed_symbol.font_size,
                    &ctx.text_ctx,
                    ctx.show_collision_boxes,
                    ctx.predicate,
                    diameter,
                    ctx.text_padding,
                );

                if !circles.circles.is_empty() && circles.collision_detected && !ctx.show_collision_boxes {
                    warn_once(COLLISIONS_NOT_SHOWN_WARNING);
                }
                // `always` places the label even when no circle made it into the grid.
                place_text = ctx.text_overlap_mode == OverlapMode::Always
                    || (!circles.circles.is_empty() && !circles.collision_detected);
                offscreen = offscreen && circles.offscreen;
                placed_circles = Some(circles);
            }
        }

        let mut place_icon = false;
        let mut placed_icon: Option<PlacedBox> = None;
        if let Some(icon_index) = collision.icon {
            let box_index = collision
                .vertical_icon
                .filter(|_| placed_vertical_text)
                .unwrap_or(icon_index);
            let result = self.collision_index.place_collision_box(
                &bucket.collision_boxes[box_index],
                ctx.icon_overlap_mode,
                ctx.text_pixel_ratio,
                &ctx.icon_ctx,
                ctx.predicate,
                shift.filter(|_| ctx.has_icon_text_fit),
            );
            place_icon = result.placeable;
            offscreen = offscreen && result.offscreen;
            placed_icon = Some(result);
        }

        let icon_without_text = ctx.text_optional || !has_text;
        let text_without_icon = ctx.icon_optional || num_icon_vertices == 0;
        if !icon_without_text && !text_without_icon {
            let both = place_icon && place_text;
            place_icon = both;
            place_text = both;
        } else if !text_without_icon {
            place_text = place_icon && place_text;
        } else if !icon_without_text {
            place_icon = place_icon && place_text;
        }

        let bucket_instance_id = bucket.bucket_instance_id;
        if place_text && let Some(text) = placed.filter(|p| p.placeable) {
            self.collision_index.insert_collision_box(
                text.bbox,
                ctx.text_overlap_mode,
                ctx.text_ignore_placement,
                bucket_instance_id,
                feature_index,
                ctx.group_id,
            );
        }
        if place_icon && let Some(icon) = placed_icon.filter(|p| p.placeable) {
            self.collision_index.insert_collision_box(
                icon.bbox,
                ctx.icon_overlap_mode,
                ctx.icon_ignore_placement,
                bucket_instance_id,
                feature_index,
                ctx.group_id,
            );
        }
        if place_text && let Some(circles) = &placed_circles {
            self.collision_index.insert_collision_circles(
                &circles.circles,
                ctx.text_overlap_mode,
                ctx.text_ignore_placement,
                bucket_instance_id,
                feature_index,
                ctx.group_id,
            );
        }

        if ctx.show_collision_boxes {
            self.store_collision_data(
                bucket_instance_id,
                symbol_index,
                &collision,
                placed.as_ref(),
                placed_icon.as_ref(),
                placed_circles.as_ref(),
            );
        }

        // Occluded labels stay hidden even when they may overlap.
        let text_visible = (place_text || ctx.always_show_text) && !placed.is_some_and(|p| p.occluded);
        let icon_visible = (place_icon || ctx.always_show_icon) && !placed_icon.is_some_and(|p| p.occluded);
        self.placements.insert(
            cross_tile_id,
            JointPlacement::new(text_visible, icon_visible, offscreen || bucket.just_reloaded),
        );
        seen_cross_tile_ids.insert(cross_tile_id);
        Ok(())
    }

    /// Runs up to three passes over the anchors of a variable-anchor label: the previous
    /// frame's anchor alone, every anchor with `never`, then every anchor with the layer's
    /// overlap mode. Returns the first placed box with its shift.
    #[allow(clippy::too_many_arguments)]
    fn place_box_for_variable_anchors(
        &mut self,
        ctx: &PartContext<'_>,
        bucket: &mut SymbolBucket,
        symbol_index: usize,
        (text_box, icon_box): (CollisionBox, Option<CollisionBox>),
        orientation: WritingMode,
        prev_anchor: &mut Option<TextAnchor>,
        prev: Option<&Placement>,
    ) -> Result<Option<(PlacedBox, Option<Point>)>, PlacementError> {
        let width = text_box.x2 - text_box.x1;
        let height = text_box.y2 - text_box.y1;
        let variable_icon_box = icon_box.filter(|_| ctx.has_icon_text_fit && ctx.icon_overlap_mode == OverlapMode::Never);
        let offsets = bucket.symbol_instances[symbol_index].text_anchor_offsets.clone();

        let mut passes = if ctx.text_overlap_mode == OverlapMode::Never { 1 } else { 2 };
        if prev_anchor.is_some() {
            passes += 1;
        }
        let mut overlap_mode = OverlapMode::Never;

        for _ in 0..passes {
            for i in offsets.clone() {
                let (anchor, text_offset) = bucket.text_anchor_offsets[i];
                if prev_anchor.is_some_and(|prev_anchor| prev_anchor != anchor) {
                    continue;
                }
                let attempt = self.attempt_anchor_placement(
                    ctx,
                    bucket,
                    symbol_index,
                    (anchor, text_offset),
                    (&text_box, variable_icon_box.as_ref()),
                    (width, height),
                    overlap_mode,
                    orientation,
                    prev,
                )?;
                if let Some(AnchorPlacement { placed, shift }) = attempt {
                    return Ok(Some((placed, Some(shift))));
                }
            }
            if prev_anchor.is_some() {
                *prev_anchor = None;
            } else {
                overlap_mode = ctx.text_overlap_mode;
            }
        }

        if ctx.show_collision_boxes {
            // Nothing fit: test a centered box with `always` only to have something to draw.
            let fake = self.collision_index.place_collision_box(
                &text_box,
                OverlapMode::Always,
                ctx.text_pixel_ratio,
                &ctx.text_ctx,
                ctx.predicate,
                None,
            );
            let placed = PlacedBox {
                bbox: fake.bbox,
                placeable: false,
                offscreen: false,
                occluded: false,
            };
            return Ok(Some((placed, None)));
        }
        Ok(None)
    }

    #[allow(clippy::too_many_arguments)]
    fn attempt_anchor_placement(
        &mut self,
        ctx: &PartContext<'_>,
        bucket: &mut SymbolBucket,
        symbol_index: usize,
        (anchor, text_offset): (TextAnchor, Point),
        (text_box, icon_box): (&CollisionBox, Option<&CollisionBox>),
        (width, height): (f64, f64),
        overlap_mode: OverlapMode,
        orientation: WritingMode,
        prev: Option<&Placement>,
    ) -> Result<Option<AnchorPlacement>, PlacementError> {
        let instance = &bucket.symbol_instances[symbol_index];
        let cross_tile_id = instance.cross_tile_id;
        let text_box_scale = instance.text_box_scale;
        let shift = calculate_variable_layout_shift(anchor, width, height, text_offset, text_box_scale);

        let placed = self.collision_index.place_collision_box(
            text_box,
            overlap_mode,
            ctx.text_pixel_ratio,
            &ctx.text_ctx,
            ctx.predicate,
            Some(shift),
        );
        if let Some(icon_box) = icon_box {
            let placed_icon = self.collision_index.place_collision_box(
                icon_box,
                overlap_mode,
                ctx.text_pixel_ratio,
                &ctx.icon_ctx,
                ctx.predicate,
                Some(shift),
            );
            if !placed_icon.placeable {
                return Ok(None);
            }
        }
        if !placed.placeable {
            return Ok(None);
        }

        let prev_anchor = prev.and_then(|prev| {
            let offset = prev.variable_offsets.get(&cross_tile_id)?;
            prev.placements
                .get(&cross_tile_id)
                .filter(|placement| placement.text)?;
            Some(offset.anchor)
        });
        if cross_tile_id == 0 {
            return Err(PlacementError::ZeroCrossTileId {
                bucket_instance_id: bucket.bucket_instance_id,
                symbol_index,
            });
        }
        self.variable_offsets.insert(
            cross_tile_id,
            VariableOffset {
                text_offset,
                width,
                height,
                anchor,
                text_box_scale,
                prev_anchor,
            },
        );
        mark_used_justification(bucket, symbol_index, anchor, orientation);
        if bucket.allow_vertical_placement {
            mark_used_orientation(bucket, symbol_index, orientation);
            self.placed_orientations.insert(cross_tile_id, orientation);
        }
        Ok(Some(AnchorPlacement { placed, shift }))
    }

    /// Keeps the previous frame's orientation for a label that failed to place, so it
    /// fades out the way it was drawn.
    fn update_previous_orientation_if_not_placed(
        &mut self,
        bucket: &mut SymbolBucket,
        symbol_index: usize,
        is_placed: bool,
        prev: Option<&Placement>,
    ) -> WritingMode {
        let cross_tile_id = bucket.symbol_instances[symbol_index].cross_tile_id;
        if bucket.allow_vertical_placement
            && !is_placed
            && let Some(&orientation) = prev.and_then(|p| p.placed_orientations.get(&cross_tile_id))
            && orientation != WritingMode::None
        {
            self.placed_orientations.insert(cross_tile_id, orientation);
            mark_used_orientation(bucket, symbol_index, orientation);
            return orientation;
        }
        WritingMode::Horizontal
    }

    fn store_collision_data(
        &mut self,
        bucket_instance_id: u32,
        symbol_index: usize,
        collision: &CollisionArrays,
        text: Option<&PlacedBox>,
        icon: Option<&PlacedBox>,
        circles: Option<&PlacedCircles>,
    ) {
        let has_text_box = collision.text_box().is_some();
        if has_text_box || collision.icon.is_some() {
            let boxes = self
                .collision_box_arrays
                .entry(bucket_instance_id)
                .or_default()
                .entry(symbol_index)
                .or_default();
            if has_text_box {
                boxes.text = text.map(|p| p.bbox);
            }
            if collision.icon.is_some() {
                boxes.icon = icon.map(|p| p.bbox);
            }
        }

        if let Some(circles) = circles {
            // Circles wait here until the bucket's opacities are updated after commit.
            self.collision_circle_arrays
                .entry(bucket_instance_id)
                .or_default()
                .extend(circles.circles.iter().map(|circle| DebugCircle {
                    x: circle.x - VIEWPORT_PADDING,
                    y: circle.y - VIEWPORT_PADDING,
                    radius: circle.radius,
                    collision: circles.collision_detected,
                }));
        }
    }

    /// Merges this frame's placements with the fade state of `prev`.
    ///
    /// IDs present in both step toward their new target; IDs only in `prev` keep fading
    /// out until hidden. Any change in a placed flag restarts the fade clock.
    pub fn commit(&mut self, now: f64, prev: Option<&Placement>) -> Result<(), PlacementError> {
        self.commit_time = now;
        self.zoom_at_last_recency_check = Some(self.transform().zoom);

        if prev.is_some_and(|p| p.last_placement_change_time.is_none()) {
            return Err(PlacementError::MissingPlacementChangeTime);
        }

        let zoom = self.transform().zoom;
        self.prev_zoom_adjustment = prev.map_or(0.0, |p| p.zoom_adjustment(zoom));
        let increment = prev.map_or(1.0, |p| p.symbol_fade_change(now));

        let mut placement_changed = false;
        for (&cross_tile_id, placement) in &self.placements {
            let prev_opacity = prev.and_then(|p| p.opacities.get(&cross_tile_id));
            let state = match prev_opacity {
                Some(prev_opacity) => {
                    placement_changed = placement_changed
                        || placement.text != prev_opacity.text.placed
                        || placement.icon != prev_opacity.icon.placed;
                    JointOpacityState::new(Some(prev_opacity), increment, placement.text, placement.icon, false)
                }
                None => {
                    placement_changed = placement_changed || placement.text || placement.icon;
                    JointOpacityState::new(None, increment, placement.text, placement.icon, placement.skip_fade)
                }
            };
            self.opacities.insert(cross_tile_id, state);
        }

        if let Some(prev) = prev {
            for (&cross_tile_id, prev_opacity) in &prev.opacities {
                if self.opacities.contains_key(&cross_tile_id) {
                    continue;
                }
                let state = JointOpacityState::new(Some(prev_opacity), increment, false, false, false);
                if !state.is_hidden() {
                    self.opacities.insert(cross_tile_id, state);
                    placement_changed =
                        placement_changed || prev_opacity.text.placed || prev_opacity.icon.placed;
                }
            }

            let visible = |opacities: &HashMap<u32, JointOpacityState>, id: &u32| {
                opacities.get(id).is_some_and(|state| !state.is_hidden())
            };
            for (cross_tile_id, offset) in &prev.variable_offsets {
                if !self.variable_offsets.contains_key(cross_tile_id) && visible(&self.opacities, cross_tile_id) {
                    self.variable_offsets.insert(*cross_tile_id, *offset);
                }
            }
            for (cross_tile_id, orientation) in &prev.placed_orientations {
                if !self.placed_orientations.contains_key(cross_tile_id) && visible(&self.opacities, cross_tile_id) {
                    self.placed_orientations.insert(*cross_tile_id, *orientation);
                }
            }
        }

        if placement_changed {
            self.last_placement_change_time = Some(now);
        } else if self.last_placement_change_time.is_none() {
            self.last_placement_change_time = Some(prev.and_then(|p| p.last_placement_change_time).unwrap_or(now));
        }
        Ok(())
    }

    /// Writes packed opacities for every bucket of one layer. A cross-tile id drawn by an
    /// earlier bucket is hidden in later ones.
    pub fn update_layer_opacities(&mut self, buckets: &mut [SymbolBucket]) -> Result<(), PlacementError> {
        let mut seen_cross_tile_ids = HashSet::new();
        for bucket in buckets {
            self.update_bucket_opacities(bucket, &mut seen_cross_tile_ids)?;
        }
        Ok(())
    }

    pub fn update_bucket_opacities(
        &mut self,
        bucket: &mut SymbolBucket,
        seen_cross_tile_ids: &mut HashSet<u32>,
    ) -> Result<(), PlacementError> {
        bucket.text.clear_opacities();
        bucket.icon.clear_opacities();

        let layout = &bucket.layout;
        let text_allow_overlap = layout.text_allow_overlap;
        let icon_allow_overlap = layout.icon_allow_overlap;
        let has_variable_placement = layout.has_variable_anchors();
        let rotate_with_map = layout.text_rotate_with_map();
        let pitch_with_map = layout.text_pitch_with_map();
        let has_icon_text_fit = layout.icon_text_fit != IconTextFit::None;

        let duplicate_state = JointOpacityState::new(None, 0.0, false, false, true);
        // Labels allowed to overlap can show before placement reaches them, unless they
        // wait on a partner that may still collide.
        let default_state = JointOpacityState::new(
            None,
            0.0,
            text_allow_overlap && (icon_allow_overlap || !bucket.has_icon_data() || layout.icon_optional),
            icon_allow_overlap && (text_allow_overlap || !bucket.has_text_data() || layout.text_optional),
            true,
        );

        let bearing = self.transform().bearing_in_radians();
        let real_boxes = self.collision_box_arrays.get(&bucket.bucket_instance_id);

        for s in 0..bucket.symbol_instances.len() {
            let instance = &bucket.symbol_instances[s];
            let cross_tile_id = instance.cross_tile_id;
            let num_horizontal = instance.num_horizontal_glyph_vertices;
            let num_vertical = instance.num_vertical_glyph_vertices;
            let num_icon = instance.num_icon_vertices;
            let num_vertical_icon = instance.num_vertical_icon_vertices;
            let collision = instance.collision;
            let horizontal_indexes = [
                instance.right_justified_text,
                instance.center_justified_text,
                instance.left_justified_text,
            ];
            let vertical_text = instance.vertical_text;
            let placed_icon = instance.placed_icon;
            let vertical_placed_icon = instance.vertical_placed_icon;

            let state = if seen_cross_tile_ids.contains(&cross_tile_id) {
                duplicate_state
            } else {
                // Stored so the next placement fades from here.
                *self.opacities.entry(cross_tile_id).or_insert(default_state)
            };
            seen_cross_tile_ids.insert(cross_tile_id);

            let placed_orientation = self
                .placed_orientations
                .get(&cross_tile_id)
                .copied()
                .unwrap_or(WritingMode::None);
            let horizontal_hidden = placed_orientation == WritingMode::Vertical;
            let vertical_hidden = matches!(
                placed_orientation,
                WritingMode::Horizontal | WritingMode::HorizontalOnly
            );

            if num_horizontal > 0 || num_vertical > 0 {
                let packed = pack_opacity(&state.text);
                // Switching orientation is instant; only collisions fade.
                let horizontal_opacity = if horizontal_hidden { PACKED_HIDDEN_OPACITY } else { packed };
                bucket
                    .text
                    .add_opacities(num_horizontal, horizontal_opacity, PACKED_HIDDEN_OPACITY);
                let vertical_opacity = if vertical_hidden { PACKED_HIDDEN_OPACITY } else { packed };
                bucket
                    .text
                    .add_opacities(num_vertical, vertical_opacity, PACKED_HIDDEN_OPACITY);

                let symbol_hidden = state.text.is_hidden();
                for index in horizontal_indexes.into_iter().flatten() {
                    bucket.text.placed_symbols[index].hidden = symbol_hidden || horizontal_hidden;
                }
                if let Some(index) = vertical_text {
                    bucket.text.placed_symbols[index].hidden = symbol_hidden || vertical_hidden;
                }

                if let Some(offset) = self.variable_offsets.get(&cross_tile_id) {
                    mark_used_justification(bucket, s, offset.anchor, placed_orientation);
                }
                if placed_orientation != WritingMode::None {
                    mark_used_justification(bucket, s, TextAnchor::Left, placed_orientation);
                    mark_used_orientation(bucket, s, placed_orientation);
                }
            }

            if num_icon > 0 {
                let packed = pack_opacity(&state.icon);
                let use_horizontal = !(has_icon_text_fit && vertical_placed_icon.is_some() && horizontal_hidden);
                let icon_hidden = state.icon.is_hidden();
                if let Some(index) = placed_icon {
                    let opacity = if use_horizontal { packed } else { PACKED_HIDDEN_OPACITY };
                    bucket.icon.add_opacities(num_icon, opacity, PACKED_HIDDEN_OPACITY);
                    bucket.icon.placed_symbols[index].hidden = icon_hidden;
                }
                if let Some(index) = vertical_placed_icon {
                    let opacity = if use_horizontal { PACKED_HIDDEN_OPACITY } else { packed };
                    bucket
                        .icon
                        .add_opacities(num_vertical_icon, opacity, PACKED_HIDDEN_OPACITY);
                    bucket.icon.placed_symbols[index].hidden = icon_hidden;
                }
            }

            if let Some(debug) = bucket.collision_debug.as_mut() {
                let real = real_boxes
                    .and_then(|boxes| boxes.get(&s))
                    .copied()
                    .unwrap_or_default();
                let mut shift = Point::default();

                let has_text_box = collision.text_box().is_some();
                let has_vertical_text_box = collision.vertical_text_box().is_some();
                if has_text_box || has_vertical_text_box {
                    let mut used = true;
                    if has_variable_placement {
                        match self.variable_offsets.get(&cross_tile_id) {
                            // Shows the current anchor, or the last one that placed.
                            Some(offset) => {
                                shift = calculate_variable_layout_shift(
                                    offset.anchor,
                                    offset.width,
                                    offset.height,
                                    offset.text_offset,
                                    offset.text_box_scale,
                                );
                                if rotate_with_map {
                                    shift = shift.rotate(if pitch_with_map { -bearing } else { bearing });
                                }
                            }
                            None => used = false,
                        }
                    }
                    let viewport_box = unpadded(real.text);
                    if has_text_box {
                        debug.update(
                            s,
                            DebugBoxKind::Text,
                            false,
                            state.text.placed,
                            !used || horizontal_hidden,
                            viewport_box,
                            shift,
                        );
                    }
                    if has_vertical_text_box {
                        debug.update(
                            s,
                            DebugBoxKind::Text,
                            true,
                            state.text.placed,
                            !used || vertical_hidden,
                            viewport_box,
                            shift,
                        );
                    }
                }

                if collision.icon.is_some() || collision.vertical_icon.is_some() {
                    let vertical_icon_used = !vertical_hidden && collision.vertical_icon.is_some();
                    let icon_shift = if has_icon_text_fit { shift } else { Point::default() };
                    let viewport_box = unpadded(real.icon);
                    if collision.icon.is_some() {
                        debug.update(
                            s,
                            DebugBoxKind::Icon,
                            false,
                            state.icon.placed,
                            vertical_icon_used,
                            viewport_box,
                            icon_shift,
                        );
                    }
                    if collision.vertical_icon.is_some() {
                        debug.update(
                            s,
                            DebugBoxKind::Icon,
                            true,
                            state.icon.placed,
                            !vertical_icon_used,
                            viewport_box,
                            icon_shift,
                        );
                    }
                }
            }
        }

        bucket.sort_features(-bearing);
        if let Some(data) = self.retained_query_data.get_mut(&bucket.bucket_instance_id) {
            data.feature_sort_order = bucket.feature_sort_order.clone();
        }

        for (kind, buffers) in [("text", &bucket.text), ("icon", &bucket.icon)] {
            if buffers.opacity_vertices.len() != buffers.quads.len() {
                return Err(PlacementError::OpacityLengthMismatch {
                    kind,
                    opacity: buffers.opacity_vertices.len(),
                    expected: buffers.quads.len(),
                });
            }
        }

        if let Some(circles) = self.collision_circle_arrays.remove(&bucket.bucket_instance_id) {
            bucket.collision_circles = circles;
        }
        Ok(())
    }

    /// Features whose placed labels intersect `polygon` (viewport pixels), grouped by
    /// bucket instance id.
    pub fn query_rendered_symbols(&self, polygon: &[Point]) -> BTreeMap<u32, Vec<u32>> {
        self.collision_index.query_rendered_symbols(polygon)
    }

    /// Opacity step for a commit at `now`; a zero fade duration snaps instantly.
    pub fn symbol_fade_change(&self, now: f64) -> f64 {
        if self.fade_duration == 0.0 {
            1.0
        } else {
            (now - self.commit_time) / self.fade_duration + self.prev_zoom_adjustment
        }
    }

    /// Speeds up fading while zooming out, when labels start to pile up.
    pub fn zoom_adjustment(&self, zoom: f64) -> f64 {
        ((self.transform().zoom - zoom) / 1.5).max(0.0)
    }

    pub fn has_transitions(&self, now: f64) -> bool {
        self.stale
            || self
                .last_placement_change_time
                .is_some_and(|changed| now - changed < self.fade_duration)
    }

    /// Whether this placement is fresh enough to skip a new pass at `now`. The zoom
    /// adjustment only applies once zooming has stopped.
    pub fn still_recent(&mut self, now: f64, zoom: f64) -> bool {
        let duration_adjustment = if self.zoom_at_last_recency_check == Some(zoom) {
            1.0 - self.zoom_adjustment(zoom)
        } else {
            1.0
        };
        self.zoom_at_last_recency_check = Some(zoom);
        self.commit_time + self.fade_duration * duration_adjustment > now
    }

    pub fn set_stale(&mut self) {
        self.stale = true;
    }
}

fn unpadded(bbox: Option<[f64; 4]>) -> [f64; 4] {
    bbox.unwrap_or([0.0; 4]).map(|v| v - VIEWPORT_PADDING)
}

/// Leaves the cross-tile id only on the text run matching the placed anchor's
/// justification (or on the vertical run) so the other runs are not drawn.
pub fn mark_used_justification(
    bucket: &mut SymbolBucket,
    symbol_index: usize,
    placed_anchor: TextAnchor,
    orientation: WritingMode,
) {
    let instance = &bucket.symbol_instances[symbol_index];
    let auto_index = if orientation == WritingMode::Vertical {
        instance.vertical_text
    } else {
        match get_anchor_justification(placed_anchor) {
            TextJustify::Left => instance.left_justified_text,
            TextJustify::Right => instance.right_justified_text,
            TextJustify::Center | TextJustify::Auto => instance.center_justified_text,
        }
    };

    let indexes = [
        instance.left_justified_text,
        instance.center_justified_text,
        instance.right_justified_text,
        instance.vertical_text,
    ];
    for index in indexes.into_iter().flatten() {
        bucket.text.placed_symbols[index].cross_tile_id = match auto_index {
            Some(auto) if auto != index => 0,
            _ => instance.cross_tile_id,
        };
    }
}

/// Records the orientation on the instance's text runs: horizontal runs carry it when
/// it is horizontal, the vertical run when it is vertical.
pub fn mark_used_orientation(bucket: &mut SymbolBucket, symbol_index: usize, orientation: WritingMode) {
    let horizontal = match orientation {
        WritingMode::Horizontal | WritingMode::HorizontalOnly => orientation,
        _ => WritingMode::None,
    };
    let vertical = if orientation == WritingMode::Vertical {
        orientation
    } else {
        WritingMode::None
    };

    let instance = &bucket.symbol_instances[symbol_index];
    for index in instance.horizontal_text_indexes().into_iter().flatten() {
        bucket.text.placed_symbols[index].placed_orientation = horizontal;
    }
    if let Some(index) = instance.vertical_text {
        bucket.text.placed_symbols[index].placed_orientation = vertical;
    }
}

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod tests {
    use super::test_support::{TestLabel, label_bucket};
    use super::*;
    use crate::camera::MercatorProjection;
    use crate::symbol::bucket::SortKeyRange;
    use crate::symbol::style::SymbolLayout;

    fn placement(fade_duration: f64, cross_source_collisions: bool) -> Placement {
        Placement::new(
            Transform::new(512.0, 512.0),
            Arc::new(MercatorProjection),
            None,
            fade_duration,
            cross_source_collisions,
        )
    }

    fn place(placement: &mut Placement, buckets: &mut [SymbolBucket], prev: Option<&Placement>) {
        let mut seen = HashSet::new();
        placement
            .place_layer(buckets, &mut seen, false, prev)
            .expect("placement succeeds");
    }

    #[test]
    fn variable_shift_moves_box_away_from_anchor() {
        let shift = calculate_variable_layout_shift(TextAnchor::Left, 100.0, 40.0, Point::new(1.0, 0.0), 24.0);
        assert_eq!(shift, Point::new(50.0 + 24.0, 0.0));
        let shift = calculate_variable_layout_shift(TextAnchor::BottomRight, 100.0, 40.0, Point::default(), 1.0);
        assert_eq!(shift, Point::new(-50.0, -20.0));
        let shift = calculate_variable_layout_shift(TextAnchor::Center, 100.0, 40.0, Point::default(), 1.0);
        assert_eq!(shift, Point::default());
    }

    #[test]
    fn earlier_label_wins_a_collision() {
        let mut p = placement(300.0, true);
        let mut buckets = vec![label_bucket(
            1,
            "source",
            SymbolLayout::default(),
            &[TestLabel::new(4096.0, 4096.0, 1), TestLabel::new(4100.0, 4096.0, 2)],
        )];
        place(&mut p, &mut buckets, None);
        assert!(p.placements[&1].text);
        assert!(!p.placements[&2].text);
    }

    #[test]
    fn allow_overlap_places_both() {
        let layout = SymbolLayout {
            text_allow_overlap: true,
            ..SymbolLayout::default()
        };
        let mut p = placement(300.0, true);
        let mut buckets = vec![label_bucket(
            1,
            "source",
            layout,
            &[TestLabel::new(4096.0, 4096.0, 1), TestLabel::new(4100.0, 4096.0, 2)],
        )];
        place(&mut p, &mut buckets, None);
        assert!(p.placements[&1].text);
        assert!(p.placements[&2].text);
    }

    #[test]
    fn sources_without_cross_source_collisions_ignore_each_other() {
        let mut p = placement(300.0, false);
        let mut seen = HashSet::new();
        let mut roads = vec![label_bucket(1, "roads", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 1)])];
        let mut pois = vec![label_bucket(2, "pois", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 2)])];
        p.place_layer(&mut roads, &mut seen, false, None).expect("roads");
        p.place_layer(&mut pois, &mut seen, false, None).expect("pois");
        assert!(p.placements[&1].text);
        assert!(p.placements[&2].text);

        let mut shared = placement(300.0, true);
        let mut seen = HashSet::new();
        shared.place_layer(&mut roads, &mut seen, false, None).expect("roads");
        shared.place_layer(&mut pois, &mut seen, false, None).expect("pois");
        assert!(!shared.placements[&2].text);
    }

    #[test]
    fn duplicate_cross_tile_id_is_placed_once_and_hidden_in_later_buckets() {
        let mut p = placement(300.0, true);
        let mut buckets = vec![
            label_bucket(1, "source", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 7)]),
            label_bucket(2, "source", SymbolLayout::default(), &[TestLabel::new(1000.0, 1000.0, 7)]),
        ];
        place(&mut p, &mut buckets, None);
        assert_eq!(p.placements.len(), 1);
        p.commit(0.0, None).expect("commit");
        p.update_layer_opacities(&mut buckets).expect("opacities");

        assert!(p.opacities[&7].text.placed);
        assert!(buckets[1].text.placed_symbols[0].hidden);
        assert_eq!(buckets[1].text.opacity_vertices, vec![PACKED_HIDDEN_OPACITY]);
        assert_eq!(buckets[0].text.opacity_vertices.len(), buckets[0].text.quads.len());
    }

    #[test]
    fn zero_cross_tile_id_is_an_error() {
        let mut p = placement(300.0, true);
        let mut buckets = vec![label_bucket(3, "source", SymbolLayout::default(), &[TestLabel::new(10.0, 10.0, 0)])];
        let mut seen = HashSet::new();
        let err = p.place_layer(&mut buckets, &mut seen, false, None).unwrap_err();
        assert_eq!(
            err,
            PlacementError::ZeroCrossTileId {
                bucket_instance_id: 3,
                symbol_index: 0
            }
        );
    }

    #[test]
    fn holding_for_fade_hides_without_claiming_the_id() {
        let mut p = placement(300.0, true);
        let mut held = label_bucket(1, "source", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 5)]);
        held.holding_for_fade = true;
        let mut buckets = vec![held];
        let mut seen = HashSet::new();
        p.place_layer(&mut buckets, &mut seen, false, None).expect("placement");
        assert_eq!(p.placements[&5], JointPlacement::new(false, false, false));
        assert!(!seen.contains(&5));
        assert!(p.collision_index().grid().is_empty());
    }

    #[test]
    fn commit_steps_opacity_by_elapsed_time() {
        let mut first = placement(300.0, true);
        let mut buckets = vec![label_bucket(1, "source", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 1)])];
        place(&mut first, &mut buckets, None);
        first.commit(1000.0, None).expect("first commit");
        // On screen and not just reloaded, so it fades in from zero.
        assert_eq!(first.opacities[&1].text.opacity, 0.0);
        assert_eq!(first.last_placement_change_time(), Some(1000.0));

        let mut second = placement(300.0, true);
        place(&mut second, &mut buckets, Some(&first));
        second.commit(1150.0, Some(&first)).expect("second commit");
        assert!((second.opacities[&1].text.opacity - 0.5).abs() < 1e-9);
        // Nothing changed, so the clock keeps the first change.
        assert_eq!(second.last_placement_change_time(), Some(1000.0));
        assert!(second.has_transitions(1200.0));
        assert!(!second.has_transitions(1400.0));
    }

    #[test]
    fn labels_missing_from_a_frame_fade_out_and_are_dropped() {
        let mut first = placement(0.0, true);
        let mut buckets = vec![label_bucket(1, "source", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 1)])];
        place(&mut first, &mut buckets, None);
        first.commit(0.0, None).expect("commit");

        // The step follows the previous target, so the label first reaches full opacity
        // with a hidden target and only then fades out.
        let mut second = placement(0.0, true);
        second.commit(16.0, Some(&first)).expect("commit");
        let state = second.opacities[&1];
        assert_eq!(state.text.opacity, 1.0);
        assert!(!state.text.placed);
        assert_eq!(second.last_placement_change_time(), Some(16.0));

        let mut third = placement(0.0, true);
        third.commit(32.0, Some(&second)).expect("commit");
        assert!(!third.opacities.contains_key(&1));
    }

    #[test]
    fn commit_requires_change_time_on_previous() {
        let first = placement(300.0, true);
        let mut second = placement(300.0, true);
        assert_eq!(
            second.commit(10.0, Some(&first)),
            Err(PlacementError::MissingPlacementChangeTime)
        );
    }

    #[test]
    fn sort_key_ranges_become_interleaved_parts() {
        let mut p = placement(300.0, true);
        let mut a = label_bucket(1, "source", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 1)]);
        a.sort_features_by_key = true;
        a.sort_key_ranges = vec![SortKeyRange {
            sort_key: 5.0,
            symbol_instance_start: 0,
            symbol_instance_end: 1,
        }];
        let mut b = label_bucket(2, "source", SymbolLayout::default(), &[TestLabel::new(4100.0, 4096.0, 2)]);
        b.sort_features_by_key = true;
        b.sort_key_ranges = vec![SortKeyRange {
            sort_key: 1.0,
            symbol_instance_start: 0,
            symbol_instance_end: 1,
        }];
        let mut buckets = vec![a, b];
        place(&mut p, &mut buckets, None);
        // The lower key goes first and takes the spot.
        assert!(p.placements[&2].text);
        assert!(!p.placements[&1].text);
        assert_eq!(p.retained_query_data(1).map(|d| d.bucket_instance_id), Some(1));
    }

    #[test]
    fn used_justification_keeps_only_matching_run() {
        let mut bucket = label_bucket(1, "source", SymbolLayout::default(), &[TestLabel::new(0.0, 0.0, 9)]);
        let left = bucket.add_symbols(
            crate::symbol::bucket::BufferKind::Text,
            Vec::new(),
            16.0,
            [0.0, 0.0],
            WritingMode::Horizontal,
            Point::default(),
            None,
            0..0,
            None,
        );
        bucket.symbol_instances[0].left_justified_text = Some(left);

        mark_used_justification(&mut bucket, 0, TextAnchor::Left, WritingMode::Horizontal);
        assert_eq!(bucket.text.placed_symbols[left].cross_tile_id, 9);
        assert_eq!(bucket.text.placed_symbols[0].cross_tile_id, 0);

        mark_used_justification(&mut bucket, 0, TextAnchor::Top, WritingMode::Horizontal);
        assert_eq!(bucket.text.placed_symbols[left].cross_tile_id, 0);
        assert_eq!(bucket.text.placed_symbols[0].cross_tile_id, 9);

        mark_used_orientation(&mut bucket, 0, WritingMode::Horizontal);
        assert_eq!(bucket.text.placed_symbols[0].placed_orientation, WritingMode::Horizontal);
        mark_used_orientation(&mut bucket, 0, WritingMode::Vertical);
        assert_eq!(bucket.text.placed_symbols[0].placed_orientation, WritingMode::None);
    }

    #[test]
    fn still_recent_until_fade_ends() {
        let mut p = placement(300.0, true);
        p.commit(1000.0, None).expect("commit");
        assert!(p.still_recent(1100.0, 0.0));
        assert!(!p.still_recent(1400.0, 0.0));
        assert_eq!(p.symbol_fade_change(1150.0), 0.5);
        assert_eq!(p.zoom_adjustment(-1.5), 1.0);
        assert_eq!(p.zoom_adjustment(3.0), 0.0);
    }
}
