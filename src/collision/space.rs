use super::feature::CollisionBox;
use super::grid::{FeatureKey, OverlapMode, SpatialGrid};
use crate::camera::{Mat4, SymbolProjection, Transform};
use crate::geometry::{clip_line, get_aabb, polygon_intersects_polygon, PathInterpolator, Point};
use crate::symbol::glyphs::ONE_EM;
use crate::tile::OverscaledTileId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Extra room around the viewport so labels partly offscreen still collide.
pub const VIEWPORT_PADDING: f64 = 100.0;

/// Labels whose perspective ratio drops below this are too close to the horizon to show.
pub const PERSPECTIVE_RATIO_CUTOFF: f64 = 0.6;

const GRID_CELL_SIZE: f64 = 25.0;

pub type ElevationFn<'a> = &'a dyn Fn(f64, f64) -> f64;
pub type GroupPredicate<'a> = &'a dyn Fn(&FeatureKey) -> bool;

/// Per-tile projection state shared by every label of one bucket in a placement pass.
#[derive(Clone, Copy)]
pub struct TileProjection<'a> {
    pub tile_matrix: &'a Mat4,
    pub tile_id: &'a OverscaledTileId,
    pub pitch_with_map: bool,
    pub rotate_with_map: bool,
    /// Translation in tile units.
    pub translation: [f64; 2],
    /// Tile units per label-plane pixel at the current zoom.
    pub pixels_to_tile_units: f64,
    pub elevation: Option<ElevationFn<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub point: Point,
    pub perspective_ratio: f64,
    pub signed_distance_from_camera: f64,
    pub is_occluded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlacedBox {
    pub bbox: [f64; 4],
    pub placeable: bool,
    pub offscreen: bool,
    #[serde(skip)]
    pub occluded: bool,
}

impl PlacedBox {
    pub fn rejected() -> Self {
        Self {
            bbox: [0.0; 4],
            placeable: false,
            offscreen: true,
            occluded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CollisionCircle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlacedCircles {
    pub circles: Vec<CollisionCircle>,
    pub offscreen: bool,
    pub collision_detected: bool,
}

/// The part of a line label needed to lay runtime collision circles along its path.
#[derive(Debug, Clone, Copy)]
pub struct LineLabel<'a> {
    pub anchor: Point,
    /// Index of the line segment the anchor sits on.
    pub segment: usize,
    pub line: &'a [Point],
    /// Horizontal offsets of the first and last glyph from the anchor, in em units.
    pub first_glyph_offset: f64,
    pub last_glyph_offset: f64,
    pub line_offset: [f64; 2],
}

/// Collision state for one placement pass: two grids in padded viewport space.
///
/// `grid` holds everything that blocks later labels. `ignored_grid` holds labels
/// with `ignore-placement`, which are queryable but never block.
pub struct CollisionSpace {
    transform: Transform,
    projection: Arc<dyn SymbolProjection>,
    grid: SpatialGrid<FeatureKey>,
    ignored_grid: SpatialGrid<FeatureKey>,
    camera_to_center_distance: f64,
    screen_right_boundary: f64,
    screen_bottom_boundary: f64,
    grid_right_boundary: f64,
    grid_bottom_boundary: f64,
}

impl CollisionSpace {
    pub fn new(transform: Transform, projection: Arc<dyn SymbolProjection>) -> Self {
        let grid_width = transform.width + 2.0 * VIEWPORT_PADDING;
        let grid_height = transform.height + 2.0 * VIEWPORT_PADDING;
        Self {
            camera_to_center_distance: transform.camera_to_center_distance(),
            screen_right_boundary: transform.width + VIEWPORT_PADDING,
            screen_bottom_boundary: transform.height + VIEWPORT_PADDING,
            grid_right_boundary: grid_width,
            grid_bottom_boundary: grid_height,
            grid: SpatialGrid::new(grid_width, grid_height, GRID_CELL_SIZE),
            ignored_grid: SpatialGrid::new(grid_width, grid_height, GRID_CELL_SIZE),
            transform,
            projection,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn grid(&self) -> &SpatialGrid<FeatureKey> {
        &self.grid
    }

    pub fn ignored_grid(&self) -> &SpatialGrid<FeatureKey> {
        &self.ignored_grid
    }

    /// Projects a tile point to padded viewport space.
    pub fn project_and_get_perspective_ratio(
        &self,
        ctx: &TileProjection<'_>,
        x: f64,
        y: f64,
    ) -> ProjectedPoint {
        let z = ctx.elevation.map_or(0.0, |elevation| elevation(x, y));
        let (pos, is_occluded) = if self.projection.use_special_projection_for_symbols() {
            (
                self.projection
                    .project_tile_point(x, y, z, ctx.tile_id, &self.transform),
                self.projection.is_occluded(x, y, ctx.tile_id),
            )
        } else {
            (ctx.tile_matrix.transform_vec4([x, y, z, 1.0]), false)
        };
        let w = pos[3];
        ProjectedPoint {
            point: Point::new(
                (pos[0] / w + 1.0) / 2.0 * self.transform.width + VIEWPORT_PADDING,
                (-pos[1] / w + 1.0) / 2.0 * self.transform.height + VIEWPORT_PADDING,
            ),
            perspective_ratio: 0.5 + 0.5 * (self.camera_to_center_distance / w),
            signed_distance_from_camera: w,
            is_occluded,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn place_collision_box(
        &self,
        collision_box: &CollisionBox,
        overlap_mode: OverlapMode,
        text_pixel_ratio: f64,
        ctx: &TileProjection<'_>,
        predicate: Option<GroupPredicate<'_>>,
        shift: Option<Point>,
    ) -> PlacedBox {
        let x = collision_box.anchor.x + ctx.translation[0];
        let y = collision_box.anchor.y + ctx.translation[1];
        let projected = self.project_and_get_perspective_ratio(ctx, x, y);
        let tile_to_viewport = text_pixel_ratio * projected.perspective_ratio;

        let (bbox, all_points_occluded) = if !ctx.pitch_with_map && !ctx.rotate_with_map {
            let shift = shift.unwrap_or_default();
            let px = projected.point.x + shift.x * tile_to_viewport;
            let py = projected.point.y + shift.y * tile_to_viewport;
            (
                [
                    px + collision_box.x1 * tile_to_viewport,
                    py + collision_box.y1 * tile_to_viewport,
                    px + collision_box.x2 * tile_to_viewport,
                    py + collision_box.y2 * tile_to_viewport,
                ],
                false,
            )
        } else {
            self.project_collision_box(collision_box, tile_to_viewport, ctx, &projected, shift)
        };

        let [x1, y1, x2, y2] = bbox;
        let occluded = self.projection.use_special_projection_for_symbols()
            && if ctx.pitch_with_map {
                all_points_occluded
            } else {
                self.projection.is_occluded(x, y, ctx.tile_id)
            };

        if occluded
            || projected.perspective_ratio < PERSPECTIVE_RATIO_CUTOFF
            || !self.is_inside_grid(x1, y1, x2, y2)
            || (overlap_mode != OverlapMode::Always
                && self.grid.hit_test(x1, y1, x2, y2, overlap_mode, predicate))
        {
            return PlacedBox {
                bbox,
                placeable: false,
                offscreen: false,
                occluded,
            };
        }

        PlacedBox {
            bbox,
            placeable: true,
            offscreen: self.is_offscreen(x1, y1, x2, y2),
            occluded,
        }
    }

    /// Screen-space envelope of a box whose orientation follows the map rotation or plane.
    fn project_collision_box(
        &self,
        collision_box: &CollisionBox,
        tile_to_viewport: f64,
        ctx: &TileProjection<'_>,
        projected: &ProjectedPoint,
        shift: Option<Point>,
    ) -> ([f64; 4], bool) {
        let mut vec_east = Point::new(1.0, 0.0);
        let mut vec_south = Point::new(0.0, 1.0);
        let anchor = Point::new(
            collision_box.anchor.x + ctx.translation[0],
            collision_box.anchor.y + ctx.translation[1],
        );

        if ctx.rotate_with_map && !ctx.pitch_with_map {
            let east = self
                .project_and_get_perspective_ratio(ctx, anchor.x + 1.0, anchor.y)
                .point;
            let to_east = (east - projected.point).unit();
            let angle = (to_east.y / to_east.x).atan()
                + if to_east.x < 0.0 { std::f64::consts::PI } else { 0.0 };
            let (sin, cos) = angle.sin_cos();
            vec_east = Point::new(cos, sin);
            vec_south = Point::new(-sin, cos);
        } else if !ctx.rotate_with_map && ctx.pitch_with_map {
            let (sin, cos) = (-self.transform.angle()).sin_cos();
            vec_east = Point::new(cos, sin);
            vec_south = Point::new(-sin, cos);
        }

        let mut base = projected.point;
        let mut distance_multiplier = tile_to_viewport;

        if ctx.pitch_with_map {
            base = anchor;
            distance_multiplier = 2f64.powf(-self.transform.zoom_fraction());
            distance_multiplier *=
                self.projection
                    .pitched_text_correction(&self.transform, anchor, ctx.tile_id);
            if shift.is_none() {
                let distance_ratio =
                    projected.signed_distance_from_camera / self.camera_to_center_distance;
                distance_multiplier *= (0.5 + 0.5 * distance_ratio).clamp(0.0, 4.0);
            }
        }

        if let Some(shift) = shift {
            base = base
                + vec_east.mult(shift.x * distance_multiplier)
                + vec_south.mult(shift.y * distance_multiplier);
        }

        let x_min = collision_box.x1 * distance_multiplier;
        let x_max = collision_box.x2 * distance_multiplier;
        let x_half = (x_min + x_max) / 2.0;
        let y_min = collision_box.y1 * distance_multiplier;
        let y_max = collision_box.y2 * distance_multiplier;
        let y_half = (y_min + y_max) / 2.0;

        // Corners and edge midpoints, clockwise from the top-left.
        let offsets = [
            (x_min, y_min),
            (x_half, y_min),
            (x_max, y_min),
            (x_max, y_half),
            (x_max, y_max),
            (x_half, y_max),
            (x_min, y_max),
            (x_min, y_half),
        ];
        let mut points: Vec<Point> = offsets
            .iter()
            .map(|&(ox, oy)| {
                Point::new(
                    base.x + vec_east.x * ox + vec_south.x * oy,
                    base.y + vec_east.y * ox + vec_south.y * oy,
                )
            })
            .collect();

        let mut any_point_visible = true;
        if ctx.pitch_with_map {
            let projected: Vec<ProjectedPoint> = points
                .iter()
                .map(|p| self.project_and_get_perspective_ratio(ctx, p.x, p.y))
                .collect();
            any_point_visible = projected.iter().any(|p| !p.is_occluded);
            points = projected.iter().map(|p| p.point).collect();
        }

        (get_aabb(&points), !any_point_visible)
    }

    /// Lays a chain of circles along the projected path of a line label and tests each.
    ///
    /// With `show_collision_circles` every circle is computed even after a collision, so
    /// the debug view can draw them; otherwise the first collision ends the walk.
    #[allow(clippy::too_many_arguments)]
    pub fn place_collision_circles(
        &self,
        overlap_mode: OverlapMode,
        label: &LineLabel<'_>,
        font_size: f64,
        ctx: &TileProjection<'_>,
        show_collision_circles: bool,
        predicate: Option<GroupPredicate<'_>>,
        circle_pixel_diameter: f64,
        text_pixel_padding: f64,
    ) -> PlacedCircles {
        let mut placed = Vec::new();
        let perspective_ratio = self.perspective_ratio(ctx, label.anchor.x, label.anchor.y);
        let label_plane_font_size = if ctx.pitch_with_map {
            font_size / perspective_ratio
        } else {
            font_size * perspective_ratio
        };
        let font_scale = label_plane_font_size / ONE_EM;
        let line_offset_x = label.line_offset[0] * font_scale;
        let line_offset_y = label.line_offset[1] * font_scale;

        let mut walker = LineWalker::new(self, ctx, label);
        let first = walker.place_glyph(font_scale * label.first_glyph_offset, line_offset_x, line_offset_y);
        let last = first.as_ref().and_then(|_| {
            walker.place_glyph(font_scale * label.last_glyph_offset, line_offset_x, line_offset_y)
        });

        let mut collision_detected = false;
        let mut in_grid = false;
        let mut entirely_offscreen = true;

        if let (Some(first), Some(last)) = (first, last)
            && !walker.any_projection_occluded
        {
            let radius = circle_pixel_diameter * 0.5 * perspective_ratio + text_pixel_padding;
            let circle_dist = radius * 2.5;

            let mut path: Vec<Point> = first.iter().skip(1).rev().copied().collect();
            path.extend(last.iter().skip(1).copied());

            if ctx.pitch_with_map {
                let screen: Vec<ProjectedPoint> = path
                    .iter()
                    .map(|p| self.project_label_plane_to_screen(ctx, *p))
                    .collect();
                path = if screen.iter().any(|p| p.signed_distance_from_camera <= 0.0) {
                    Vec::new()
                } else {
                    screen.iter().map(|p| p.point).collect()
                };
            }

            let segments = self.visible_segments(path);
            let mut interpolator = PathInterpolator::default();

            for segment in &segments {
                interpolator.reset(segment, radius * 0.25);
                let count = if interpolator.length() <= 0.5 * radius {
                    1
                } else {
                    (interpolator.padded_length() / circle_dist).ceil() as usize + 1
                };

                for i in 0..count {
                    let t = i as f64 / (count.max(2) - 1) as f64;
                    let position = interpolator.lerp(t);
                    let x = position.x + VIEWPORT_PADDING;
                    let y = position.y + VIEWPORT_PADDING;
                    placed.push(CollisionCircle { x, y, radius });

                    let (x1, y1, x2, y2) = (x - radius, y - radius, x + radius, y + radius);
                    entirely_offscreen = entirely_offscreen && self.is_offscreen(x1, y1, x2, y2);
                    in_grid = in_grid || self.is_inside_grid(x1, y1, x2, y2);

                    if overlap_mode != OverlapMode::Always
                        && self.grid.hit_test_circle(x, y, radius, overlap_mode, predicate)
                    {
                        collision_detected = true;
                        if !show_collision_circles {
                            return PlacedCircles {
                                circles: Vec::new(),
                                offscreen: false,
                                collision_detected,
                            };
                        }
                    }
                }
            }
        }

        let discard = (!show_collision_circles && collision_detected)
            || !in_grid
            || perspective_ratio < PERSPECTIVE_RATIO_CUTOFF;
        PlacedCircles {
            circles: if discard { Vec::new() } else { placed },
            offscreen: entirely_offscreen,
            collision_detected,
        }
    }

    /// Splits a viewport path into the parts inside the padded viewport.
    fn visible_segments(&self, path: Vec<Point>) -> Vec<Vec<Point>> {
        if path.is_empty() {
            return Vec::new();
        }
        let min = Point::new(-VIEWPORT_PADDING, -VIEWPORT_PADDING);
        let max = Point::new(self.screen_right_boundary, self.screen_bottom_boundary);
        let [x1, y1, x2, y2] = get_aabb(&path);
        if x1 >= min.x && x2 <= max.x && y1 >= min.y && y2 <= max.y {
            vec![path]
        } else if x2 < min.x || x1 > max.x || y2 < min.y || y1 > max.y {
            Vec::new()
        } else {
            clip_line(&[path], min.x, min.y, max.x, max.y)
        }
    }

    fn perspective_ratio(&self, ctx: &TileProjection<'_>, x: f64, y: f64) -> f64 {
        self.project_and_get_perspective_ratio(ctx, x, y).perspective_ratio
    }

    /// Projects a tile point onto the plane line labels are laid out in: viewport pixels,
    /// or map-plane pixels for `pitch-alignment: map`.
    fn project_to_label_plane(&self, ctx: &TileProjection<'_>, x: f64, y: f64) -> ProjectedPoint {
        let x = x + ctx.translation[0];
        let y = y + ctx.translation[1];
        if ctx.pitch_with_map {
            return ProjectedPoint {
                point: Point::new(x, y).div(ctx.pixels_to_tile_units),
                perspective_ratio: 1.0,
                signed_distance_from_camera: 1.0,
                is_occluded: false,
            };
        }
        let mut projected = self.project_and_get_perspective_ratio(ctx, x, y);
        projected.point = projected.point - Point::new(VIEWPORT_PADDING, VIEWPORT_PADDING);
        projected
    }

    fn project_label_plane_to_screen(&self, ctx: &TileProjection<'_>, p: Point) -> ProjectedPoint {
        let tile = p.mult(ctx.pixels_to_tile_units);
        let mut projected = self.project_and_get_perspective_ratio(ctx, tile.x, tile.y);
        projected.point = projected.point - Point::new(VIEWPORT_PADDING, VIEWPORT_PADDING);
        projected
    }

    /// Symbols whose placed geometry intersects the viewport polygon, grouped by bucket
    /// instance. Circles count as their bounding boxes.
    pub fn query_rendered_symbols(&self, polygon: &[Point]) -> BTreeMap<u32, Vec<u32>> {
        let mut result: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        if polygon.is_empty() || (self.grid.is_empty() && self.ignored_grid.is_empty()) {
            return result;
        }

        let query: Vec<Point> = polygon
            .iter()
            .map(|p| Point::new(p.x + VIEWPORT_PADDING, p.y + VIEWPORT_PADDING))
            .collect();
        let [x1, y1, x2, y2] = get_aabb(&query);

        let mut hits = self.grid.query(x1, y1, x2, y2, None);
        hits.extend(self.ignored_grid.query(x1, y1, x2, y2, None));

        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        for hit in hits {
            let key = hit.key;
            if seen.contains(&(key.bucket_instance_id, key.feature_index)) {
                continue;
            }
            let bbox = [
                Point::new(hit.x1, hit.y1),
                Point::new(hit.x2, hit.y1),
                Point::new(hit.x2, hit.y2),
                Point::new(hit.x1, hit.y2),
            ];
            if !polygon_intersects_polygon(&query, &bbox) {
                continue;
            }
            seen.insert((key.bucket_instance_id, key.feature_index));
            result
                .entry(key.bucket_instance_id)
                .or_default()
                .push(key.feature_index);
        }
        result
    }

    pub fn insert_collision_box(
        &mut self,
        bbox: [f64; 4],
        overlap_mode: OverlapMode,
        ignore_placement: bool,
        bucket_instance_id: u32,
        feature_index: u32,
        collision_group_id: u16,
    ) {
        let grid = if ignore_placement { &mut self.ignored_grid } else { &mut self.grid };
        let key = FeatureKey {
            bucket_instance_id,
            feature_index,
            collision_group_id,
            overlap_mode,
        };
        grid.insert(key, bbox[0], bbox[1], bbox[2], bbox[3]);
    }

    pub fn insert_collision_circles(
        &mut self,
        circles: &[CollisionCircle],
        overlap_mode: OverlapMode,
        ignore_placement: bool,
        bucket_instance_id: u32,
        feature_index: u32,
        collision_group_id: u16,
    ) {
        let grid = if ignore_placement { &mut self.ignored_grid } else { &mut self.grid };
        let key = FeatureKey {
            bucket_instance_id,
            feature_index,
            collision_group_id,
            overlap_mode,
        };
        for circle in circles {
            grid.insert_circle(key, circle.x, circle.y, circle.radius);
        }
    }

    pub fn is_offscreen(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
        x2 < VIEWPORT_PADDING
            || x1 >= self.screen_right_boundary
            || y2 < VIEWPORT_PADDING
            || y1 > self.screen_bottom_boundary
    }

    pub fn is_inside_grid(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
        x2 >= 0.0 && x1 < self.grid_right_boundary && y2 >= 0.0 && y1 < self.grid_bottom_boundary
    }
}

/// Walks a label's line outward from its anchor in label-plane space, caching projected
/// vertices so the first and last glyph share work.
struct LineWalker<'s, 'a> {
    space: &'s CollisionSpace,
    ctx: &'s TileProjection<'a>,
    label: &'s LineLabel<'a>,
    projections: HashMap<usize, Point>,
    anchor_point: Option<Point>,
    any_projection_occluded: bool,
}

impl<'s, 'a> LineWalker<'s, 'a> {
    fn new(space: &'s CollisionSpace, ctx: &'s TileProjection<'a>, label: &'s LineLabel<'a>) -> Self {
        Self {
            space,
            ctx,
            label,
            projections: HashMap::new(),
            anchor_point: None,
            any_projection_occluded: false,
        }
    }

    fn anchor_point(&mut self) -> Point {
        if let Some(p) = self.anchor_point {
            return p;
        }
        let p = self
            .space
            .project_to_label_plane(self.ctx, self.label.anchor.x, self.label.anchor.y)
            .point;
        self.anchor_point = Some(p);
        p
    }

    /// Projects line vertex `index`. A vertex behind the camera is replaced by a
    /// synthetic point along the segment, far enough out to hold the glyph.
    fn project_vertex(
        &mut self,
        index: usize,
        direction: isize,
        distance_from_anchor: f64,
        previous_vertex: Point,
        abs_offset_x: f64,
    ) -> Point {
        if let Some(p) = self.projections.get(&index) {
            return *p;
        }
        let vertex = self.label.line[index];
        let projected = self.space.project_to_label_plane(self.ctx, vertex.x, vertex.y);
        if projected.signed_distance_from_camera > 0.0 {
            self.projections.insert(index, projected.point);
            self.any_projection_occluded |= projected.is_occluded;
            return projected.point;
        }

        let previous_tile_point = if distance_from_anchor == 0.0 {
            self.label.anchor
        } else {
            let previous = index as isize - direction;
            self.label.line[previous.max(0) as usize]
        };
        let minimum_length = abs_offset_x - distance_from_anchor + 1.0;
        let unit_vertex = previous_tile_point + (previous_tile_point - vertex).unit();
        let projected_unit = self
            .space
            .project_to_label_plane(self.ctx, unit_vertex.x, unit_vertex.y)
            .point;
        let unit_segment = previous_vertex - projected_unit;
        previous_vertex + unit_segment.mult(minimum_length / unit_segment.mag())
    }

    /// Places a glyph `offset_x` label-plane pixels from the anchor along the line and
    /// returns the path from the anchor to it, or `None` when the line is too short.
    fn place_glyph(&mut self, offset_x: f64, line_offset_x: f64, line_offset_y: f64) -> Option<Vec<Point>> {
        let combined = offset_x + line_offset_x;
        let direction: isize = if combined > 0.0 { 1 } else { -1 };
        let line_len = self.label.line.len() as isize;
        let mut index = if direction > 0 {
            self.label.segment as isize
        } else {
            self.label.segment as isize + 1
        };

        let anchor = self.anchor_point();
        let mut current = anchor;
        let mut offset_previous: Option<Point> = None;
        let mut distance_from_anchor = 0.0;
        let mut segment_distance = 0.0;
        let abs_offset_x = combined.abs();
        let mut path = Vec::new();
        let mut segment = Point::default();

        while distance_from_anchor + segment_distance <= abs_offset_x {
            index += direction;
            if index < 0 || index >= line_len {
                return None;
            }
            distance_from_anchor += segment_distance;
            let previous = current;
            current = self.project_vertex(
                index as usize,
                direction,
                distance_from_anchor,
                previous,
                abs_offset_x,
            );
            if line_offset_y == 0.0 {
                path.push(previous);
                segment = current - previous;
            } else {
                let normal = (current - previous)
                    .unit()
                    .perp()
                    .mult(line_offset_y * direction as f64);
                let start = offset_previous.unwrap_or(previous + normal);
                let end = current + normal;
                path.push(start);
                segment = end - start;
                offset_previous = Some(end);
            }
            segment_distance = segment.mag();
        }

        let t = if segment_distance > 0.0 {
            (abs_offset_x - distance_from_anchor) / segment_distance
        } else {
            0.0
        };
        let start = path.last().copied().unwrap_or(anchor);
        path.push(start + segment.mult(t));
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::MercatorProjection;

    fn space(width: f64, height: f64) -> CollisionSpace {
        CollisionSpace::new(Transform::new(width, height), Arc::new(MercatorProjection))
    }

    fn centered_tile() -> (Transform, OverscaledTileId, Mat4) {
        let transform = Transform::new(512.0, 512.0);
        let id = OverscaledTileId::new(0, 0, 0, 0, 0);
        let matrix = transform.tile_matrix(&id);
        (transform, id, matrix)
    }

    fn point_box(x: f64, y: f64, half: f64) -> CollisionBox {
        CollisionBox {
            anchor: Point::new(x, y),
            x1: -half,
            y1: -half,
            x2: half,
            y2: half,
            feature_index: 0,
            source_layer_index: 0,
            bucket_index: 0,
        }
    }

    fn ctx<'a>(id: &'a OverscaledTileId, matrix: &'a Mat4) -> TileProjection<'a> {
        TileProjection {
            tile_matrix: matrix,
            tile_id: id,
            pitch_with_map: false,
            rotate_with_map: false,
            translation: [0.0, 0.0],
            pixels_to_tile_units: 16.0,
            elevation: None,
        }
    }

    #[test]
    fn box_at_tile_center_lands_in_viewport_center() {
        let (transform, id, matrix) = centered_tile();
        let space = CollisionSpace::new(transform, Arc::new(MercatorProjection));
        let placed = space.place_collision_box(
            &point_box(4096.0, 4096.0, 160.0),
            OverlapMode::Never,
            512.0 / 8192.0,
            &ctx(&id, &matrix),
            None,
            None,
        );
        assert!(placed.placeable);
        assert!(!placed.offscreen);
        let [x1, y1, x2, y2] = placed.bbox;
        assert!((x1 - 346.0).abs() < 1e-6 && (x2 - 366.0).abs() < 1e-6, "{:?}", placed.bbox);
        assert!((y1 - 346.0).abs() < 1e-6 && (y2 - 366.0).abs() < 1e-6, "{:?}", placed.bbox);
    }

    #[test]
    fn second_identical_box_collides() {
        let (transform, id, matrix) = centered_tile();
        let mut space = CollisionSpace::new(transform, Arc::new(MercatorProjection));
        let ctx = ctx(&id, &matrix);
        let collision_box = point_box(4096.0, 4096.0, 64.0);
        let first = space.place_collision_box(&collision_box, OverlapMode::Never, 1.0 / 16.0, &ctx, None, None);
        assert!(first.placeable);
        space.insert_collision_box(first.bbox, OverlapMode::Never, false, 1, 0, 0);
        assert_eq!(space.grid().keys_length(), 1);

        let second = space.place_collision_box(&collision_box, OverlapMode::Never, 1.0 / 16.0, &ctx, None, None);
        assert!(!second.placeable);
        let always = space.place_collision_box(&collision_box, OverlapMode::Always, 1.0 / 16.0, &ctx, None, None);
        assert!(always.placeable);
    }

    #[test]
    fn shift_moves_box() {
        let (transform, id, matrix) = centered_tile();
        let space = CollisionSpace::new(transform, Arc::new(MercatorProjection));
        let ctx = ctx(&id, &matrix);
        let collision_box = point_box(4096.0, 4096.0, 16.0);
        let base = space.place_collision_box(&collision_box, OverlapMode::Never, 1.0 / 16.0, &ctx, None, None);
        let shifted = space.place_collision_box(
            &collision_box,
            OverlapMode::Never,
            1.0 / 16.0,
            &ctx,
            None,
            Some(Point::new(32.0, 0.0)),
        );
        assert!((shifted.bbox[0] - base.bbox[0] - 2.0).abs() < 1e-6, "{:?} vs {:?}", shifted.bbox, base.bbox);
    }

    #[test]
    fn box_far_outside_grid_is_rejected() {
        let (transform, id, matrix) = centered_tile();
        let space = CollisionSpace::new(transform, Arc::new(MercatorProjection));
        let ctx = ctx(&id, &matrix);
        let placed = space.place_collision_box(&point_box(-20000.0, 4096.0, 16.0), OverlapMode::Never, 1.0 / 16.0, &ctx, None, None);
        assert!(!placed.placeable);
    }

    #[test]
    fn offscreen_within_padding_is_placeable() {
        let (transform, id, matrix) = centered_tile();
        let space = CollisionSpace::new(transform, Arc::new(MercatorProjection));
        let ctx = ctx(&id, &matrix);
        // 40px left of the viewport edge.
        let placed = space.place_collision_box(&point_box(-640.0, 4096.0, 16.0), OverlapMode::Never, 1.0 / 16.0, &ctx, None, None);
        assert!(placed.placeable);
        assert!(placed.offscreen);
    }

    #[test]
    fn circles_follow_straight_line() {
        let (transform, id, matrix) = centered_tile();
        let space = CollisionSpace::new(transform, Arc::new(MercatorProjection));
        let ctx = ctx(&id, &matrix);
        let line = [Point::new(2048.0, 4096.0), Point::new(4096.0, 4096.0), Point::new(6144.0, 4096.0)];
        let label = LineLabel {
            anchor: Point::new(4096.0, 4096.0),
            segment: 0,
            line: &line,
            first_glyph_offset: -40.0,
            last_glyph_offset: 40.0,
            line_offset: [0.0, 0.0],
        };
        let placed = space.place_collision_circles(OverlapMode::Never, &label, 24.0, &ctx, false, None, 10.0, 0.0);
        assert!(!placed.collision_detected);
        assert!(placed.circles.len() >= 2, "{:?}", placed.circles);
        for circle in &placed.circles {
            assert!((circle.y - 356.0).abs() < 1e-6, "{circle:?}");
            assert!(circle.x >= 316.0 - 1e-6 && circle.x <= 396.0 + 1e-6, "{circle:?}");
        }
    }

    #[test]
    fn circles_stop_at_line_end() {
        let (transform, id, matrix) = centered_tile();
        let space = CollisionSpace::new(transform, Arc::new(MercatorProjection));
        let ctx = ctx(&id, &matrix);
        let line = [Point::new(4000.0, 4096.0), Point::new(4200.0, 4096.0)];
        let label = LineLabel {
            anchor: Point::new(4096.0, 4096.0),
            segment: 0,
            line: &line,
            first_glyph_offset: -400.0,
            last_glyph_offset: 400.0,
            line_offset: [0.0, 0.0],
        };
        let placed = space.place_collision_circles(OverlapMode::Never, &label, 24.0, &ctx, false, None, 10.0, 0.0);
        assert!(placed.circles.is_empty());
        assert!(!placed.collision_detected);
    }

    #[test]
    fn query_dedupes_by_feature() {
        let mut space = space(200.0, 200.0);
        space.insert_collision_box([110.0, 110.0, 130.0, 130.0], OverlapMode::Never, false, 1, 7, 0);
        space.insert_collision_box([120.0, 120.0, 140.0, 140.0], OverlapMode::Never, false, 1, 7, 0);
        space.insert_collision_box([150.0, 150.0, 160.0, 160.0], OverlapMode::Never, true, 2, 3, 0);
        let polygon = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        let result = space.query_rendered_symbols(&polygon);
        assert_eq!(result.get(&1), Some(&vec![7]));
        assert_eq!(result.get(&2), Some(&vec![3]));

        let miss = [Point::new(190.0, 0.0), Point::new(199.0, 0.0), Point::new(199.0, 5.0)];
        assert!(space.query_rendered_symbols(&miss).is_empty());
    }
}
