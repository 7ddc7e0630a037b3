use crate::geometry::{Point, line_length};
use crate::tile::OverscaledTileId;
use serde::Serialize;

const EARTH_RADIUS: f64 = 6_371_008.8;

/// Candidate label position on a line, with the line's direction at that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub point: Point,
    pub angle: f64,
    /// Index of the line segment the anchor lies on; `None` for point anchors.
    pub segment: Option<usize>,
}

impl Anchor {
    pub fn new(x: f64, y: f64, angle: f64, segment: Option<usize>) -> Self {
        Self {
            point: Point::new(x, y),
            angle,
            segment,
        }
    }

    fn rounded(mut self) -> Self {
        self.point = self.point.round();
        self
    }
}

/// Horizontal extents of the shaped label parts that must fit on the line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LabelExtent {
    /// Width of the shaped text, if there is any.
    pub text_width: Option<f64>,
    pub icon_width: Option<f64>,
}

impl LabelExtent {
    fn length(&self) -> f64 {
        self.text_width.unwrap_or(0.0).max(self.icon_width.unwrap_or(0.0))
    }

    fn angle_window_size(&self, glyph_size: f64, box_scale: f64) -> f64 {
        if self.text_width.is_some() {
            3.0 / 5.0 * glyph_size * box_scale
        } else {
            0.0
        }
    }
}

/// Whether the label centred on `anchor` avoids any sharp bend: the summed turning angle
/// within any `window_size` stretch of the label must stay below `max_angle` radians.
pub fn check_max_angle(line: &[Point], anchor: &Anchor, label_length: f64, window_size: f64, max_angle: f64) -> bool {
    let Some(segment) = anchor.segment else {
        return true;
    };

    // Walk back to the first vertex the label covers.
    let mut p = anchor.point;
    let mut index = segment as isize + 1;
    let mut anchor_distance = 0.0;
    while anchor_distance > -label_length / 2.0 {
        index -= 1;
        if index < 0 {
            return false;
        }
        let vertex = line[index as usize];
        anchor_distance -= vertex.dist(p);
        p = vertex;
    }
    let mut index = index as usize;
    // No vertex left to bend around.
    if index + 1 >= line.len() {
        return true;
    }
    anchor_distance += line[index].dist(line[index + 1]);
    index += 1;

    let mut recent_corners: std::collections::VecDeque<(f64, f64)> = std::collections::VecDeque::new();
    let mut recent_angle_delta = 0.0;

    while anchor_distance < label_length / 2.0 {
        let Some(&next) = line.get(index + 1) else {
            return false;
        };
        let prev = line[index - 1];
        let current = line[index];

        let delta = prev.angle_to(current) - current.angle_to(next);
        let delta = ((delta + 3.0 * std::f64::consts::PI).rem_euclid(std::f64::consts::TAU) - std::f64::consts::PI).abs();

        recent_corners.push_back((anchor_distance, delta));
        recent_angle_delta += delta;

        while let Some(&(distance, corner_delta)) = recent_corners.front() {
            if anchor_distance - distance <= window_size {
                break;
            }
            recent_angle_delta -= corner_delta;
            recent_corners.pop_front();
        }

        if recent_angle_delta > max_angle {
            return false;
        }

        index += 1;
        anchor_distance += current.dist(next);
    }
    true
}

/// Samples label anchors along `line` every `spacing` tile units.
///
/// Lines that start on the tile border are treated as continuations from a
/// neighbouring tile and are offset by half the spacing so that anchors line up
/// with those of the parent tile at lower zooms.
#[allow(clippy::too_many_arguments)]
pub fn get_anchors(
    line: &[Point],
    spacing: f64,
    max_angle: f64,
    label: LabelExtent,
    glyph_size: f64,
    box_scale: f64,
    overscaling: f64,
    tile_extent: f64,
) -> Vec<Anchor> {
    let Some(first) = line.first() else {
        return Vec::new();
    };
    let angle_window_size = label.angle_window_size(glyph_size, box_scale);
    let shaped_label_length = label.length();
    let label_length = shaped_label_length * box_scale;

    let is_line_continued =
        first.x == 0.0 || first.x == tile_extent || first.y == 0.0 || first.y == tile_extent;

    // Keep at least a quarter of the spacing between adjacent labels.
    let mut spacing = spacing;
    if spacing - label_length < spacing / 4.0 {
        spacing = label_length + spacing / 4.0;
    }

    let fixed_extra_offset = glyph_size * 2.0;
    let offset = if is_line_continued {
        (spacing / 2.0 * overscaling) % spacing
    } else {
        ((shaped_label_length / 2.0 + fixed_extra_offset) * box_scale * overscaling) % spacing
    };

    let sampler = Resampler {
        line,
        spacing,
        angle_window_size,
        max_angle,
        label_length,
        is_line_continued,
        tile_extent,
    };
    sampler.resample(offset, false)
}

struct Resampler<'a> {
    line: &'a [Point],
    spacing: f64,
    angle_window_size: f64,
    max_angle: f64,
    label_length: f64,
    is_line_continued: bool,
    tile_extent: f64,
}

impl Resampler<'_> {
    fn resample(&self, offset: f64, place_at_middle: bool) -> Vec<Anchor> {
        let line = self.line;
        let half_label_length = self.label_length / 2.0;
        let total_length = line_length(line);

        let mut distance = 0.0;
        let mut marked_distance = offset - self.spacing;
        let mut anchors = Vec::new();

        for (i, pair) in line.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            let segment_dist = a.dist(b);
            let angle = b.angle_to(a);

            while marked_distance + self.spacing < distance + segment_dist {
                marked_distance += self.spacing;

                let t = (marked_distance - distance) / segment_dist;
                let p = a.lerp(b, t);

                if p.x >= 0.0
                    && p.x < self.tile_extent
                    && p.y >= 0.0
                    && p.y < self.tile_extent
                    && marked_distance - half_label_length >= 0.0
                    && marked_distance + half_label_length <= total_length
                {
                    let anchor = Anchor::new(p.x, p.y, angle, Some(i)).rounded();
                    if self.angle_window_size == 0.0
                        || check_max_angle(line, &anchor, self.label_length, self.angle_window_size, self.max_angle)
                    {
                        anchors.push(anchor);
                    }
                }
            }

            distance += segment_dist;
        }

        if !place_at_middle && anchors.is_empty() && !self.is_line_continued {
            // Short lines in overscaled tiles often miss every sample; try the midpoint once.
            anchors = self.resample(distance / 2.0, true);
        }

        anchors
    }
}

/// Single anchor at the middle of `line` by length, or `None` when the label would bend
/// too sharply there. With `geodesic` set, the middle is measured on the sphere.
pub fn get_center_anchor(
    line: &[Point],
    max_angle: f64,
    label: LabelExtent,
    glyph_size: f64,
    box_scale: f64,
    geodesic: Option<&OverscaledTileId>,
) -> Option<Anchor> {
    let angle_window_size = label.angle_window_size(glyph_size, box_scale);
    let label_length = label.length() * box_scale;

    let segment_length = |a: Point, b: Point| match geodesic {
        Some(tile) => haversine(tile.tile_to_lng_lat(a.x, a.y), tile.tile_to_lng_lat(b.x, b.y)),
        None => a.dist(b),
    };
    let center_distance = line.windows(2).map(|w| segment_length(w[0], w[1])).sum::<f64>() / 2.0;

    let mut prev_distance = 0.0;
    for (i, pair) in line.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let segment_distance = segment_length(a, b);

        if prev_distance + segment_distance > center_distance {
            let t = (center_distance - prev_distance) / segment_distance;
            let p = match geodesic {
                Some(tile) => {
                    let (a_lng, a_lat) = tile.tile_to_lng_lat(a.x, a.y);
                    let (b_lng, b_lat) = tile.tile_to_lng_lat(b.x, b.y);
                    let (x, y) = tile.lng_lat_to_tile(a_lng + (b_lng - a_lng) * t, a_lat + (b_lat - a_lat) * t);
                    Point::new(x, y)
                }
                None => a.lerp(b, t),
            };
            let anchor = Anchor::new(p.x, p.y, b.angle_to(a), Some(i)).rounded();
            let fits = angle_window_size == 0.0
                || check_max_angle(line, &anchor, label_length, angle_window_size, max_angle);
            return fits.then_some(anchor);
        }

        prev_distance += segment_distance;
    }
    None
}

fn haversine(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lng1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lng2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * ((lng2 - lng1) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    const TILE_EXTENT: f64 = 4096.0;
    const GLYPH_SIZE: f64 = 0.1;

    fn label() -> LabelExtent {
        LabelExtent {
            text_width: Some(2.0),
            icon_width: Some(1.0),
        }
    }

    fn line(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn non_continued() -> Vec<Point> {
        (1..11).map(|i| Point::new(1.0, f64::from(i))).collect()
    }

    fn continued() -> Vec<Point> {
        (0..10).map(|i| Point::new(1.0, f64::from(i))).collect()
    }

    fn summary(anchors: &[Anchor]) -> Vec<(f64, f64, Option<usize>)> {
        anchors.iter().map(|a| (a.point.x, a.point.y, a.segment)).collect()
    }

    #[test]
    fn non_continued_line_short_labels() {
        let anchors = get_anchors(&non_continued(), 3.0, PI, label(), GLYPH_SIZE, 1.0, 1.0, TILE_EXTENT);
        assert_eq!(
            summary(&anchors),
            vec![(1.0, 2.0, Some(1)), (1.0, 5.0, Some(4)), (1.0, 8.0, Some(7))]
        );
        assert!(anchors.iter().all(|a| (a.angle - FRAC_PI_2).abs() < 1e-12));
    }

    #[test]
    fn non_continued_line_long_labels() {
        let anchors = get_anchors(&non_continued(), 2.0, PI, label(), GLYPH_SIZE, 1.0, 1.0, TILE_EXTENT);
        assert_eq!(
            summary(&anchors),
            vec![(1.0, 2.0, Some(1)), (1.0, 5.0, Some(3)), (1.0, 7.0, Some(6))]
        );
    }

    #[test]
    fn continued_lines() {
        let short = get_anchors(&continued(), 3.0, PI, label(), GLYPH_SIZE, 1.0, 1.0, TILE_EXTENT);
        assert_eq!(
            summary(&short),
            vec![(1.0, 2.0, Some(1)), (1.0, 5.0, Some(4)), (1.0, 8.0, Some(7))]
        );
        let long = get_anchors(&continued(), 2.0, PI, label(), GLYPH_SIZE, 1.0, 1.0, TILE_EXTENT);
        assert_eq!(
            summary(&long),
            vec![(1.0, 1.0, Some(1)), (1.0, 4.0, Some(3)), (1.0, 6.0, Some(6))]
        );
    }

    #[test]
    fn overscaled_anchors_contain_parent_anchors() {
        let parent = get_anchors(&non_continued(), 3.0, PI, label(), GLYPH_SIZE, 1.0, 1.0, TILE_EXTENT);
        let child = get_anchors(&non_continued(), 1.5, PI, label(), GLYPH_SIZE, 0.5, 2.0, TILE_EXTENT);
        for anchor in &parent {
            assert!(child.contains(anchor), "missing {anchor:?} in {child:?}");
        }
    }

    #[test]
    fn short_line_falls_back_to_middle() {
        let anchors = get_anchors(&line(&[(1.0, 1.0), (1.0, 3.1)]), 2.0, PI, label(), GLYPH_SIZE, 1.0, 1.0, TILE_EXTENT);
        assert_eq!(summary(&anchors), vec![(1.0, 2.0, Some(0))]);
    }

    #[test]
    fn continued_short_line_has_no_middle_fallback() {
        let anchors = get_anchors(&line(&[(0.0, 1.0), (0.0, 3.1)]), 2.0, PI, label(), GLYPH_SIZE, 1.0, 1.0, TILE_EXTENT);
        assert!(anchors.is_empty(), "{anchors:?}");
    }

    #[test]
    fn center_anchor() {
        let path = line(&[(1.0, 1.0), (1.0, 3.1), (3.0, 6.0), (4.0, 7.0)]);
        let anchor = get_center_anchor(&path, PI, label(), GLYPH_SIZE, 1.0, None);
        let anchor = anchor.map(|a| (a.point.x, a.point.y, a.segment));
        assert_eq!(anchor, Some((2.0, 4.0, Some(1))));
    }

    #[test]
    fn center_anchor_outside_tile() {
        let path = line(&[(-10.0, -10.0), (5.0, 5.0)]);
        let anchor = get_center_anchor(&path, PI, label(), GLYPH_SIZE, 1.0, None);
        assert!(anchor.is_some_and(|a| a.point == Point::new(-2.0, -2.0) && (a.angle - FRAC_PI_4).abs() < 1e-12));
    }

    #[test]
    fn center_anchor_fails_angle_check() {
        let path = line(&[(1.0, 1.0), (1.0, 3.0), (3.0, 3.0)]);
        assert_eq!(get_center_anchor(&path, FRAC_PI_4, label(), GLYPH_SIZE, 1.0, None), None);
    }

    #[test]
    fn max_angle_window() {
        let path = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)]);
        let anchor = Anchor::new(10.0, 5.0, FRAC_PI_2, Some(1));
        // Two right angles within the window.
        assert!(!check_max_angle(&path, &anchor, 12.0, 20.0, PI * 0.9));
        // A window too short to see both corners.
        assert!(check_max_angle(&path, &anchor, 12.0, 5.0, PI * 0.9));
        // Label longer than the line.
        assert!(!check_max_angle(&path, &anchor, 100.0, 5.0, PI));
    }

    #[test]
    fn max_angle_window_past_line_end() {
        let path = line(&[(0.0, 0.0), (10.0, 0.0)]);
        let anchor = Anchor::new(5.0, 0.0, 0.0, Some(0));
        assert!(check_max_angle(&path, &anchor, 0.0, 5.0, FRAC_PI_4));
        let end = Anchor::new(10.0, 0.0, 0.0, Some(1));
        assert!(check_max_angle(&path, &end, 0.0, 5.0, FRAC_PI_4));
    }
}
