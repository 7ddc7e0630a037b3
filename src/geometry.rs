// Planar geometry helpers shared by layout and placement.
// Everything here works in either tile units or viewport pixels; the caller decides.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

mod pole;

pub use pole::find_pole_of_inaccessibility;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn mult(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    pub fn div(self, k: f64) -> Self {
        Self::new(self.x / k, self.y / k)
    }

    pub fn mag(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn unit(self) -> Self {
        let mag = self.mag();
        if mag == 0.0 { self } else { self.div(mag) }
    }

    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn dist(self, other: Point) -> f64 {
        self.dist_sqr(other).sqrt()
    }

    pub fn dist_sqr(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    /// Angle of the vector pointing from `other` to `self`.
    pub fn angle_to(self, other: Point) -> f64 {
        (self.y - other.y).atan2(self.x - other.x)
    }

    pub fn rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos * self.x - sin * self.y, sin * self.x + cos * self.y)
    }

    pub fn round(self) -> Self {
        Self::new(round_half_up(self.x), round_half_up(self.y))
    }

    pub fn lerp(self, other: Point, t: f64) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Rounds halves towards positive infinity (`-2.5` becomes `-2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Axis-aligned bounding box `[x1, y1, x2, y2]` of a point set.
pub fn get_aabb(points: &[Point]) -> [f64; 4] {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    [min_x, min_y, max_x, max_y]
}

pub fn line_length(line: &[Point]) -> f64 {
    line.windows(2).map(|w| w[0].dist(w[1])).sum()
}

/// Clips every polyline to the rectangle `[x1, x2) × [y1, y2)`. A line that leaves and
/// re-enters the rectangle is split in several pieces. Intersection points are rounded.
pub fn clip_line(lines: &[Vec<Point>], x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<Vec<Point>> {
    let mut clipped: Vec<Vec<Point>> = Vec::new();

    for line in lines {
        let mut current: Option<Vec<Point>> = None;

        for pair in line.windows(2) {
            let mut p0 = pair[0];
            let mut p1 = pair[1];

            if p0.x < x1 && p1.x < x1 {
                continue;
            } else if p0.x < x1 {
                p0 = Point::new(x1, p0.y + (p1.y - p0.y) * ((x1 - p0.x) / (p1.x - p0.x))).round();
            } else if p1.x < x1 {
                p1 = Point::new(x1, p0.y + (p1.y - p0.y) * ((x1 - p0.x) / (p1.x - p0.x))).round();
            }

            if p0.y < y1 && p1.y < y1 {
                continue;
            } else if p0.y < y1 {
                p0 = Point::new(p0.x + (p1.x - p0.x) * ((y1 - p0.y) / (p1.y - p0.y)), y1).round();
            } else if p1.y < y1 {
                p1 = Point::new(p0.x + (p1.x - p0.x) * ((y1 - p0.y) / (p1.y - p0.y)), y1).round();
            }

            if p0.x >= x2 && p1.x >= x2 {
                continue;
            } else if p0.x >= x2 {
                p0 = Point::new(x2, p0.y + (p1.y - p0.y) * ((x2 - p0.x) / (p1.x - p0.x))).round();
            } else if p1.x >= x2 {
                p1 = Point::new(x2, p0.y + (p1.y - p0.y) * ((x2 - p0.x) / (p1.x - p0.x))).round();
            }

            if p0.y >= y2 && p1.y >= y2 {
                continue;
            } else if p0.y >= y2 {
                p0 = Point::new(p0.x + (p1.x - p0.x) * ((y2 - p0.y) / (p1.y - p0.y)), y2).round();
            } else if p1.y >= y2 {
                p1 = Point::new(p0.x + (p1.x - p0.x) * ((y2 - p0.y) / (p1.y - p0.y)), y2).round();
            }

            let continues = current
                .as_ref()
                .and_then(|c| c.last())
                .is_some_and(|last| *last == p0);
            if !continues {
                if let Some(done) = current.take() {
                    clipped.push(done);
                }
                current = Some(vec![p0]);
            }
            if let Some(c) = current.as_mut() {
                c.push(p1);
            }
        }

        if let Some(done) = current {
            clipped.push(done);
        }
    }

    clipped
}

/// Interpolates positions along a polyline by normalized arc length, keeping `padding`
/// distance away from both ends.
#[derive(Debug, Clone, Default)]
pub struct PathInterpolator {
    points: Vec<Point>,
    distances: Vec<f64>,
    length: f64,
    padding: f64,
    padded_length: f64,
}

impl PathInterpolator {
    pub fn new(points: &[Point], padding: f64) -> Self {
        let mut interpolator = Self::default();
        interpolator.reset(points, padding);
        interpolator
    }

    pub fn reset(&mut self, points: &[Point], padding: f64) {
        self.points.clear();
        self.points.extend_from_slice(points);
        self.distances.clear();
        self.length = 0.0;
        if !points.is_empty() {
            self.distances.push(0.0);
            for i in 1..points.len() {
                self.length += points[i].dist(points[i - 1]);
                self.distances.push(self.length);
            }
        }
        self.padding = padding.min(self.length * 0.5);
        self.padded_length = self.length - self.padding * 2.0;
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn padded_length(&self) -> f64 {
        self.padded_length
    }

    pub fn lerp(&self, t: f64) -> Point {
        match self.points.len() {
            0 => return Point::default(),
            1 => return self.points[0],
            _ => {}
        }
        let t = clamp(t, 0.0, 1.0);
        let target = t * self.padded_length + self.padding;

        let last = self.points.len() - 1;
        let mut idx = 1;
        while idx < last && self.distances[idx] < target {
            idx += 1;
        }

        let start = self.distances[idx - 1];
        let seg_len = self.distances[idx] - start;
        let seg_t = if seg_len > 0.0 { (target - start) / seg_len } else { 0.0 };
        self.points[idx - 1].lerp(self.points[idx], seg_t)
    }
}

pub fn polygon_intersects_polygon(a: &[Point], b: &[Point]) -> bool {
    if a.iter().any(|p| polygon_contains_point(b, *p)) {
        return true;
    }
    if b.iter().any(|p| polygon_contains_point(a, *p)) {
        return true;
    }
    line_intersects_line(a, b)
}

/// Even-odd ray casting. The ring does not need to repeat its first vertex.
pub fn polygon_contains_point(ring: &[Point], p: Point) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n == 0 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let p1 = ring[i];
        let p2 = ring[j];
        if (p1.y > p.y) != (p2.y > p.y)
            && p.x < (p2.x - p1.x) * (p.y - p1.y) / (p2.y - p1.y) + p1.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn line_intersects_line(a: &[Point], b: &[Point]) -> bool {
    for sa in a.windows(2) {
        for sb in b.windows(2) {
            if segments_intersect(sa[0], sa[1], sb[0], sb[1]) {
                return true;
            }
        }
    }
    false
}

fn is_counter_clockwise(a: Point, b: Point, c: Point) -> bool {
    (c.y - a.y) * (b.x - a.x) > (b.y - a.y) * (c.x - a.x)
}

pub fn segments_intersect(a0: Point, a1: Point, b0: Point, b1: Point) -> bool {
    is_counter_clockwise(a0, b0, b1) != is_counter_clockwise(a1, b0, b1)
        && is_counter_clockwise(a0, a1, b0) != is_counter_clockwise(a0, a1, b1)
}

/// Signed shoelace area; positive for clockwise rings in a y-down space.
pub fn signed_area(ring: &[Point]) -> f64 {
    let n = ring.len();
    if n < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut j = n - 1;
    for i in 0..n {
        let p1 = ring[i];
        let p2 = ring[j];
        sum += (p2.x - p1.x) * (p1.y + p2.y);
        j = i;
    }
    sum
}

/// Groups rings into polygons: each outer ring followed by its holes. The winding of the
/// first non-degenerate ring decides which sign is "outer". `max_rings` > 0 keeps only the
/// largest holes of each polygon.
pub fn classify_rings(rings: &[Vec<Point>], max_rings: usize) -> Vec<Vec<Vec<Point>>> {
    if rings.len() <= 1 {
        return vec![rings.to_vec()];
    }

    let mut polygons: Vec<Vec<(f64, Vec<Point>)>> = Vec::new();
    let mut ccw: Option<bool> = None;

    for ring in rings {
        let area = signed_area(ring);
        if area == 0.0 {
            continue;
        }
        let is_ccw = area < 0.0;
        let outer_sign = *ccw.get_or_insert(is_ccw);
        if outer_sign == is_ccw {
            polygons.push(vec![(area.abs(), ring.clone())]);
        } else if let Some(polygon) = polygons.last_mut() {
            polygon.push((area.abs(), ring.clone()));
        }
    }

    polygons
        .into_iter()
        .map(|mut polygon| {
            if max_rings > 1 && polygon.len() > max_rings {
                polygon[1..].sort_by(|a, b| b.0.total_cmp(&a.0));
                polygon.truncate(max_rings);
            }
            polygon.into_iter().map(|(_, ring)| ring).collect()
        })
        .collect()
}
