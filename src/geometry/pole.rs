use super::{Point, get_aabb};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Square search cell with its signed distance to the polygon outline.
struct Cell {
    p: Point,
    h: f64,
    d: f64,
    max: f64,
}

impl Cell {
    fn new(x: f64, y: f64, h: f64, polygon: &[Vec<Point>]) -> Self {
        let p = Point::new(x, y);
        let d = point_to_polygon_dist(p, polygon);
        Self {
            p,
            h,
            d,
            max: d + h * std::f64::consts::SQRT_2,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.max.total_cmp(&other.max) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.max.total_cmp(&other.max)
    }
}

/// Point inside the polygon farthest from its outline (polylabel). `rings[0]` is the
/// outer ring, the rest are holes. Stops refining once a cell cannot improve on the best
/// distance by more than `precision`.
pub fn find_pole_of_inaccessibility(rings: &[Vec<Point>], precision: f64) -> Point {
    let Some(outer) = rings.first().filter(|ring| !ring.is_empty()) else {
        return Point::default();
    };
    let [min_x, min_y, max_x, max_y] = get_aabb(outer);

    let cell_size = (max_x - min_x).min(max_y - min_y);
    if cell_size == 0.0 {
        return Point::new(min_x, min_y);
    }
    let h = cell_size / 2.0;

    let mut queue = BinaryHeap::new();
    let mut x = min_x;
    while x < max_x {
        let mut y = min_y;
        while y < max_y {
            queue.push(Cell::new(x + h, y + h, h, rings));
            y += cell_size;
        }
        x += cell_size;
    }

    let centroid = centroid_cell(rings);
    let mut best_p = centroid.p;
    let mut best_d = centroid.d;

    while let Some(cell) = queue.pop() {
        // A zero or NaN best distance means the centroid was useless.
        if cell.d > best_d || best_d == 0.0 || best_d.is_nan() {
            best_p = cell.p;
            best_d = cell.d;
        }
        if cell.max - best_d <= precision {
            continue;
        }

        let h = cell.h / 2.0;
        queue.push(Cell::new(cell.p.x - h, cell.p.y - h, h, rings));
        queue.push(Cell::new(cell.p.x + h, cell.p.y - h, h, rings));
        queue.push(Cell::new(cell.p.x - h, cell.p.y + h, h, rings));
        queue.push(Cell::new(cell.p.x + h, cell.p.y + h, h, rings));
    }

    best_p
}

/// Positive inside the polygon, negative outside.
fn point_to_polygon_dist(p: Point, rings: &[Vec<Point>]) -> f64 {
    let mut inside = false;
    let mut min_dist_sq = f64::INFINITY;

    for ring in rings {
        let n = ring.len();
        if n == 0 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let a = ring[i];
            let b = ring[j];
            if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
                inside = !inside;
            }
            min_dist_sq = min_dist_sq.min(dist_to_segment_squared(p, a, b));
            j = i;
        }
    }

    let dist = min_dist_sq.sqrt();
    if inside { dist } else { -dist }
}

fn dist_to_segment_squared(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let t = if dx != 0.0 || dy != 0.0 {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / (dx * dx + dy * dy)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    p.dist_sqr(Point::new(a.x + dx * t, a.y + dy * t))
}

fn centroid_cell(rings: &[Vec<Point>]) -> Cell {
    let ring = &rings[0];
    let mut area = 0.0;
    let mut x = 0.0;
    let mut y = 0.0;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        let f = a.x * b.y - b.x * a.y;
        x += (a.x + b.x) * f;
        y += (a.y + b.y) * f;
        area += f * 3.0;
        j = i;
    }
    if area == 0.0 {
        return Cell::new(ring[0].x, ring[0].y, 0.0, rings);
    }
    Cell::new(x / area, y / area, 0.0, rings)
}
