// Bucketed spatial index for box and circle overlap tests.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Policy for whether a label may share space with geometry already in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapMode {
    #[default]
    Never,
    Always,
    Cooperative,
}

/// `always` overlaps anything, `never` neither overlaps nor is overlapped, and
/// `cooperative` overlaps everything except `never`.
pub fn overlap_allowed(placing: OverlapMode, existing: OverlapMode) -> bool {
    match (placing, existing) {
        (OverlapMode::Always, _) => true,
        (OverlapMode::Never, _) | (_, OverlapMode::Never) => false,
        _ => true,
    }
}

/// Identity of a placed feature inside the collision grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    pub bucket_instance_id: u32,
    pub feature_index: u32,
    pub collision_group_id: u16,
    pub overlap_mode: OverlapMode,
}

pub trait GridKey: Copy {
    fn overlap_mode(&self) -> OverlapMode {
        OverlapMode::Never
    }
}

impl GridKey for FeatureKey {
    fn overlap_mode(&self) -> OverlapMode {
        self.overlap_mode
    }
}

impl GridKey for u32 {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryHit<K> {
    pub key: K,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Clone, Copy)]
enum Probe {
    Rect { x1: f64, y1: f64, x2: f64, y2: f64 },
    Circle { x: f64, y: f64, r: f64 },
}

struct Search<'a, K> {
    probe: Probe,
    hit_test: bool,
    overlap_mode: OverlapMode,
    predicate: Option<&'a dyn Fn(&K) -> bool>,
    seen_boxes: HashSet<usize>,
    seen_circles: HashSet<usize>,
    hits: Vec<QueryHit<K>>,
}

impl<K: GridKey> Search<'_, K> {
    fn accepts(&self, key: &K) -> bool {
        self.predicate.is_none_or(|pred| pred(key))
    }

    fn records(&self, key: &K) -> bool {
        !self.hit_test || !overlap_allowed(self.overlap_mode, key.overlap_mode())
    }
}

#[derive(Debug, Clone)]
pub struct SpatialGrid<K> {
    width: f64,
    height: f64,
    x_cell_count: usize,
    y_cell_count: usize,
    x_scale: f64,
    y_scale: f64,
    box_cells: Vec<Vec<usize>>,
    circle_cells: Vec<Vec<usize>>,
    box_keys: Vec<K>,
    bboxes: Vec<[f64; 4]>,
    circle_keys: Vec<K>,
    circles: Vec<[f64; 3]>,
}

impl<K: GridKey> SpatialGrid<K> {
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let x_cell_count = (width / cell_size).ceil().max(1.0) as usize;
        let y_cell_count = (height / cell_size).ceil().max(1.0) as usize;
        let cells = x_cell_count * y_cell_count;
        Self {
            width,
            height,
            x_cell_count,
            y_cell_count,
            x_scale: x_cell_count as f64 / width,
            y_scale: y_cell_count as f64 / height,
            box_cells: vec![Vec::new(); cells],
            circle_cells: vec![Vec::new(); cells],
            box_keys: Vec::new(),
            bboxes: Vec::new(),
            circle_keys: Vec::new(),
            circles: Vec::new(),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn keys_length(&self) -> usize {
        self.box_keys.len() + self.circle_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.box_keys.is_empty() && self.circle_keys.is_empty()
    }

    pub fn insert(&mut self, key: K, x1: f64, y1: f64, x2: f64, y2: f64) {
        let uid = self.box_keys.len();
        self.box_keys.push(key);
        self.bboxes.push([x1, y1, x2, y2]);
        for cell in self.cells_covering(x1, y1, x2, y2) {
            self.box_cells[cell].push(uid);
        }
    }

    pub fn insert_circle(&mut self, key: K, x: f64, y: f64, radius: f64) {
        let uid = self.circle_keys.len();
        self.circle_keys.push(key);
        self.circles.push([x, y, radius]);
        for cell in self.cells_covering(x - radius, y - radius, x + radius, y + radius) {
            self.circle_cells[cell].push(uid);
        }
    }

    /// Every box and circle whose geometry intersects the rectangle. Circles are
    /// reported by their bounding boxes.
    pub fn query(
        &self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        predicate: Option<&dyn Fn(&K) -> bool>,
    ) -> Vec<QueryHit<K>> {
        if x2 < 0.0 || x1 > self.width || y2 < 0.0 || y1 > self.height {
            return Vec::new();
        }
        if self.covers_whole_grid(x1, y1, x2, y2) {
            return self.dump_all(predicate);
        }
        let mut search = Search {
            probe: Probe::Rect { x1, y1, x2, y2 },
            hit_test: false,
            overlap_mode: OverlapMode::Never,
            predicate,
            seen_boxes: HashSet::new(),
            seen_circles: HashSet::new(),
            hits: Vec::new(),
        };
        self.search_cells(x1, y1, x2, y2, &mut search);
        search.hits
    }

    /// True when the rectangle hits geometry it is not allowed to overlap.
    pub fn hit_test(
        &self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        overlap_mode: OverlapMode,
        predicate: Option<&dyn Fn(&K) -> bool>,
    ) -> bool {
        if x2 < 0.0 || x1 > self.width || y2 < 0.0 || y1 > self.height {
            return false;
        }
        if self.covers_whole_grid(x1, y1, x2, y2) {
            return true;
        }
        let mut search = Search {
            probe: Probe::Rect { x1, y1, x2, y2 },
            hit_test: true,
            overlap_mode,
            predicate,
            seen_boxes: HashSet::new(),
            seen_circles: HashSet::new(),
            hits: Vec::new(),
        };
        self.search_cells(x1, y1, x2, y2, &mut search);
        !search.hits.is_empty()
    }

    pub fn hit_test_circle(
        &self,
        x: f64,
        y: f64,
        radius: f64,
        overlap_mode: OverlapMode,
        predicate: Option<&dyn Fn(&K) -> bool>,
    ) -> bool {
        let (x1, y1, x2, y2) = (x - radius, y - radius, x + radius, y + radius);
        if x2 < 0.0 || x1 > self.width || y2 < 0.0 || y1 > self.height {
            return false;
        }
        let mut search = Search {
            probe: Probe::Circle { x, y, r: radius },
            hit_test: true,
            overlap_mode,
            predicate,
            seen_boxes: HashSet::new(),
            seen_circles: HashSet::new(),
            hits: Vec::new(),
        };
        self.search_cells(x1, y1, x2, y2, &mut search);
        !search.hits.is_empty()
    }

    fn covers_whole_grid(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
        x1 <= 0.0 && y1 <= 0.0 && self.width <= x2 && self.height <= y2
    }

    fn dump_all(&self, predicate: Option<&dyn Fn(&K) -> bool>) -> Vec<QueryHit<K>> {
        let boxes = self.box_keys.iter().zip(&self.bboxes).map(|(key, b)| QueryHit {
            key: *key,
            x1: b[0],
            y1: b[1],
            x2: b[2],
            y2: b[3],
        });
        let circles = self.circle_keys.iter().zip(&self.circles).map(|(key, c)| QueryHit {
            key: *key,
            x1: c[0] - c[2],
            y1: c[1] - c[2],
            x2: c[0] + c[2],
            y2: c[1] + c[2],
        });
        boxes
            .chain(circles)
            .filter(|hit| predicate.is_none_or(|pred| pred(&hit.key)))
            .collect()
    }

    fn search_cells(&self, x1: f64, y1: f64, x2: f64, y2: f64, search: &mut Search<'_, K>) {
        for cell in self.cells_covering(x1, y1, x2, y2) {
            if self.search_cell(cell, search) {
                return;
            }
        }
    }

    /// Returns true once a hit test has its answer.
    fn search_cell(&self, cell: usize, search: &mut Search<'_, K>) -> bool {
        for &uid in &self.box_cells[cell] {
            if !search.seen_boxes.insert(uid) {
                continue;
            }
            let key = self.box_keys[uid];
            let [bx1, by1, bx2, by2] = self.bboxes[uid];
            let touches = match search.probe {
                Probe::Rect { x1, y1, x2, y2 } => x1 <= bx2 && y1 <= by2 && x2 >= bx1 && y2 >= by1,
                Probe::Circle { x, y, r } => circle_and_rect_collide(x, y, r, bx1, by1, bx2, by2),
            };
            if touches && search.accepts(&key) && search.records(&key) {
                search.hits.push(QueryHit { key, x1: bx1, y1: by1, x2: bx2, y2: by2 });
                if search.hit_test {
                    return true;
                }
            }
        }

        for &uid in &self.circle_cells[cell] {
            if !search.seen_circles.insert(uid) {
                continue;
            }
            let key = self.circle_keys[uid];
            let [cx, cy, cr] = self.circles[uid];
            let touches = match search.probe {
                Probe::Rect { x1, y1, x2, y2 } => circle_and_rect_collide(cx, cy, cr, x1, y1, x2, y2),
                Probe::Circle { x, y, r } => circles_collide(cx, cy, cr, x, y, r),
            };
            if touches && search.accepts(&key) && search.records(&key) {
                search.hits.push(QueryHit {
                    key,
                    x1: cx - cr,
                    y1: cy - cr,
                    x2: cx + cr,
                    y2: cy + cr,
                });
                if search.hit_test {
                    return true;
                }
            }
        }
        false
    }

    fn cells_covering(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> impl Iterator<Item = usize> + use<K> {
        let cx1 = self.cell_x(x1);
        let cy1 = self.cell_y(y1);
        let cx2 = self.cell_x(x2);
        let cy2 = self.cell_y(y2);
        let stride = self.x_cell_count;
        (cx1..=cx2).flat_map(move |x| (cy1..=cy2).map(move |y| stride * y + x))
    }

    fn cell_x(&self, x: f64) -> usize {
        let cell = (x * self.x_scale).floor();
        cell.clamp(0.0, (self.x_cell_count - 1) as f64) as usize
    }

    fn cell_y(&self, y: f64) -> usize {
        let cell = (y * self.y_scale).floor();
        cell.clamp(0.0, (self.y_cell_count - 1) as f64) as usize
    }
}

fn circles_collide(x1: f64, y1: f64, r1: f64, x2: f64, y2: f64, r2: f64) -> bool {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let both = r1 + r2;
    both * both > dx * dx + dy * dy
}

fn circle_and_rect_collide(cx: f64, cy: f64, r: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
    let half_w = (x2 - x1) / 2.0;
    let dist_x = (cx - (x1 + half_w)).abs();
    if dist_x > half_w + r {
        return false;
    }
    let half_h = (y2 - y1) / 2.0;
    let dist_y = (cy - (y1 + half_h)).abs();
    if dist_y > half_h + r {
        return false;
    }
    if dist_x <= half_w || dist_y <= half_h {
        return true;
    }
    let dx = dist_x - half_w;
    let dy = dist_y - half_h;
    dx * dx + dy * dy <= r * r
}
